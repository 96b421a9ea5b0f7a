//! Consistent-hash ring.
//!
//! # Responsibilities
//! - Map arbitrary lookup keys to the nearest registered member
//! - Keep remapping minimal when members join or leave
//!
//! # Design Decisions
//! - Each member owns `replicas` virtual points, hashed with CRC-32 (IEEE)
//!   over `"{index}{member}"`
//! - Lookup walks clockwise to the first point >= hash(key), wrapping around
//! - Colliding points keep every owner; the smallest name answers lookups,
//!   so routing depends on the member set alone, not on insertion order
//! - Only member names are stored; backend metadata lives in the pool

use std::collections::{BTreeMap, BTreeSet};

/// Virtual points per member when none is configured.
pub const DEFAULT_REPLICAS: usize = 20;

#[derive(Debug, Clone)]
pub struct HashRing {
    replicas: usize,
    points: BTreeMap<u32, BTreeSet<String>>,
    members: BTreeSet<String>,
}

impl HashRing {
    pub fn new() -> Self {
        Self::with_replicas(DEFAULT_REPLICAS)
    }

    /// Create a ring with a custom number of virtual points per member.
    pub fn with_replicas(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            points: BTreeMap::new(),
            members: BTreeSet::new(),
        }
    }

    /// Register a member. Adding an existing member changes nothing.
    pub fn add(&mut self, member: &str) {
        if !self.members.insert(member.to_string()) {
            return;
        }
        for index in 0..self.replicas {
            self.points
                .entry(point_hash(index, member))
                .or_default()
                .insert(member.to_string());
        }
    }

    /// Unregister a member. Removing an absent member is a no-op.
    pub fn remove(&mut self, member: &str) {
        if !self.members.remove(member) {
            return;
        }
        for index in 0..self.replicas {
            let hash = point_hash(index, member);
            if let Some(owners) = self.points.get_mut(&hash) {
                owners.remove(member);
                if owners.is_empty() {
                    self.points.remove(&hash);
                }
            }
        }
    }

    /// Resolve a lookup key to its owning member, `None` when the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        let hash = crc32fast::hash(key.as_bytes());
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .and_then(|(_, owners)| owners.first())
            .map(String::as_str)
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// Registered members in sorted order.
    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    #[cfg(test)]
    fn point_count(&self) -> usize {
        self.points.len()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

fn point_hash(index: usize, member: &str) -> u32 {
    crc32fast::hash(format!("{index}{member}").as_bytes())
}
