//! Backend pool management.
//!
//! # Responsibilities
//! - Own the backend list and the hash ring behind one reader/writer lock
//! - Drive per-backend health transitions and ring membership together
//! - Hand out independent snapshots and routing decisions
//!
//! # Invariant
//! A name is in the ring if and only if a backend with that name is in the
//! pool and marked healthy. Every mutation updates the flag and the ring in
//! the same critical section.
//!
//! # Metrics
//! Only the installed pool writes the per-backend health gauge. A pool built
//! for a reload stays silent until it is swapped in, and a retired pool goes
//! silent again, so the gauge always mirrors the pool that serves traffic.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::BackendConfig;
use crate::health::checker::HealthChecker;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::ring::{HashRing, DEFAULT_REPLICAS};
use crate::observability::metrics;

#[derive(Debug)]
struct PoolState {
    backends: Vec<Backend>,
    ring: HashRing,
    installed: bool,
}

impl PoolState {
    /// Drop `name` from the ring unless another healthy entry still carries it.
    fn release(&mut self, name: &str) {
        if !self.backends.iter().any(|b| b.name == name && b.is_healthy()) {
            self.ring.remove(name);
        }
    }

    fn record_health(&self, name: &str) {
        if self.installed {
            metrics::record_backend_health(name, self.ring.contains(name));
        }
    }
}

/// Backends and ring members captured under one read lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolView {
    pub backends: Vec<Backend>,
    pub ring_members: Vec<String>,
}

impl PoolView {
    /// Ring members equal the names of healthy backends.
    pub fn is_consistent(&self) -> bool {
        let healthy: BTreeSet<&str> = self
            .backends
            .iter()
            .filter(|b| b.is_healthy())
            .map(|b| b.name.as_str())
            .collect();
        let ring: BTreeSet<&str> = self.ring_members.iter().map(String::as_str).collect();
        healthy == ring
    }
}

/// Concurrency-safe collection of backends plus the routing ring.
pub struct BackendPool {
    /// Health checking method shared by every backend in the pool.
    health_checker: Arc<dyn HealthChecker>,
    state: RwLock<PoolState>,
}

impl BackendPool {
    /// Create an empty pool.
    pub fn new(health_checker: Arc<dyn HealthChecker>) -> Self {
        Self::with_replicas(health_checker, DEFAULT_REPLICAS)
    }

    /// Create an empty pool whose ring uses `replicas` points per backend.
    pub fn with_replicas(health_checker: Arc<dyn HealthChecker>, replicas: usize) -> Self {
        Self {
            health_checker,
            state: RwLock::new(PoolState {
                backends: Vec::new(),
                ring: HashRing::with_replicas(replicas),
                installed: false,
            }),
        }
    }

    /// Build a pool from configuration. Every backend starts unhealthy.
    pub fn from_config(
        configs: &[BackendConfig],
        health_checker: Arc<dyn HealthChecker>,
        replicas: usize,
    ) -> Self {
        let pool = Self::with_replicas(health_checker, replicas);
        for config in configs {
            pool.add(Backend::from(config));
        }
        pool
    }

    // Writers never leave the flag and the ring split, so a poisoned
    // lock still guards a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, PoolState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PoolState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies of the backends currently marked healthy, taken at one instant.
    pub fn only_healthy(&self) -> Vec<Backend> {
        let state = self.read();
        state
            .backends
            .iter()
            .filter(|b| b.is_healthy())
            .cloned()
            .collect()
    }

    /// Add a backend.
    ///
    /// The pool's checker is assigned and the backend starts unhealthy no
    /// matter what the caller set, so it stays out of the ring until its
    /// first successful check. Duplicate names are accepted.
    pub fn add(&self, mut backend: Backend) {
        backend.health_checker = Some(self.health_checker.clone());
        backend.set_healthy(false);

        let mut state = self.write();
        if state.backends.iter().any(|b| b.name == backend.name) {
            tracing::warn!(backend = %backend.name, "Adding backend with duplicate name");
        }
        tracing::info!(backend = %backend.name, addr = %backend.addr(), "Backend added");
        state.record_health(&backend.name);
        state.backends.push(backend);
    }

    /// Remove the first backend whose name matches.
    ///
    /// Returns the removed backend, or the zero value (`Backend::default()`)
    /// when nothing matched. Use [`BackendPool::take`] to tell those apart.
    pub fn remove(&self, backend: &Backend) -> Backend {
        self.take(&backend.name).unwrap_or_default()
    }

    /// Remove the first backend named `name`, returning `None` if absent.
    ///
    /// The name is dropped from the ring whether or not the entry was healthy,
    /// unless a remaining duplicate is still healthy.
    pub fn take(&self, name: &str) -> Option<Backend> {
        let mut state = self.write();
        let index = state.backends.iter().position(|b| b.name == name)?;
        let removed = state.backends.remove(index);
        state.release(name);
        state.record_health(name);
        tracing::info!(backend = %name, "Backend removed");
        Some(removed)
    }

    /// Promote the first matching unhealthy backend into rotation.
    pub fn mark_healthy(&self, backend: &Backend) {
        let mut state = self.write();
        let Some(index) = state
            .backends
            .iter()
            .position(|b| b.name == backend.name && !b.is_healthy())
        else {
            return;
        };
        state.backends[index].set_healthy(true);
        state.ring.add(&backend.name);
        state.record_health(&backend.name);
        tracing::info!(backend = %backend.name, "Backend marked healthy");
    }

    /// Take the first matching healthy backend out of rotation.
    pub fn mark_unhealthy(&self, backend: &Backend) {
        let mut state = self.write();
        let Some(index) = state
            .backends
            .iter()
            .position(|b| b.name == backend.name && b.is_healthy())
        else {
            return;
        };
        state.backends[index].set_healthy(false);
        state.release(&backend.name);
        state.record_health(&backend.name);
        tracing::warn!(backend = %backend.name, "Backend marked unhealthy");
    }

    /// Carry health over from the pool this one replaces.
    ///
    /// Every healthy entry of `previous` promotes the first unhealthy entry
    /// here with the same name and address, so an unchanged backend keeps
    /// routing across a reload while a moved one waits for its next check.
    /// Returns the number of entries promoted.
    pub fn inherit_health(&self, previous: &BackendPool) -> usize {
        let healthy = previous.only_healthy();

        let mut state = self.write();
        let mut promoted = 0;
        for old in &healthy {
            let Some(index) = state
                .backends
                .iter()
                .position(|b| b.name == old.name && b.addr() == old.addr() && !b.is_healthy())
            else {
                continue;
            };
            state.backends[index].set_healthy(true);
            state.ring.add(&old.name);
            state.record_health(&old.name);
            promoted += 1;
        }
        if promoted > 0 {
            tracing::debug!(promoted, "Carried backend health into new pool");
        }
        promoted
    }

    /// Start reporting this pool's health through metrics.
    pub(crate) fn mark_installed(&self) {
        let mut state = self.write();
        state.installed = true;
        let names: BTreeSet<&str> = state.backends.iter().map(|b| b.name.as_str()).collect();
        for name in names {
            state.record_health(name);
        }
    }

    /// Stop reporting and return the names this pool held.
    pub(crate) fn retire(&self) -> BTreeSet<String> {
        let mut state = self.write();
        state.installed = false;
        state.backends.iter().map(|b| b.name.clone()).collect()
    }

    /// Whether this pool currently drives the health metrics.
    pub fn is_installed(&self) -> bool {
        self.read().installed
    }

    /// Pick the backend that owns `key` on the ring.
    pub fn route(&self, key: &str) -> Option<Backend> {
        let state = self.read();
        let name = state.ring.get(key)?;
        let selected = state
            .backends
            .iter()
            .find(|b| b.name == name && b.is_healthy())
            .cloned();
        if selected.is_none() {
            tracing::debug!(key = %key, member = %name, "Ring member has no healthy backend");
        }
        selected
    }

    /// Backends and ring members at a single instant.
    pub fn view(&self) -> PoolView {
        let state = self.read();
        PoolView {
            backends: state.backends.clone(),
            ring_members: state.ring.members(),
        }
    }

    /// Copies of every backend, healthy or not.
    pub fn backends(&self) -> Vec<Backend> {
        self.read().backends.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().backends.iter().any(|b| b.name == name)
    }

    /// Names registered in the ring, sorted.
    pub fn ring_members(&self) -> Vec<String> {
        self.read().ring.members()
    }

    pub fn len(&self) -> usize {
        self.read().backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().backends.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.read().backends.iter().filter(|b| b.is_healthy()).count()
    }
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("BackendPool")
            .field("backends", &state.backends)
            .field("ring", &state.ring.members())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::checker::StaticHealthChecker;
    use crate::observability::metrics::capture::HealthGauges;

    fn pool() -> BackendPool {
        BackendPool::new(Arc::new(StaticHealthChecker::new(true)))
    }

    fn backend(name: &str, last_octet: u8) -> Backend {
        Backend::new(name, format!("10.0.0.{last_octet}").parse().unwrap(), 8080)
    }

    fn healthy_names(pool: &BackendPool) -> Vec<String> {
        let mut names: Vec<String> = pool.only_healthy().into_iter().map(|b| b.name).collect();
        names.sort();
        names
    }

    #[test]
    fn test_add_starts_unhealthy() {
        let pool = pool();
        let mut b1 = backend("b1", 1);
        b1.set_healthy(true);

        pool.add(b1);

        assert_eq!(pool.len(), 1);
        let stored = &pool.backends()[0];
        assert!(!stored.is_healthy());
        assert!(stored.health_checker.is_some());
        assert!(pool.ring_members().is_empty());
        assert!(pool.route("flow").is_none());
    }

    #[test]
    fn test_mark_healthy_enters_ring() {
        let pool = pool();
        let b1 = backend("b1", 1);
        pool.add(b1.clone());

        pool.mark_healthy(&b1);

        assert_eq!(pool.ring_members(), vec!["b1".to_string()]);
        assert_eq!(healthy_names(&pool), vec!["b1".to_string()]);
        assert_eq!(pool.route("any-flow").unwrap().name, "b1");
    }

    #[test]
    fn test_mark_healthy_twice_is_idempotent() {
        let pool = pool();
        let b1 = backend("b1", 1);
        pool.add(b1.clone());

        pool.mark_healthy(&b1);
        let once = (pool.backends(), pool.ring_members());
        pool.mark_healthy(&b1);

        assert_eq!(once, (pool.backends(), pool.ring_members()));
    }

    #[test]
    fn test_mark_unhealthy_leaves_ring() {
        let pool = pool();
        let (b1, b2) = (backend("b1", 1), backend("b2", 2));
        pool.add(b1.clone());
        pool.add(b2.clone());
        pool.mark_healthy(&b1);
        pool.mark_healthy(&b2);

        pool.mark_unhealthy(&b1);

        assert_eq!(healthy_names(&pool), vec!["b2".to_string()]);
        assert_eq!(pool.ring_members(), vec!["b2".to_string()]);
        for i in 0..100 {
            assert_eq!(pool.route(&format!("k{i}")).unwrap().name, "b2");
        }
    }

    #[test]
    fn test_mark_absent_is_noop() {
        let pool = pool();
        pool.add(backend("b1", 1));

        pool.mark_healthy(&backend("ghost", 9));
        pool.mark_unhealthy(&backend("b1", 1));

        assert_eq!(pool.healthy_count(), 0);
        assert!(pool.ring_members().is_empty());
    }

    #[test]
    fn test_remove_returns_entry_and_clears_ring() {
        let pool = pool();
        let b1 = backend("b1", 1);
        pool.add(b1.clone());
        pool.mark_healthy(&b1);

        let removed = pool.remove(&b1);

        assert_eq!(removed.name, "b1");
        assert!(removed.is_healthy());
        assert!(pool.is_empty());
        assert!(pool.ring_members().is_empty());
    }

    #[test]
    fn test_remove_unhealthy_backend() {
        let pool = pool();
        let b1 = backend("b1", 1);
        pool.add(b1.clone());

        assert_eq!(pool.take("b1").map(|b| b.name), Some("b1".to_string()));
        assert!(pool.ring_members().is_empty());
    }

    #[test]
    fn test_remove_missing_returns_zero_value() {
        let pool = pool();
        let b1 = backend("b1", 1);
        pool.add(b1.clone());
        pool.mark_healthy(&b1);

        let removed = pool.remove(&backend("ghost", 9));

        assert!(removed.is_empty());
        assert!(pool.take("ghost").is_none());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.ring_members(), vec!["b1".to_string()]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let pool = pool();
        let b1 = backend("b1", 1);
        pool.add(b1.clone());
        pool.mark_healthy(&b1);

        let mut snapshot = pool.only_healthy();
        snapshot[0].set_healthy(false);
        snapshot[0].name = "renamed".into();
        snapshot.clear();

        assert_eq!(healthy_names(&pool), vec!["b1".to_string()]);
        assert_eq!(pool.ring_members(), vec!["b1".to_string()]);
    }

    #[test]
    fn test_duplicate_names_keep_ring_consistent() {
        let pool = pool();
        pool.add(backend("dup", 1));
        pool.add(backend("dup", 2));
        pool.mark_healthy(&backend("dup", 0));
        pool.mark_healthy(&backend("dup", 0));
        assert_eq!(pool.healthy_count(), 2);

        pool.mark_unhealthy(&backend("dup", 0));
        assert_eq!(pool.ring_members(), vec!["dup".to_string()]);

        pool.mark_unhealthy(&backend("dup", 0));
        assert!(pool.ring_members().is_empty());
    }

    #[test]
    fn test_duplicate_names_affect_first_match_only() {
        let pool = pool();
        pool.add(backend("dup", 1));
        pool.add(backend("dup", 2));

        pool.mark_healthy(&backend("dup", 0));
        let backends = pool.backends();
        assert!(backends[0].is_healthy());
        assert!(!backends[1].is_healthy());

        let removed = pool.remove(&backend("dup", 0));
        assert_eq!(removed.ip, "10.0.0.1".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(pool.len(), 1);
        assert!(pool.ring_members().is_empty());
    }

    #[test]
    fn test_inherit_health_keeps_unchanged_backends_routable() {
        let live = pool();
        let (b1, b2) = (backend("b1", 1), backend("b2", 2));
        live.add(b1.clone());
        live.add(b2.clone());
        live.mark_healthy(&b1);

        let next = pool();
        next.add(b1.clone());
        next.add(b2.clone());
        next.add(backend("b3", 3));

        assert_eq!(next.inherit_health(&live), 1);
        assert_eq!(healthy_names(&next), vec!["b1".to_string()]);
        assert!(next.view().is_consistent());
        assert_eq!(next.route("flow").unwrap().name, "b1");
    }

    #[test]
    fn test_inherit_health_skips_moved_backend() {
        let live = pool();
        let b1 = backend("b1", 1);
        live.add(b1.clone());
        live.mark_healthy(&b1);

        let next = pool();
        next.add(backend("b1", 7));

        assert_eq!(next.inherit_health(&live), 0);
        assert!(next.ring_members().is_empty());
    }

    #[test]
    fn test_inherit_health_counts_duplicates() {
        let live = pool();
        live.add(backend("dup", 1));
        live.add(backend("dup", 1));
        live.mark_healthy(&backend("dup", 1));

        let next = pool();
        next.add(backend("dup", 1));
        next.add(backend("dup", 1));

        assert_eq!(next.inherit_health(&live), 1);
        assert_eq!(next.healthy_count(), 1);
        assert_eq!(next.ring_members(), vec!["dup".to_string()]);
    }

    #[test]
    fn test_only_installed_pool_reports_health() {
        let gauges = HealthGauges::default();
        ::metrics::with_local_recorder(&gauges, || {
            let pool = pool();
            let b1 = backend("b1", 1);
            pool.add(b1.clone());
            pool.mark_healthy(&b1);
            assert_eq!(gauges.get("b1"), None);

            pool.mark_installed();
            assert_eq!(gauges.get("b1"), Some(1.0));

            assert!(pool.take("b1").is_some());
            assert_eq!(gauges.get("b1"), Some(0.0));
        });
    }
}
