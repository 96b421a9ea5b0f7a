//! Health checking capability.
//!
//! The probing protocol (ICMP, TCP, HTTP...) lives outside this crate; the
//! pool only needs something that answers "is this backend healthy right now".

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::load_balancer::backend::Backend;

/// A yes/no health check for a single backend.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, backend: &Backend) -> bool;
}

/// Checker with a fixed, switchable answer.
#[derive(Debug)]
pub struct StaticHealthChecker {
    healthy: AtomicBool,
}

impl StaticHealthChecker {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
        }
    }

    /// Change the answer returned to every subsequent check.
    pub fn set(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

#[async_trait]
impl HealthChecker for StaticHealthChecker {
    async fn check(&self, _backend: &Backend) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}
