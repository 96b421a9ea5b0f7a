//! Active health checking.
//!
//! # Responsibilities
//! - Periodically check every backend of the active pool
//! - Feed outcomes through the tracker and flip pool state on transitions
//! - Start streaks over whenever a different pool is installed

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::{EntryKey, HealthState, HealthTracker};
use crate::load_balancer::exchange::ActivePool;

pub struct HealthMonitor {
    pool: Arc<ActivePool>,
    config: HealthCheckConfig,
    tracker: HealthTracker,
    pool_version: u64,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ActivePool>, config: HealthCheckConfig) -> Self {
        let tracker = HealthTracker::new(config.healthy_threshold, config.unhealthy_threshold);
        let pool_version = pool.version();
        Self {
            pool,
            config,
            tracker,
            pool_version,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Check every backend once and apply any resulting transitions.
    pub async fn check_all(&mut self) {
        let version = self.pool.version();
        if version != self.pool_version {
            tracing::debug!(version, "Active pool replaced, resetting health streaks");
            self.tracker.reset();
            self.pool_version = version;
        }

        let pool = self.pool.load();
        let backends = pool.backends();

        let present: HashSet<EntryKey> = backends
            .iter()
            .map(|b| (b.name.clone(), b.addr()))
            .collect();
        self.tracker.retain(&present);

        let timeout = Duration::from_secs(self.config.timeout_secs);

        for backend in backends {
            let Some(checker) = backend.health_checker.clone() else {
                tracing::debug!(backend = %backend.name, "No health checker assigned, skipping");
                continue;
            };

            let healthy = match time::timeout(timeout, checker.check(&backend)).await {
                Ok(healthy) => healthy,
                Err(_) => {
                    tracing::warn!(backend = %backend.name, addr = %backend.addr(), "Health check failed: timeout");
                    false
                }
            };

            let current = HealthState::from(backend.is_healthy());
            match self.tracker.record(&backend.name, backend.addr(), current, healthy) {
                Some(HealthState::Healthy) => pool.mark_healthy(&backend),
                Some(HealthState::Unhealthy) => pool.mark_unhealthy(&backend),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::checker::StaticHealthChecker;
    use crate::load_balancer::{Backend, BackendPool};

    fn setup(checker: Arc<StaticHealthChecker>) -> (Arc<ActivePool>, HealthMonitor) {
        let pool = BackendPool::new(checker);
        pool.add(Backend::new("b1", "10.0.0.1".parse().unwrap(), 80));
        pool.add(Backend::new("b2", "10.0.0.2".parse().unwrap(), 80));
        let active = Arc::new(ActivePool::new(pool));

        let config = HealthCheckConfig {
            enabled: true,
            interval_secs: 1,
            timeout_secs: 1,
            healthy_threshold: 2,
            unhealthy_threshold: 1,
        };
        (active.clone(), HealthMonitor::new(active, config))
    }

    #[tokio::test]
    async fn test_promotes_after_threshold() {
        let checker = Arc::new(StaticHealthChecker::new(true));
        let (active, mut monitor) = setup(checker);

        monitor.check_all().await;
        assert_eq!(active.load().healthy_count(), 0);

        monitor.check_all().await;
        assert_eq!(active.load().healthy_count(), 2);
        assert_eq!(active.load().ring_members(), vec!["b1".to_string(), "b2".to_string()]);
    }

    #[tokio::test]
    async fn test_demotes_on_failure() {
        let checker = Arc::new(StaticHealthChecker::new(true));
        let (active, mut monitor) = setup(checker.clone());
        monitor.check_all().await;
        monitor.check_all().await;

        checker.set(false);
        monitor.check_all().await;

        assert_eq!(active.load().healthy_count(), 0);
        assert!(active.load().ring_members().is_empty());
    }

    #[tokio::test]
    async fn test_pool_swap_restarts_streaks() {
        let checker = Arc::new(StaticHealthChecker::new(true));
        let (active, mut monitor) = setup(checker.clone());
        monitor.check_all().await;

        let replacement = BackendPool::new(checker);
        replacement.add(Backend::new("b1", "10.0.0.1".parse().unwrap(), 80));
        active.install(Arc::new(replacement));

        monitor.check_all().await;
        assert_eq!(active.load().healthy_count(), 0);

        monitor.check_all().await;
        assert_eq!(active.load().ring_members(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn test_disabled_monitor_returns_immediately() {
        let checker = Arc::new(StaticHealthChecker::new(true));
        let (_active, mut monitor) = setup(checker);
        monitor.config.enabled = false;

        let (_tx, rx) = broadcast::channel(1);
        monitor.run(rx).await;
    }
}
