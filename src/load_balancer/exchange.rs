//! Pool exchange.
//!
//! # Responsibilities
//! - Let control logic (membership watchers, config reload) publish a freshly
//!   built pool to whichever component consumes membership
//! - Keep the currently active pool in a lock-free, versioned cell
//!
//! # Design Decisions
//! - The exchange is a bounded queue (default capacity 1), not a rendezvous:
//!   a publisher only waits while an earlier pool is still untaken, so it can
//!   be throttled but never starved by a slow subscriber
//! - Every published pool is taken by at most one subscriber, even when the
//!   subscriber handle is cloned
//! - `ActivePool` swaps whole pools through `arc-swap`; readers never block

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::load_balancer::pool::BackendPool;
use crate::observability::metrics;

/// Errors surfaced to publishers.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Every subscriber has been dropped.
    #[error("pool exchange closed: no subscriber left")]
    Closed,

    /// The slot still holds an untaken pool.
    #[error("pool exchange full: previous pool not yet taken")]
    Full,
}

/// Create a pool exchange holding up to `capacity` untaken pools.
pub fn pool_exchange(capacity: usize) -> (PoolPublisher, PoolSubscriber) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PoolPublisher { tx },
        PoolSubscriber {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Publishing side of the exchange.
#[derive(Debug, Clone)]
pub struct PoolPublisher {
    tx: mpsc::Sender<Arc<BackendPool>>,
}

impl PoolPublisher {
    /// Publish a pool, waiting while the slot is occupied.
    pub async fn publish(&self, pool: impl Into<Arc<BackendPool>>) -> Result<(), ExchangeError> {
        self.tx
            .send(pool.into())
            .await
            .map_err(|_| ExchangeError::Closed)
    }

    /// Publish without waiting.
    pub fn try_publish(&self, pool: impl Into<Arc<BackendPool>>) -> Result<(), ExchangeError> {
        self.tx.try_send(pool.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExchangeError::Full,
            mpsc::error::TrySendError::Closed(_) => ExchangeError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consuming side of the exchange.
#[derive(Debug, Clone)]
pub struct PoolSubscriber {
    rx: Arc<Mutex<mpsc::Receiver<Arc<BackendPool>>>>,
}

impl PoolSubscriber {
    /// Take the next published pool. `None` once every publisher is gone.
    pub async fn next(&self) -> Option<Arc<BackendPool>> {
        self.rx.lock().await.recv().await
    }
}

/// The pool currently serving membership queries.
pub struct ActivePool {
    current: ArcSwap<BackendPool>,
    version: AtomicU64,
}

impl ActivePool {
    pub fn new(pool: impl Into<Arc<BackendPool>>) -> Self {
        let pool = pool.into();
        pool.mark_installed();
        Self {
            current: ArcSwap::new(pool),
            version: AtomicU64::new(0),
        }
    }

    /// The pool in effect right now.
    pub fn load(&self) -> Arc<BackendPool> {
        self.current.load_full()
    }

    /// Swap in a new pool and return its version.
    ///
    /// The replaced pool stops reporting health metrics and the gauges of
    /// backends that did not survive the swap drop to zero.
    pub fn install(&self, pool: Arc<BackendPool>) -> u64 {
        let backends = pool.len();
        let previous = self.current.swap(pool.clone());
        if !Arc::ptr_eq(&previous, &pool) {
            let departed = previous.retire();
            pool.mark_installed();
            for name in departed.iter().filter(|name| !pool.contains(name)) {
                metrics::record_backend_health(name, false);
            }
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(version, backends, "Installed new backend pool");
        metrics::record_pool_installed(version, backends);
        version
    }

    /// Number of pools installed since creation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Install every pool taken from `subscriber` until shutdown or until the
    /// exchange closes.
    pub async fn follow(
        self: Arc<Self>,
        subscriber: PoolSubscriber,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                next = subscriber.next() => match next {
                    Some(pool) => {
                        self.install(pool);
                    }
                    None => {
                        tracing::debug!("Pool exchange closed, active pool frozen");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Pool follower received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for ActivePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePool")
            .field("version", &self.version())
            .field("current", &self.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::checker::StaticHealthChecker;
    use crate::load_balancer::backend::Backend;
    use crate::observability::metrics::capture::HealthGauges;
    use std::time::Duration;

    fn pool_with(names: &[&str]) -> BackendPool {
        let pool = BackendPool::new(Arc::new(StaticHealthChecker::new(true)));
        for (i, name) in names.iter().enumerate() {
            pool.add(Backend::new(*name, format!("10.0.0.{}", i + 1).parse().unwrap(), 80));
        }
        pool
    }

    #[tokio::test]
    async fn test_publish_then_take() {
        let (publisher, subscriber) = pool_exchange(1);
        publisher.publish(pool_with(&["b1", "b2"])).await.unwrap();

        let pool = subscriber.next().await.unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_single_slot_reports_full() {
        let (publisher, subscriber) = pool_exchange(1);
        publisher.try_publish(pool_with(&["b1"])).unwrap();

        assert!(matches!(
            publisher.try_publish(pool_with(&["b2"])),
            Err(ExchangeError::Full)
        ));

        subscriber.next().await.unwrap();
        publisher.try_publish(pool_with(&["b2"])).unwrap();
    }

    #[tokio::test]
    async fn test_each_pool_taken_once() {
        let (publisher, subscriber) = pool_exchange(1);
        let other = subscriber.clone();
        publisher.publish(pool_with(&["b1"])).await.unwrap();

        assert!(subscriber.next().await.is_some());
        let second = tokio::time::timeout(Duration::from_millis(50), other.next()).await;
        assert!(second.is_err(), "pool must not be delivered twice");
    }

    #[tokio::test]
    async fn test_publish_after_subscriber_dropped() {
        let (publisher, subscriber) = pool_exchange(1);
        drop(subscriber);

        assert!(publisher.is_closed());
        assert!(matches!(
            publisher.publish(pool_with(&["b1"])).await,
            Err(ExchangeError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_follow_installs_published_pools() {
        let active = Arc::new(ActivePool::new(pool_with(&[])));
        let (publisher, subscriber) = pool_exchange(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let follower = tokio::spawn(active.clone().follow(subscriber, shutdown_rx));

        publisher.publish(pool_with(&["b1", "b2", "b3"])).await.unwrap();
        drop(publisher);
        follower.await.unwrap();

        assert_eq!(active.version(), 1);
        assert_eq!(active.load().len(), 3);
        drop(shutdown_tx);
    }

    #[test]
    fn test_install_hands_over_health_reporting() {
        let gauges = HealthGauges::default();
        ::metrics::with_local_recorder(&gauges, || {
            let first = Arc::new(pool_with(&["b1", "b2"]));
            first.mark_healthy(&Backend::new("b1", "10.0.0.1".parse().unwrap(), 80));
            let active = ActivePool::new(first.clone());
            assert!(first.is_installed());
            assert_eq!(gauges.get("b1"), Some(1.0));

            let second = Arc::new(pool_with(&["b1"]));
            assert!(!second.is_installed());
            second.inherit_health(&first);
            active.install(second.clone());

            assert!(!first.is_installed());
            assert!(second.is_installed());
            assert_eq!(gauges.get("b1"), Some(1.0));
            assert_eq!(gauges.get("b2"), Some(0.0));

            // Late flips on the retired pool no longer touch the gauge.
            first.mark_unhealthy(&Backend::new("b1", "10.0.0.1".parse().unwrap(), 80));
            assert_eq!(gauges.get("b1"), Some(1.0));
        });
    }
}
