//! Configuration file watcher for hot reload.
//!
//! A changed backend list becomes a brand-new pool published through the
//! pool exchange; the running pool is never edited in place by a reload.
//! Backends that survive a reload unchanged keep their health, so routing
//! does not pause until the next health check.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::NodeConfig;
use crate::health::checker::HealthChecker;
use crate::load_balancer::exchange::{ActivePool, PoolPublisher};
use crate::load_balancer::pool::BackendPool;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<NodeConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<NodeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Failed to reload config: {}. Keeping current backend pool.",
                                    e
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Turn every reloaded config into a fresh pool and publish it.
///
/// Health of unchanged backends is copied from the pool in `active` at build
/// time. Stops on shutdown, when the update stream ends, or when nobody
/// consumes the exchange anymore.
pub async fn publish_reloads(
    mut updates: mpsc::UnboundedReceiver<NodeConfig>,
    publisher: PoolPublisher,
    active: Arc<ActivePool>,
    health_checker: Arc<dyn HealthChecker>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                let pool = BackendPool::from_config(
                    &config.backends,
                    health_checker.clone(),
                    config.pool.ring_replicas,
                );
                let carried = pool.inherit_health(&active.load());
                tracing::info!(
                    backends = pool.len(),
                    healthy = carried,
                    "Publishing reloaded backend pool"
                );
                if let Err(e) = publisher.publish(pool).await {
                    tracing::warn!(error = %e, "Dropping reloaded pool");
                    break;
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Reload publisher received shutdown signal, exiting loop");
                break;
            }
        }
    }
}
