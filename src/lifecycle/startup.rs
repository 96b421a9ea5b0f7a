//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the initial pool from configuration
//! - Wire the tunnel queues
//! - Start background tasks (ingress, forwarder, pool follower, health checks)
//!
//! # Design Decisions
//! - Every task subscribes to the same shutdown broadcast
//! - The ingress sender is the only way frames enter the node; dropping every
//!   clone of it ends the pipeline

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::health::active::HealthMonitor;
use crate::health::checker::HealthChecker;
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::exchange::{pool_exchange, ActivePool, PoolPublisher};
use crate::load_balancer::pool::BackendPool;
use crate::tunnel::gre::TunnelFrame;
use crate::tunnel::ingress::IngressPipeline;
use crate::tunnel::sender::{PacketForwarder, PacketSink};

/// A running backend node.
pub struct BackendNode {
    ingress: mpsc::Sender<TunnelFrame>,
    active: Arc<ActivePool>,
    publisher: PoolPublisher,
    tasks: Vec<JoinHandle<()>>,
}

impl BackendNode {
    /// Start all node services. Must be called from within a Tokio runtime.
    pub fn start<S>(
        config: &NodeConfig,
        health_checker: Arc<dyn HealthChecker>,
        sink: S,
        shutdown: &Shutdown,
    ) -> Self
    where
        S: PacketSink + 'static,
    {
        let pool = BackendPool::from_config(
            &config.backends,
            health_checker,
            config.pool.ring_replicas,
        );
        let active = Arc::new(ActivePool::new(pool));
        let (publisher, subscriber) = pool_exchange(config.pool.exchange_capacity);

        let (ingress_tx, ingress_rx) = mpsc::channel(config.tunnel.ingress_capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::channel(config.tunnel.outbound_capacity.max(1));

        let mut tasks = Vec::new();

        let pipeline = IngressPipeline::new(ingress_rx, outbound_tx);
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            pipeline.run(rx).await;
        }));

        let forwarder = PacketForwarder::new(outbound_rx, sink);
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            forwarder.run(rx).await;
        }));

        tasks.push(tokio::spawn(
            active.clone().follow(subscriber, shutdown.subscribe()),
        ));

        if config.health_check.enabled {
            let monitor = HealthMonitor::new(active.clone(), config.health_check.clone());
            tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));
        }

        tracing::info!(
            backends = config.backends.len(),
            tasks = tasks.len(),
            "Backend node started"
        );

        Self {
            ingress: ingress_tx,
            active,
            publisher,
            tasks,
        }
    }

    /// Queue handle for the capture front-end.
    pub fn ingress(&self) -> mpsc::Sender<TunnelFrame> {
        self.ingress.clone()
    }

    /// The pool currently in effect.
    pub fn active_pool(&self) -> Arc<ActivePool> {
        self.active.clone()
    }

    /// Publisher for replacing the whole pool.
    pub fn publisher(&self) -> PoolPublisher {
        self.publisher.clone()
    }

    /// Wait for every background task to finish.
    ///
    /// The health monitor only stops on shutdown, so trigger it first.
    pub async fn join(self) {
        let Self {
            ingress,
            publisher,
            tasks,
            ..
        } = self;
        drop(ingress);
        drop(publisher);

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Node task failed");
            }
        }
        tracing::info!("Backend node stopped");
    }
}
