//! Tunnel Balancer backend node (v1)
//!
//! Runs on every backend instance behind the load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                BACKEND NODE                  │
//!                         │                                              │
//!   GRE frames            │  ┌─────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────────────┼─▶│ ingress │──▶│ outbound │──▶│ forwarder │──┼──▶ local stack
//!                         │  │pipeline │   │  queue   │   │  + sink   │  │
//!                         │  └─────────┘   └──────────┘   └───────────┘  │
//!                         │                                              │
//!   membership changes    │  ┌──────────┐   ┌─────────────┐              │
//!   ──────────────────────┼─▶│ exchange │──▶│ active pool │◀─┐           │
//!                         │  └──────────┘   │ list + ring │  │           │
//!                         │                 └─────────────┘  │           │
//!                         │                 ┌─────────────┐  │           │
//!                         │                 │health monitor│──┘           │
//!                         │                 └─────────────┘              │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tunnel_balancer::config::watcher::{publish_reloads, ConfigWatcher};
use tunnel_balancer::config::{load_config, NodeConfig};
use tunnel_balancer::health::{HealthChecker, StaticHealthChecker};
use tunnel_balancer::lifecycle::{signals, BackendNode, Shutdown};
use tunnel_balancer::observability::{logging, metrics};
use tunnel_balancer::tunnel::TracingSink;

#[derive(Parser)]
#[command(name = "tunnel-balancer")]
#[command(about = "Backend node of a GRE tunneling load balancer", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the backend pool when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };

    logging::init(&config.observability.log_level);

    tracing::info!("tunnel-balancer v0.1.0 starting");
    tracing::info!(
        backends = config.backends.len(),
        health_checks = config.health_check.enabled,
        ingress_capacity = config.tunnel.ingress_capacity,
        outbound_capacity = config.tunnel.outbound_capacity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Probing is provided by the embedding deployment; standalone, every
    // configured backend is assumed reachable.
    let checker: Arc<dyn HealthChecker> = Arc::new(StaticHealthChecker::new(true));

    let shutdown = Shutdown::new();
    let node = BackendNode::start(&config, checker.clone(), TracingSink, &shutdown);

    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(publish_reloads(
                updates,
                node.publisher(),
                node.active_pool(),
                checker,
                shutdown.subscribe(),
            ));
            Some(handle)
        }
        _ => None,
    };

    signals::wait_for_signal().await?;
    shutdown.trigger();
    node.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
