//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a backend node.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Root configuration for a backend node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Backend instances forming the initial pool.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Tunnel queue sizing.
    pub tunnel: TunnelConfig,

    /// Ring and exchange settings.
    pub pool: PoolConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier, also its ring key.
    pub name: String,

    /// Backend address (e.g., "10.0.0.1").
    pub ip: IpAddr,

    /// Backend port.
    pub port: u16,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 5,
            healthy_threshold: 1,
            unhealthy_threshold: 3,
        }
    }
}

/// Queue capacities for the tunnel pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Frames buffered between the capture front-end and the pipeline.
    pub ingress_capacity: usize,

    /// Packets buffered between the pipeline and the sink (backpressure).
    pub outbound_capacity: usize,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            ingress_capacity: 1024,
            outbound_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Virtual ring points per backend.
    pub ring_replicas: usize,

    /// Untaken pools the exchange may hold before publishers wait.
    pub exchange_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            ring_replicas: crate::load_balancer::ring::DEFAULT_REPLICAS,
            exchange_capacity: 1,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
