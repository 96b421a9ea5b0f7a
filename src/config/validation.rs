//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals, thresholds and capacities > 0, ports valid)
//! - Detect duplicate backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::NodeConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("backend name must not be empty")]
    EmptyName,

    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{0}' has port 0")]
    InvalidPort(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if backend.name.is_empty() {
            errors.push(ValidationError::EmptyName);
        } else if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if backend.port == 0 {
            errors.push(ValidationError::InvalidPort(backend.name.clone()));
        }
    }

    let health = &config.health_check;
    let positive = [
        ("health_check.interval_secs", health.interval_secs as usize),
        ("health_check.timeout_secs", health.timeout_secs as usize),
        ("health_check.healthy_threshold", health.healthy_threshold as usize),
        ("health_check.unhealthy_threshold", health.unhealthy_threshold as usize),
        ("tunnel.ingress_capacity", config.tunnel.ingress_capacity),
        ("tunnel.outbound_capacity", config.tunnel.outbound_capacity),
        ("pool.ring_replicas", config.pool.ring_replicas),
        ("pool.exchange_capacity", config.pool.exchange_capacity),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
