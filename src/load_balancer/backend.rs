//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend service instance
//! - Carry the health checker assigned by the owning pool
//! - Track health state (Healthy/Unhealthy)

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::health::checker::HealthChecker;

/// A single backend instance.
///
/// Values handed out by the pool are copies; changing one never touches the
/// pool's own entry.
#[derive(Clone)]
pub struct Backend {
    /// Unique identity, also the key used in the hash ring.
    pub name: String,
    /// Address of the instance.
    pub ip: IpAddr,
    /// Port of the instance.
    pub port: u16,
    /// Checker assigned by the pool at insertion time.
    pub health_checker: Option<Arc<dyn HealthChecker>>,

    healthy: bool,
}

impl Backend {
    /// Create a new backend. It starts out unhealthy.
    pub fn new(name: impl Into<String>, ip: IpAddr, port: u16) -> Self {
        Self {
            name: name.into(),
            ip,
            port,
            health_checker: None,
            healthy: false,
        }
    }

    /// Socket address of the instance.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Overwrite the health flag on this copy.
    ///
    /// The pool ignores this value on `add` and only trusts its own transitions.
    pub fn set_healthy(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    /// True for the zero value returned when a removal finds nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.port == 0 && self.ip.is_unspecified()
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(String::new(), IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    }
}

impl From<&BackendConfig> for Backend {
    fn from(config: &BackendConfig) -> Self {
        Self::new(config.name.clone(), config.ip, config.port)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("addr", &self.addr())
            .field("healthy", &self.healthy)
            .field("has_checker", &self.health_checker.is_some())
            .finish()
    }
}

// The checker is a capability, not identity.
impl PartialEq for Backend {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ip == other.ip
            && self.port == other.port
            && self.healthy == other.healthy
    }
}

impl Eq for Backend {}
