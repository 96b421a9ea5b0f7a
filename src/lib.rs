//! Backend-side control plane of a GRE tunneling load balancer.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod tunnel;

pub use config::NodeConfig;
pub use lifecycle::{BackendNode, Shutdown};
pub use load_balancer::{Backend, BackendPool};
