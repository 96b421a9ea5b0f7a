//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Check each backend through its assigned checker.rs capability
//!     → state.rs counts consecutive outcomes
//!     → BackendPool::mark_healthy / mark_unhealthy on transition
//! ```
//!
//! # Design Decisions
//! - The probing protocol is supplied by the embedding system
//! - State transitions require consecutive successes/failures
//! - Checks run outside the pool lock; only the flip takes the write lock

pub mod active;
pub mod checker;
pub mod state;

pub use active::HealthMonitor;
pub use checker::{HealthChecker, StaticHealthChecker};
pub use state::{EntryKey, HealthState, HealthTracker};
