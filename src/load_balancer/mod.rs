//! Backend pool and routing subsystem.
//!
//! # Data Flow
//! ```text
//! Control logic (membership watcher, config reload)
//!     → pool.rs (add / remove / mark_healthy / mark_unhealthy)
//!         → backend list + ring.rs updated under one write lock
//!     → exchange.rs (publish a whole new pool, swap it in atomically)
//!
//! Routing query
//!     → ActivePool::load() → BackendPool::route(key)
//!     → ring.rs (nearest healthy member) → Backend copy
//! ```
//!
//! # Design Decisions
//! - Ring membership mirrors the healthy flag exactly; there is no second lock
//! - Callers only ever see copies of backends
//! - Mutations on missing or already-transitioned backends are silent no-ops

pub mod backend;
pub mod exchange;
pub mod pool;
pub mod ring;

pub use backend::Backend;
pub use exchange::{pool_exchange, ActivePool, ExchangeError, PoolPublisher, PoolSubscriber};
pub use pool::{BackendPool, PoolView};
pub use ring::HashRing;
