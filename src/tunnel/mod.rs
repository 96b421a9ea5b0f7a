//! Tunnel ingress subsystem.
//!
//! # Data Flow
//! ```text
//! Capture front-end
//!     → inbound queue (TunnelFrame, raw GRE bytes)
//!     → ingress.rs: gre.rs strips the header, ipv4.rs validates the payload
//!         → malformed: dropped
//!         → valid: raw packet bytes → outbound queue
//!     → sender.rs: PacketForwarder → PacketSink (local network stack)
//! ```
//!
//! # Design Decisions
//! - Both queues are bounded; a full outbound queue stalls ingestion
//! - Buffers are `Bytes`, so decapsulation slices instead of copying
//! - No per-frame timeout: a stuck sink stalls the pipeline until shutdown

pub mod gre;
pub mod ingress;
pub mod ipv4;
pub mod sender;

pub use gre::{GreError, GreHeader, TunnelFrame};
pub use ingress::{decapsulate, DecapError, IngressPipeline, IngressStats};
pub use ipv4::{Ipv4Error, Ipv4Packet};
pub use sender::{ForwarderStats, PacketForwarder, PacketSink, SinkError, TracingSink};
