//! Tunnel ingress pipeline.
//!
//! # Responsibilities
//! - Consume GRE frames from the inbound queue
//! - Recover the inner IPv4 packet
//! - Forward its raw bytes to the outbound queue toward the local stack
//!
//! # Design Decisions
//! - Independent of pool state: a frame reaching this node was already routed
//! - Malformed frames are dropped without surfacing an error
//! - Forwarding awaits queue capacity, so a slow consumer throttles ingestion

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::tunnel::gre::{GreError, TunnelFrame};
use crate::tunnel::ipv4::{Ipv4Error, Ipv4Packet};

/// Why a frame could not be decapsulated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecapError {
    #[error(transparent)]
    Gre(#[from] GreError),

    #[error(transparent)]
    Ipv4(#[from] Ipv4Error),
}

/// Strip the tunnel header and parse the payload as IPv4.
pub fn decapsulate(frame: &TunnelFrame) -> Result<Ipv4Packet, DecapError> {
    let payload = frame.payload()?;
    Ok(Ipv4Packet::parse(payload)?)
}

/// Frame counts reported when the pipeline stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngressStats {
    pub received: u64,
    pub forwarded: u64,
    pub dropped: u64,
}

pub struct IngressPipeline {
    inbound: mpsc::Receiver<TunnelFrame>,
    outbound: mpsc::Sender<Bytes>,
    stats: IngressStats,
}

impl IngressPipeline {
    pub fn new(inbound: mpsc::Receiver<TunnelFrame>, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            inbound,
            outbound,
            stats: IngressStats::default(),
        }
    }

    /// Run until the inbound queue closes, the outbound queue closes, or
    /// shutdown is signalled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> IngressStats {
        tracing::info!("Tunnel ingress pipeline starting");

        loop {
            tokio::select! {
                frame = self.inbound.recv() => {
                    let Some(frame) = frame else {
                        tracing::info!("Ingress queue closed");
                        break;
                    };
                    if !self.handle(frame).await {
                        tracing::warn!("Outbound queue closed, stopping ingress");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Ingress pipeline received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        tracing::info!(
            received = self.stats.received,
            forwarded = self.stats.forwarded,
            dropped = self.stats.dropped,
            "Tunnel ingress pipeline stopped"
        );
        self.stats
    }

    /// Returns false once the outbound side is gone.
    async fn handle(&mut self, frame: TunnelFrame) -> bool {
        self.stats.received += 1;

        let packet = match decapsulate(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.dropped += 1;
                metrics::record_frame("dropped");
                tracing::trace!(error = %e, len = frame.as_bytes().len(), "Dropping tunnel frame");
                return true;
            }
        };

        tracing::trace!(
            src = %packet.source(),
            dst = %packet.destination(),
            protocol = packet.protocol(),
            len = packet.total_len(),
            "Decapsulated packet"
        );

        if self.outbound.send(packet.into_bytes()).await.is_err() {
            return false;
        }
        self.stats.forwarded += 1;
        metrics::record_frame("forwarded");
        true
    }
}
