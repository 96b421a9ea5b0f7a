//! Outbound packet forwarding.
//!
//! Drains the outbound queue and hands each decapsulated packet to a
//! [`PacketSink`], the transmission primitive supplied by the host (raw
//! socket, TUN device, ...).

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::tunnel::ipv4::Ipv4Packet;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transmit failed: {0}")]
    Transmit(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Puts a raw IPv4 packet onto the local network stack.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn send(&self, packet: Bytes) -> Result<(), SinkError>;
}

/// Sink that only logs what would have been transmitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl PacketSink for TracingSink {
    async fn send(&self, packet: Bytes) -> Result<(), SinkError> {
        match Ipv4Packet::parse(packet.clone()) {
            Ok(ip) => tracing::debug!(
                src = %ip.source(),
                dst = %ip.destination(),
                protocol = ip.protocol(),
                len = packet.len(),
                "Delivering packet"
            ),
            Err(_) => tracing::debug!(len = packet.len(), "Delivering packet"),
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderStats {
    pub sent: u64,
    pub failed: u64,
}

pub struct PacketForwarder<S> {
    outbound: mpsc::Receiver<Bytes>,
    sink: S,
}

impl<S: PacketSink> PacketForwarder<S> {
    pub fn new(outbound: mpsc::Receiver<Bytes>, sink: S) -> Self {
        Self { outbound, sink }
    }

    /// Run until the outbound queue closes or shutdown is signalled.
    /// Sink failures are logged and counted; they never stop the loop.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> ForwarderStats {
        let mut stats = ForwarderStats::default();

        loop {
            tokio::select! {
                packet = self.outbound.recv() => {
                    let Some(packet) = packet else { break };
                    let len = packet.len();
                    match self.sink.send(packet).await {
                        Ok(()) => {
                            stats.sent += 1;
                            metrics::record_packet_sent();
                        }
                        Err(e) => {
                            stats.failed += 1;
                            metrics::record_send_error();
                            tracing::warn!(error = %e, len, "Failed to deliver packet");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Packet forwarder received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        tracing::info!(sent = stats.sent, failed = stats.failed, "Packet forwarder stopped");
        stats
    }
}
