//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::Ipv4Addr;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use tunnel_balancer::tunnel::{PacketSink, SinkError};
use tunnel_balancer::Backend;

pub fn backend(name: &str, ip: &str, port: u16) -> Backend {
    Backend::new(name, ip.parse().unwrap(), port)
}

/// Build a minimal IPv4/UDP packet carrying `payload`.
pub fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let total = (20 + payload.len()) as u16;
    let mut data = Vec::with_capacity(total as usize);
    data.extend_from_slice(&[0x45, 0x00]);
    data.extend_from_slice(&total.to_be_bytes());
    data.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 64, 17, 0x00, 0x00]);
    data.extend_from_slice(&src.octets());
    data.extend_from_slice(&dst.octets());
    data.extend_from_slice(payload);
    data
}

/// Sink that hands every delivered packet back to the test.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl RecordingSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PacketSink for RecordingSink {
    async fn send(&self, packet: Bytes) -> Result<(), SinkError> {
        self.tx
            .send(packet)
            .map_err(|_| SinkError::Transmit("recorder dropped".into()))
    }
}
