//! Minimal IPv4 packet view.
//!
//! Only the fields needed to accept or reject a decapsulated payload and to
//! log where it is headed. The header checksum is not verified; the local
//! stack does that on delivery.

use std::net::Ipv4Addr;

use bytes::Bytes;
use thiserror::Error;

const MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Ipv4Error {
    #[error("IPv4 packet truncated: {0} bytes")]
    Truncated(usize),

    #[error("not an IPv4 packet: version {0}")]
    Version(u8),

    #[error("invalid IPv4 header length {0}")]
    HeaderLength(usize),

    #[error("invalid IPv4 total length {total} (header {header}, buffer {available})")]
    TotalLength {
        total: usize,
        header: usize,
        available: usize,
    },
}

/// A validated IPv4 packet backed by the received buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    data: Bytes,
    header_len: usize,
    total_len: usize,
}

impl Ipv4Packet {
    pub fn parse(data: Bytes) -> Result<Self, Ipv4Error> {
        if data.len() < MIN_HEADER_LEN {
            return Err(Ipv4Error::Truncated(data.len()));
        }

        let version = data[0] >> 4;
        if version != 4 {
            return Err(Ipv4Error::Version(version));
        }

        let header_len = usize::from(data[0] & 0x0f) * 4;
        if header_len < MIN_HEADER_LEN || header_len > data.len() {
            return Err(Ipv4Error::HeaderLength(header_len));
        }

        let total_len = usize::from(u16::from_be_bytes([data[2], data[3]]));
        if total_len < header_len || total_len > data.len() {
            return Err(Ipv4Error::TotalLength {
                total: total_len,
                header: header_len,
                available: data.len(),
            });
        }

        Ok(Self {
            data,
            header_len,
            total_len,
        })
    }

    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.data[12], self.data[13], self.data[14], self.data[15])
    }

    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.data[16], self.data[17], self.data[18], self.data[19])
    }

    /// Transport protocol number (6 = TCP, 17 = UDP, ...).
    pub fn protocol(&self) -> u8 {
        self.data[9]
    }

    pub fn ttl(&self) -> u8 {
        self.data[8]
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Transport payload as declared by the total length field.
    pub fn payload(&self) -> &[u8] {
        &self.data[self.header_len..self.total_len]
    }

    /// Raw bytes exactly as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}
