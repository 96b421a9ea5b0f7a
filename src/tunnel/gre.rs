//! GRE framing (RFC 2784 with the RFC 2890 key/sequence extensions).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |C|R|K|S|  Reserved0    | Ver |         Protocol Type         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Checksum (optional)      |       Reserved1 (Optional)    |
//! |                         Key (optional)                        |
//! |                 Sequence Number (optional)                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// EtherType carried in the protocol field for an IPv4 payload.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

const FLAG_CHECKSUM: u16 = 0x8000;
const FLAG_ROUTING: u16 = 0x4000;
const FLAG_KEY: u16 = 0x2000;
const FLAG_SEQUENCE: u16 = 0x1000;
const VERSION_MASK: u16 = 0x0007;

const BASE_HEADER_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GreError {
    #[error("GRE header truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unsupported GRE version {0}")]
    UnsupportedVersion(u8),

    #[error("GRE source routing is not supported")]
    SourceRouting,

    #[error("unsupported GRE payload protocol {0:#06x}")]
    UnsupportedProtocol(u16),
}

/// Decoded GRE header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreHeader {
    pub protocol: u16,
    pub checksum: Option<u16>,
    pub key: Option<u32>,
    pub sequence: Option<u32>,
    /// Length of the header on the wire, i.e. the payload offset.
    pub len: usize,
}

impl GreHeader {
    pub fn parse(data: &[u8]) -> Result<Self, GreError> {
        if data.len() < BASE_HEADER_LEN {
            return Err(GreError::Truncated {
                needed: BASE_HEADER_LEN,
                available: data.len(),
            });
        }

        let flags = u16::from_be_bytes([data[0], data[1]]);
        let protocol = u16::from_be_bytes([data[2], data[3]]);

        let version = (flags & VERSION_MASK) as u8;
        if version != 0 {
            return Err(GreError::UnsupportedVersion(version));
        }
        if flags & FLAG_ROUTING != 0 {
            return Err(GreError::SourceRouting);
        }

        let mut len = BASE_HEADER_LEN;
        if flags & FLAG_CHECKSUM != 0 {
            len += 4;
        }
        if flags & FLAG_KEY != 0 {
            len += 4;
        }
        if flags & FLAG_SEQUENCE != 0 {
            len += 4;
        }
        if data.len() < len {
            return Err(GreError::Truncated {
                needed: len,
                available: data.len(),
            });
        }

        let word = |offset: usize| {
            u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
        };

        let mut offset = BASE_HEADER_LEN;
        let checksum = (flags & FLAG_CHECKSUM != 0).then(|| {
            let value = u16::from_be_bytes([data[offset], data[offset + 1]]);
            offset += 4;
            value
        });
        let key = (flags & FLAG_KEY != 0).then(|| {
            let value = word(offset);
            offset += 4;
            value
        });
        let sequence = (flags & FLAG_SEQUENCE != 0).then(|| word(offset));

        Ok(Self {
            protocol,
            checksum,
            key,
            sequence,
            len,
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut flags = 0u16;
        if self.checksum.is_some() {
            flags |= FLAG_CHECKSUM;
        }
        if self.key.is_some() {
            flags |= FLAG_KEY;
        }
        if self.sequence.is_some() {
            flags |= FLAG_SEQUENCE;
        }
        buf.put_u16(flags);
        buf.put_u16(self.protocol);
        if let Some(checksum) = self.checksum {
            buf.put_u16(checksum);
            buf.put_u16(0);
        }
        if let Some(key) = self.key {
            buf.put_u32(key);
        }
        if let Some(sequence) = self.sequence {
            buf.put_u32(sequence);
        }
    }
}

/// One GRE-encapsulated unit as it arrives on the ingress queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelFrame {
    data: Bytes,
}

impl TunnelFrame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Wrap an IPv4 packet in a GRE header, optionally keyed.
    pub fn encapsulate(inner: &[u8], key: Option<u32>) -> Self {
        let header = GreHeader {
            protocol: ETHERTYPE_IPV4,
            checksum: None,
            key,
            sequence: None,
            len: BASE_HEADER_LEN + if key.is_some() { 4 } else { 0 },
        };
        let mut buf = BytesMut::with_capacity(header.len + inner.len());
        header.encode(&mut buf);
        buf.extend_from_slice(inner);
        Self { data: buf.freeze() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> Result<GreHeader, GreError> {
        GreHeader::parse(&self.data)
    }

    /// The encapsulated IPv4 payload, without copying.
    pub fn payload(&self) -> Result<Bytes, GreError> {
        let header = self.header()?;
        if header.protocol != ETHERTYPE_IPV4 {
            return Err(GreError::UnsupportedProtocol(header.protocol));
        }
        Ok(self.data.slice(header.len..))
    }
}
