//! In-band network telemetry header carried in the padding of ARP requests.
//!
//! ```text
//! | proto: u16 | hop_count: u16 | path_id: u32 * hop_count |
//! ```
//! All fields are big-endian. Anything after the last path id is ignored when
//! decoding, so the header survives Ethernet minimum-size padding.

use crate::error::{Error, Result};

/// EtherType-like marker the sender writes into `proto` unless told otherwise.
pub const DEFAULT_PROTO: u16 = 0x0800;

const PREFIX_LEN: usize = 4;
const PATH_ID_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHeader {
    proto: u16,
    hop_count: u16,
    path_ids: Vec<u32>,
}

impl TelemetryHeader {
    pub fn new(proto: u16, path_ids: Vec<u32>) -> Result<Self> {
        let hop_count = u16::try_from(path_ids.len()).map_err(|_| {
            Error::InvalidArgument(format!(
                "{} path ids do not fit into a 16-bit hop count",
                path_ids.len()
            ))
        })?;

        Ok(TelemetryHeader {
            proto,
            hop_count,
            path_ids,
        })
    }

    pub fn proto(&self) -> u16 {
        self.proto
    }

    pub fn hop_count(&self) -> u16 {
        self.hop_count
    }

    /// Path ids in wire order.
    pub fn path_ids(&self) -> &[u32] {
        &self.path_ids
    }

    pub fn encoded_len(&self) -> usize {
        PREFIX_LEN + PATH_ID_LEN * self.path_ids.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.proto.to_be_bytes());
        buf.extend_from_slice(&self.hop_count.to_be_bytes());
        for id in &self.path_ids {
            buf.extend_from_slice(&id.to_be_bytes());
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREFIX_LEN {
            return Err(Error::MalformedHeader {
                needed: PREFIX_LEN,
                available: bytes.len(),
            });
        }

        let proto = u16::from_be_bytes([bytes[0], bytes[1]]);
        let hop_count = u16::from_be_bytes([bytes[2], bytes[3]]);

        let needed = PREFIX_LEN + PATH_ID_LEN * hop_count as usize;
        if bytes.len() < needed {
            return Err(Error::MalformedHeader {
                needed,
                available: bytes.len(),
            });
        }

        let path_ids = bytes[PREFIX_LEN..needed]
            .chunks_exact(PATH_ID_LEN)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(TelemetryHeader {
            proto,
            hop_count,
            path_ids,
        })
    }
}
