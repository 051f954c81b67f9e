//! Log records
//!
//! One record per mutation. The frame carries its own CRC32 so a damaged
//! record is caught even when the region checksum happens to balance.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Frame header size: BodyLen (2) + CRC32 (4) = 6 bytes
pub const RECORD_HEADER_SIZE: usize = 6;

/// A single entry in the store log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,

    /// `None` marks a removal (tombstone)
    pub value: Option<Vec<u8>>,
}

impl Record {
    pub fn put(key: &str, value: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_vec()),
        }
    }

    pub fn tombstone(key: &str) -> Self {
        Self {
            key: key.to_string(),
            value: None,
        }
    }

    /// Framed size of this record in the log
    pub fn encoded_len(&self) -> Result<usize> {
        Ok(RECORD_HEADER_SIZE + bincode::serialized_size(self)? as usize)
    }

    /// Append the framed record to `out`
    pub fn encode(&self, out: &mut BytesMut) -> Result<()> {
        let body = bincode::serialize(self)?;
        let len = u16::try_from(body.len()).map_err(|_| StoreError::OverLength {
            what: "record",
            len: body.len(),
            limit: u16::MAX as usize,
        })?;

        out.reserve(RECORD_HEADER_SIZE + body.len());
        out.put_u16_le(len);
        out.put_u32_le(crc32fast::hash(&body));
        out.put_slice(&body);
        Ok(())
    }

    /// Decode every record in a finalized log, oldest first
    pub fn decode_all(mut log: &[u8]) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        while log.has_remaining() {
            if log.remaining() < RECORD_HEADER_SIZE {
                return Err(StoreError::Integrity(format!(
                    "truncated record header at offset {}",
                    offset
                )));
            }
            let len = log.get_u16_le() as usize;
            let crc = log.get_u32_le();

            if log.remaining() < len {
                return Err(StoreError::Integrity(format!(
                    "record at offset {} claims {} bytes, {} left",
                    offset,
                    len,
                    log.remaining()
                )));
            }
            let body = &log[..len];
            if crc32fast::hash(body) != crc {
                return Err(StoreError::Integrity(format!(
                    "record CRC mismatch at offset {}",
                    offset
                )));
            }
            let record: Record = bincode::deserialize(body).map_err(|e| {
                StoreError::Integrity(format!("undecodable record at offset {}: {}", offset, e))
            })?;

            records.push(record);
            log.advance(len);
            offset += RECORD_HEADER_SIZE + len;
        }

        Ok(records)
    }
}
