//! On-disk framing for snapshot bodies

use crate::{Result, SnapshotError};

/// Snapshot record header (version 1)
///
/// Format: magic(4) + flags(1) + orig_len(8, little endian) = 13 bytes,
/// followed by the body (zstd-compressed when bit0 of `flags` is set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeaderV1 {
    /// Magic bytes: "TSN1"
    pub magic: [u8; 4],
    /// Flags: bit0=compressed, bit1-7=reserved
    pub flags: u8,
    /// Length of the UTF-8 text before compression
    pub orig_len: u64,
}

impl RecordHeaderV1 {
    pub const MAGIC: [u8; 4] = *b"TSN1";
    pub const LEN: usize = 13;
    const FLAG_COMPRESSED: u8 = 0b0000_0001;

    pub fn new(orig_len: u64, compressed: bool) -> Self {
        let flags = if compressed { Self::FLAG_COMPRESSED } else { 0 };
        Self {
            magic: Self::MAGIC,
            flags,
            orig_len,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESSED) != 0
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&self.magic);
        out[4] = self.flags;
        out[5..].copy_from_slice(&self.orig_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(SnapshotError::InvalidRecord(format!(
                "record too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[..4] != Self::MAGIC {
            return Err(SnapshotError::InvalidRecord("bad magic".to_string()));
        }
        let flags = bytes[4];
        if flags & !Self::FLAG_COMPRESSED != 0 {
            return Err(SnapshotError::InvalidRecord(format!(
                "reserved flag bits set: {flags:#010b}"
            )));
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[5..Self::LEN]);
        Ok(Self {
            magic: Self::MAGIC,
            flags,
            orig_len: u64::from_le_bytes(len),
        })
    }
}

/// Frame a snapshot body, compressing it when it is at least
/// `compress_threshold` bytes and compression actually saves space
pub fn encode_record(text: &str, compress_threshold: usize, level: i32) -> Result<Vec<u8>> {
    let data = text.as_bytes();

    let compressed = if data.len() >= compress_threshold {
        let packed = zstd::encode_all(data, level)?;
        (packed.len() < data.len()).then_some(packed)
    } else {
        None
    };

    let header = RecordHeaderV1::new(data.len() as u64, compressed.is_some());
    let body = compressed.as_deref().unwrap_or(data);

    let mut out = Vec::with_capacity(RecordHeaderV1::LEN + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Decode a framed record back into text
pub fn decode_record(bytes: &[u8]) -> Result<String> {
    let header = RecordHeaderV1::from_bytes(bytes)?;
    let body = &bytes[RecordHeaderV1::LEN..];

    let data = if header.is_compressed() {
        zstd::decode_all(body)?
    } else {
        body.to_vec()
    };

    if data.len() as u64 != header.orig_len {
        return Err(SnapshotError::InvalidRecord(format!(
            "length mismatch: header says {}, body has {}",
            header.orig_len,
            data.len()
        )));
    }
    String::from_utf8(data).map_err(|e| SnapshotError::InvalidRecord(e.to_string()))
}
