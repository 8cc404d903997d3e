use crate::error::StoreError;

pub(crate) const MAGIC: [u8; 8] = *b"QRYSHARD";
pub(crate) const HEADER_VERSION: u16 = 1;
pub(crate) const HEADER_LEN: usize = 48;

/// What a persisted blob contains.
///
/// Only file shards exist today; the tag keeps the format open for other
/// artifacts without a magic change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    FileShard,
}

impl ArtifactKind {
    fn to_u16(self) -> u16 {
        match self {
            ArtifactKind::FileShard => 1,
        }
    }

    fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(ArtifactKind::FileShard),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd,
}

impl Compression {
    fn to_u8(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Zstd => 1,
        }
    }

    fn from_u8(value: u8) -> Result<Self, StoreError> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zstd),
            other => Err(StoreError::UnsupportedCompression(other)),
        }
    }
}

/// Write-side compression policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteCompression {
    None,
    Zstd { level: i32 },
    /// Compress with zstd (default level) once the payload reaches
    /// `threshold` bytes; small shards stay uncompressed.
    Auto { threshold: u64 },
}

impl Default for WriteCompression {
    fn default() -> Self {
        Self::Auto {
            threshold: 64 * 1024,
        }
    }
}

/// Fixed-size little-endian blob header.
///
/// Layout: magic(8) + header_version(u16) + kind(u16) + schema_version(u32) +
/// compression(u8) + reserved(3) + payload_len(u64) + uncompressed_len(u64) +
/// content_hash(u64) + reserved(4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlobHeader {
    pub kind: ArtifactKind,
    pub schema_version: u32,
    pub compression: Compression,
    pub payload_len: u64,
    pub uncompressed_len: u64,
    pub content_hash: u64,
}

impl BlobHeader {
    pub(crate) fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0_u8; HEADER_LEN];
        out[0..8].copy_from_slice(&MAGIC);
        out[8..10].copy_from_slice(&HEADER_VERSION.to_le_bytes());
        out[10..12].copy_from_slice(&self.kind.to_u16().to_le_bytes());
        out[12..16].copy_from_slice(&self.schema_version.to_le_bytes());
        out[16] = self.compression.to_u8();
        out[20..28].copy_from_slice(&self.payload_len.to_le_bytes());
        out[28..36].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        out[36..44].copy_from_slice(&self.content_hash.to_le_bytes());
        out
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Truncated {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }
        if bytes[0..8] != MAGIC {
            return Err(StoreError::InvalidHeader("bad magic"));
        }
        let header_version = u16::from_le_bytes(bytes[8..10].try_into().expect("header slice"));
        if header_version != HEADER_VERSION {
            return Err(StoreError::InvalidHeader("unknown header version"));
        }
        let kind_raw = u16::from_le_bytes(bytes[10..12].try_into().expect("header slice"));
        let kind = ArtifactKind::from_u16(kind_raw)
            .ok_or(StoreError::InvalidHeader("unknown artifact kind"))?;
        let schema_version = u32::from_le_bytes(bytes[12..16].try_into().expect("header slice"));
        let compression = Compression::from_u8(bytes[16])?;
        let payload_len = u64::from_le_bytes(bytes[20..28].try_into().expect("header slice"));
        let uncompressed_len =
            u64::from_le_bytes(bytes[28..36].try_into().expect("header slice"));
        let content_hash = u64::from_le_bytes(bytes[36..44].try_into().expect("header slice"));
        Ok(Self {
            kind,
            schema_version,
            compression,
            payload_len,
            uncompressed_len,
            content_hash,
        })
    }
}

/// First eight bytes of the blake3 hash, enough to catch torn writes and
/// bit rot without widening the header.
pub(crate) fn content_hash(payload: &[u8]) -> u64 {
    let hash_bytes = blake3::hash(payload);
    u64::from_le_bytes(hash_bytes.as_bytes()[..8].try_into().expect("hash slice"))
}
