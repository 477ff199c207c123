use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::StorageError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 digest identifying a byte payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint an in-memory payload.
    pub fn of(data: &[u8]) -> Self {
        let mut fingerprinter = Fingerprinter::new();
        fingerprinter.update(data);
        fingerprinter.finish().fingerprint
    }

    /// Parse a 64-character hex string. Upper-case digits are accepted.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != 64 {
            return Err(StorageError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }

        let bytes =
            hex::decode(s).map_err(|e| StorageError::InvalidHash(format!("invalid hex: {e}")))?;

        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidHash("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// 64-character lowercase hex form. This is the wire format.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Content-addressed storage location, sharded on the first byte:
    /// `{2 hex chars}/{62 hex chars}`.
    pub fn location(&self) -> String {
        format!("{}/{}", hex::encode(&self.0[..1]), hex::encode(&self.0[1..]))
    }

    /// Inverse of [`Fingerprint::location`]. Anything that is not exactly a
    /// shard prefix plus the remaining digest is rejected, so a location can
    /// never escape the store root.
    pub fn from_location(location: &str) -> Result<Self, StorageError> {
        let (prefix, suffix) = location
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidHash(format!("malformed location: {location}")))?;
        if prefix.len() != 2 || suffix.len() != 62 {
            return Err(StorageError::InvalidHash(format!(
                "malformed location: {location}"
            )));
        }
        Self::from_hex(&format!("{prefix}{suffix}"))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Outcome of hashing a complete stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinted {
    pub fingerprint: Fingerprint,
    /// Number of bytes observed.
    pub byte_length: u64,
}

/// Incremental SHA-256 hasher.
///
/// Feeding the same bytes in any chunking yields the same fingerprint.
#[derive(Clone, Default)]
pub struct Fingerprinter {
    hasher: Sha256,
    byte_length: u64,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.byte_length += chunk.len() as u64;
    }

    /// Bytes consumed so far.
    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    pub fn finish(self) -> Fingerprinted {
        Fingerprinted {
            fingerprint: Fingerprint(self.hasher.finalize().into()),
            byte_length: self.byte_length,
        }
    }
}

impl fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerprinter")
            .field("byte_length", &self.byte_length)
            .finish_non_exhaustive()
    }
}

/// Copy `reader` into `writer` while hashing it.
///
/// A failure on the read side is reported as [`StorageError::StreamRead`] and
/// a failure on the write side as [`StorageError::Io`]; no fingerprint is
/// produced in either case. The writer is flushed on success.
pub async fn spool<R, W>(
    reader: &mut R,
    writer: &mut W,
    max_size: u64,
) -> Result<Fingerprinted, StorageError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut fingerprinter = Fingerprinter::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await.map_err(StorageError::StreamRead)?;
        if n == 0 {
            break;
        }

        let total = fingerprinter.byte_length() + n as u64;
        if total > max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: total,
                limit: max_size,
            });
        }

        fingerprinter.update(&buf[..n]);
        writer.write_all(&buf[..n]).await?;
    }

    writer.flush().await?;
    Ok(fingerprinter.finish())
}
