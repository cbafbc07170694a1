//! Chunk references: the address, optionally carrying an encryption key.

use crate::{Address, ShoalError, ShoalResult, SEGMENT_SIZE};
use bytes::{BufMut, Bytes, BytesMut};

/// Length in bytes of a per-chunk encryption key.
pub const KEY_LENGTH: usize = 32;

/// A per-chunk symmetric encryption key.
///
/// Freshly random for every encrypted chunk. The key travels only inside
/// the reference; it is never persisted next to the chunk body.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncryptionKey(pub Bytes);

impl std::ops::Deref for EncryptionKey {
    type Target = Bytes;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Bytes> for EncryptionKey {
    fn from(b: Bytes) -> Self {
        EncryptionKey(b)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // the key itself stays out of logs
        f.write_str("EncryptionKey(..)")
    }
}

/// A reference to a stored chunk, as returned by a put and consumed by a
/// get.
///
/// The encoded length uniquely determines whether the chunk is encrypted:
/// 32 bytes for a plain address, 64 for address ‖ key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    address: Address,
    key: Option<EncryptionKey>,
}

impl Reference {
    /// A reference to an unencrypted chunk.
    pub fn plain(address: Address) -> Self {
        Self { address, key: None }
    }

    /// A reference to an encrypted chunk.
    pub fn encrypted(address: Address, key: EncryptionKey) -> Self {
        Self {
            address,
            key: Some(key),
        }
    }

    /// The chunk address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The encryption key, if the chunk is encrypted.
    pub fn encryption_key(&self) -> Option<&EncryptionKey> {
        self.key.as_ref()
    }

    /// Whether this reference points at an encrypted chunk.
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    /// The wire form: address, or address ‖ key.
    pub fn to_bytes(&self) -> Bytes {
        match &self.key {
            None => self.address.0.clone(),
            Some(key) => {
                let mut out =
                    BytesMut::with_capacity(SEGMENT_SIZE + KEY_LENGTH);
                out.put_slice(&self.address);
                out.put_slice(key);
                out.freeze()
            }
        }
    }
}

impl TryFrom<Bytes> for Reference {
    type Error = ShoalError;

    fn try_from(bytes: Bytes) -> ShoalResult<Self> {
        match bytes.len() {
            SEGMENT_SIZE => Ok(Self::plain(Address(bytes))),
            l if l == SEGMENT_SIZE + KEY_LENGTH => {
                let address = Address(bytes.slice(..SEGMENT_SIZE));
                let key = EncryptionKey(bytes.slice(SEGMENT_SIZE..));
                Ok(Self::encrypted(address, key))
            }
            l => Err(ShoalError::invalid_chunk(format!(
                "reference length must be {} or {}, got {}",
                SEGMENT_SIZE,
                SEGMENT_SIZE + KEY_LENGTH,
                l
            ))),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use base64::prelude::*;
        f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(self.to_bytes()))
    }
}
