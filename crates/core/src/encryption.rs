//! Per-chunk symmetric encryption.
//!
//! The cipher is a keystream XOR derived from a keyed sponge: for each
//! 32-byte segment of the input, the keystream block is
//! `H(H(key ‖ le32(counter + segment_index)))`. The construction is
//! reproducible from the key alone, so the same transform runs in both
//! directions. Encryptors instantiated with a fixed padding emit a
//! ciphertext of exactly that size, filling the region past the plaintext
//! with random bytes; the plaintext span recovered on decryption tells the
//! reader where the real data ends.

use rand::RngCore;
use shoal_api::{EncryptionKey, ShoalError, ShoalResult, KEY_LENGTH};
use shoal_bmt::SegmentHasher;
use std::marker::PhantomData;

/// Generate a fresh random per-chunk key.
pub fn generate_random_key() -> EncryptionKey {
    let mut key = vec![0_u8; KEY_LENGTH];
    rand::thread_rng().fill_bytes(&mut key);
    EncryptionKey(key.into())
}

/// A keystream encryptor/decryptor for one chunk region.
///
/// `padding` of zero transforms the input at its own length; a non-zero
/// `padding` fixes the output size (encrypt accepts anything up to it,
/// decrypt exactly it). `init_ctr` offsets the keystream counter so
/// distinct regions of a chunk draw from disjoint keystream domains.
pub struct Encryptor<H: SegmentHasher> {
    key: EncryptionKey,
    padding: usize,
    init_ctr: u32,
    _hasher: PhantomData<fn() -> H>,
}

impl<H: SegmentHasher> Encryptor<H> {
    /// Construct an encryptor from key, output padding and counter origin.
    pub fn new(key: EncryptionKey, padding: usize, init_ctr: u32) -> Self {
        Self {
            key,
            padding,
            init_ctr,
            _hasher: PhantomData,
        }
    }

    /// Encrypt `data`, padding the output with random bytes when a fixed
    /// padding is configured.
    pub fn encrypt(&self, data: &[u8]) -> ShoalResult<Vec<u8>> {
        let mut out_length = data.len();
        if self.padding > 0 {
            if data.len() > self.padding {
                return Err(ShoalError::invalid_chunk(format!(
                    "data length {} longer than padding {}",
                    data.len(),
                    self.padding
                )));
            }
            out_length = self.padding;
        }
        let mut out = vec![0_u8; out_length];
        self.transform(data, &mut out);
        Ok(out)
    }

    /// Decrypt `data`: the identical keystream transform. The caller
    /// truncates the plaintext at the length its span implies.
    pub fn decrypt(&self, data: &[u8]) -> ShoalResult<Vec<u8>> {
        if self.padding > 0 && data.len() != self.padding {
            return Err(ShoalError::invalid_chunk(format!(
                "data length {} different than padding {}",
                data.len(),
                self.padding
            )));
        }
        let mut out = vec![0_u8; data.len()];
        self.transform(data, &mut out);
        Ok(out)
    }

    fn transform(&self, input: &[u8], out: &mut [u8]) {
        for (i, segment) in input.chunks(KEY_LENGTH).enumerate() {
            let start = i * KEY_LENGTH;
            self.transcrypt(i, segment, &mut out[start..start + segment.len()]);
        }
        // whatever lies past the input is filler, never keystream
        rand::thread_rng().fill_bytes(&mut out[input.len()..]);
    }

    fn transcrypt(&self, index: usize, input: &[u8], out: &mut [u8]) {
        let ctr = (index as u32).wrapping_add(self.init_ctr);
        let ctr_hash = H::hash_all(&[&self.key, &ctr.to_le_bytes()]);
        // second hash round so disclosing one keystream block does not
        // disclose the counter preimage
        let segment_key = H::hash_all(&[&ctr_hash]);
        for (j, b) in input.iter().enumerate() {
            out[j] = b ^ segment_key[j % KEY_LENGTH];
        }
    }
}
