//! The producer-side store pipeline: encrypt, address, dispatch.
//!
//! [HasherStore] accepts span-prefixed chunk payloads sequentially. Each
//! put optionally encrypts the chunk, computes its BMT address inline, and
//! hands the local store write to a background task, bounded by a worker
//! semaphore. The returned reference is valid immediately; durability is
//! confirmed separately through [HasherStore::wait], which resolves once
//! every submitted chunk has been acknowledged or with the first write
//! error.

use crate::encryption::{generate_random_key, Encryptor};
use bytes::{BufMut, Bytes, BytesMut};
use shoal_api::{
    span_to_length, validate_chunk_data, Address, Chunk, ChunkStore,
    DynChunkStore, EncryptionKey, ModeGet, ModePut, Reference, ShoalError,
    ShoalResult, Tag, TagState, CHUNK_SIZE, KEY_LENGTH, SEGMENT_SIZE,
    SPAN_SIZE,
};
use shoal_bmt::{Hasher, Keccak256Hasher, TreePool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio_util::sync::CancellationToken;

/// Bound on in-flight local store writes: all 128 data chunks of a full
/// intermediate node in parallel, plus headroom for the tree chunks above
/// them.
pub const STORAGE_WORKERS: usize = 150;

/// The tree pool shared by chunk hashing.
pub type ChunkTreePool = TreePool<Keccak256Hasher>;

/// The BMT hasher produced from [ChunkTreePool].
pub type ChunkHasher = Hasher<Keccak256Hasher>;

type ChunkEncryptor = Encryptor<Keccak256Hasher>;

/// Producer pipeline writing addressed (and optionally encrypted) chunks
/// into a local chunk store.
#[derive(Debug)]
pub struct HasherStore {
    store: DynChunkStore,
    pool: Arc<ChunkTreePool>,
    tag: Arc<Tag>,
    to_encrypt: bool,
    ref_size: usize,
    submitted: Arc<AtomicU64>,
    workers: Arc<Semaphore>,
    outcome_tx: mpsc::UnboundedSender<ShoalResult<()>>,
    done_tx: watch::Sender<bool>,
    verdict_rx: Mutex<Option<oneshot::Receiver<ShoalResult<()>>>>,
    cancel: CancellationToken,
}

impl HasherStore {
    /// Create a hasher store over a local chunk store.
    ///
    /// Must be called within a tokio runtime; the completion tracking task
    /// is spawned here. `cancel` aborts [HasherStore::wait] early; in-flight
    /// store writes still run to completion but their errors are discarded.
    pub fn new(
        store: DynChunkStore,
        pool: Arc<ChunkTreePool>,
        to_encrypt: bool,
        tag: Arc<Tag>,
        cancel: CancellationToken,
    ) -> Self {
        let ref_size = if to_encrypt {
            SEGMENT_SIZE + KEY_LENGTH
        } else {
            SEGMENT_SIZE
        };

        let submitted = Arc::new(AtomicU64::new(0));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);
        let (verdict_tx, verdict_rx) = oneshot::channel();

        tokio::spawn(completion_task(
            outcome_rx,
            done_rx,
            submitted.clone(),
            verdict_tx,
        ));

        Self {
            store,
            pool,
            tag,
            to_encrypt,
            ref_size,
            submitted,
            workers: Arc::new(Semaphore::new(STORAGE_WORKERS)),
            outcome_tx,
            done_tx,
            verdict_rx: Mutex::new(Some(verdict_rx)),
            cancel,
        }
    }

    /// The reference size produced by this store: the address, plus the
    /// encryption key when encrypting.
    pub fn ref_size(&self) -> usize {
        self.ref_size
    }

    /// Store span-prefixed chunk data and return its reference.
    ///
    /// The address is computed inline; the store write happens in the
    /// background. The reference is valid regardless of whether that write
    /// has landed yet; call [HasherStore::wait] to confirm durability.
    pub async fn put(&self, chunk_data: Bytes) -> ShoalResult<Reference> {
        validate_chunk_data(&chunk_data)?;

        let (data, key) = if self.to_encrypt {
            let (data, key) = self.encrypt_chunk_data(&chunk_data)?;
            (data, Some(key))
        } else {
            (chunk_data, None)
        };

        let address = self.create_address(&data);
        let chunk = Chunk::new(address.clone(), data)?;
        self.store_chunk(chunk).await;

        Ok(match key {
            Some(key) => Reference::encrypted(address, key),
            None => Reference::plain(address),
        })
    }

    /// Read chunk data back by reference, decrypting when the reference
    /// carries a key and discarding the encryption padding.
    pub async fn get(&self, reference: &Reference) -> ShoalResult<Bytes> {
        let chunk = self
            .store
            .get(ModeGet::Request, reference.address().clone())
            .await?;
        match reference.encryption_key() {
            Some(key) => self.decrypt_chunk_data(chunk.data(), key),
            None => Ok(chunk.data().clone()),
        }
    }

    /// Signal that no more chunks will be put, so [HasherStore::wait] can
    /// resolve once the already submitted ones are stored.
    pub fn close(&self) {
        let _ = self.done_tx.send(true);
    }

    /// Wait until every submitted chunk is acknowledged by the local store
    /// and [HasherStore::close] was called, or return the first store
    /// error, or [ShoalError::Cancelled] when the cancellation token fires.
    pub async fn wait(&self) -> ShoalResult<()> {
        let verdict_rx = self.verdict_rx.lock().expect("poisoned").take();
        let Some(verdict_rx) = verdict_rx else {
            return Err(ShoalError::other("wait already consumed"));
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ShoalError::Cancelled),
            verdict = verdict_rx => verdict.unwrap_or_else(|_| {
                Err(ShoalError::other("completion task terminated"))
            }),
        }
    }

    fn create_address(&self, data: &[u8]) -> Address {
        let mut hasher = ChunkHasher::new(self.pool.clone());
        hasher.set_span_bytes(&data[..SPAN_SIZE]);
        hasher.write(&data[SPAN_SIZE..]);
        Address::from(hasher.sum())
    }

    /// Submit the store write, holding a worker slot for its duration.
    async fn store_chunk(&self, chunk: Chunk) {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .expect("worker semaphore never closed");
        self.submitted.fetch_add(1, Ordering::Release);

        let store = self.store.clone();
        let tag = self.tag.clone();
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let outcome = match store.put(ModePut::Upload, vec![chunk]).await
            {
                Ok(exists) => {
                    tag.inc(TagState::Stored);
                    if exists.first().copied().unwrap_or(false) {
                        tag.inc(TagState::Seen);
                    }
                    Ok(())
                }
                Err(err) => {
                    tracing::warn!(%err, "chunk store write failed");
                    tag.inc(TagState::Stored);
                    Err(err)
                }
            };
            drop(permit);
            let _ = outcome_tx.send(outcome);
        });
    }

    fn span_encryptor(&self, key: &EncryptionKey) -> ChunkEncryptor {
        Encryptor::new(key.clone(), 0, (CHUNK_SIZE / self.ref_size) as u32)
    }

    fn data_encryptor(&self, key: &EncryptionKey) -> ChunkEncryptor {
        Encryptor::new(key.clone(), CHUNK_SIZE, 0)
    }

    fn encrypt_chunk_data(
        &self,
        chunk_data: &[u8],
    ) -> ShoalResult<(Bytes, EncryptionKey)> {
        let key = generate_random_key();
        let span = self
            .span_encryptor(&key)
            .encrypt(&chunk_data[..SPAN_SIZE])?;
        let data = self
            .data_encryptor(&key)
            .encrypt(&chunk_data[SPAN_SIZE..])?;

        let mut out = BytesMut::with_capacity(SPAN_SIZE + data.len());
        out.put_slice(&span);
        out.put_slice(&data);
        Ok((out.freeze(), key))
    }

    fn decrypt_chunk_data(
        &self,
        chunk_data: &[u8],
        key: &EncryptionKey,
    ) -> ShoalResult<Bytes> {
        if chunk_data.len() < SPAN_SIZE {
            return Err(ShoalError::invalid_chunk(format!(
                "min length {} got {}",
                SPAN_SIZE,
                chunk_data.len()
            )));
        }

        let span = self
            .span_encryptor(key)
            .decrypt(&chunk_data[..SPAN_SIZE])?;
        let data = self
            .data_encryptor(key)
            .decrypt(&chunk_data[SPAN_SIZE..])?;

        // the plaintext span tells how much of the decrypted data is real;
        // spans above the chunk size describe intermediate tree levels
        // holding packed references instead of raw data
        let mut length = span_to_length(&span);
        while length > CHUNK_SIZE as u64 {
            length = length.div_ceil(CHUNK_SIZE as u64) * self.ref_size as u64;
        }
        if (data.len() as u64) < length {
            return Err(ShoalError::invalid_chunk(format!(
                "span implies {} data bytes, got {}",
                length,
                data.len()
            )));
        }

        let mut out = BytesMut::with_capacity(SPAN_SIZE + length as usize);
        out.put_slice(&span);
        out.put_slice(&data[..length as usize]);
        Ok(out.freeze())
    }
}

/// Consume store-write outcomes until everything submitted has completed
/// (and the store was closed), or the first error arrives.
async fn completion_task(
    mut outcome_rx: mpsc::UnboundedReceiver<ShoalResult<()>>,
    mut done_rx: watch::Receiver<bool>,
    submitted: Arc<AtomicU64>,
    verdict_tx: oneshot::Sender<ShoalResult<()>>,
) {
    let mut completed: u64 = 0;
    let mut done = *done_rx.borrow();
    loop {
        if done && completed >= submitted.load(Ordering::Acquire) {
            let _ = verdict_tx.send(Ok(()));
            return;
        }
        tokio::select! {
            outcome = outcome_rx.recv() => match outcome {
                Some(Ok(())) => completed += 1,
                Some(Err(err)) => {
                    let _ = verdict_tx.send(Err(err));
                    return;
                }
                // the hasher store is gone; nobody is waiting
                None => return,
            },
            changed = done_rx.changed(), if !done => {
                if changed.is_err() {
                    return;
                }
                done = *done_rx.borrow();
            }
        }
    }
}

#[cfg(test)]
mod test;
