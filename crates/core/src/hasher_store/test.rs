use super::*;
use crate::factories::MemChunkStore;
use shoal_api::{ChunkStore, ModeSet};
use shoal_bmt::{DEFAULT_POOL_CAPACITY, DEFAULT_SEGMENT_COUNT};
use shoal_test_utils::chunk::{address_of, random_chunk_data};

fn test_pool() -> Arc<ChunkTreePool> {
    Arc::new(ChunkTreePool::new(
        DEFAULT_SEGMENT_COUNT,
        DEFAULT_POOL_CAPACITY,
    ))
}

fn hasher_store(to_encrypt: bool, store: DynChunkStore) -> HasherStore {
    HasherStore::new(
        store,
        test_pool(),
        to_encrypt,
        Arc::new(Tag::new(1)),
        CancellationToken::new(),
    )
}

#[derive(Debug)]
struct FailingStore;

impl ChunkStore for FailingStore {
    fn put(
        &self,
        _mode: ModePut,
        _chunks: Vec<Chunk>,
    ) -> shoal_api::BoxFut<'_, ShoalResult<Vec<bool>>> {
        Box::pin(async { Err(ShoalError::other("disk full")) })
    }

    fn get(
        &self,
        _mode: ModeGet,
        _address: Address,
    ) -> shoal_api::BoxFut<'_, ShoalResult<Chunk>> {
        Box::pin(async { Err(ShoalError::NotFound) })
    }

    fn has(
        &self,
        _address: Address,
    ) -> shoal_api::BoxFut<'_, ShoalResult<bool>> {
        Box::pin(async { Ok(false) })
    }

    fn set(
        &self,
        _mode: ModeSet,
        _addresses: Vec<Address>,
    ) -> shoal_api::BoxFut<'_, ShoalResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> shoal_api::BoxFut<'_, ShoalResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_put_addresses_with_the_bmt() {
    let store = MemChunkStore::create();
    let hs = hasher_store(false, store.clone());

    let data = random_chunk_data(1234);
    let reference = hs.put(data.clone()).await.unwrap();
    assert!(!reference.is_encrypted());
    assert_eq!(32, reference.to_bytes().len());
    assert_eq!(&address_of(&data), reference.address());

    hs.close();
    hs.wait().await.unwrap();
    assert!(store.has(reference.address().clone()).await.unwrap());
    assert_eq!(data, hs.get(&reference).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn encrypted_put_round_trips() {
    let store = MemChunkStore::create();
    let hs = hasher_store(true, store.clone());

    // 4096 bytes of 0x41, the classic full-chunk fixture
    let data = {
        let mut data = shoal_api::length_to_span(4096).to_vec();
        data.extend_from_slice(&[0x41; 4096]);
        Bytes::from(data)
    };
    let reference = hs.put(data.clone()).await.unwrap();
    assert!(reference.is_encrypted());
    assert_eq!(64, reference.to_bytes().len());

    hs.close();
    hs.wait().await.unwrap();

    // what landed in the store is ciphertext, addressed as ciphertext
    let stored = store
        .get(ModeGet::Request, reference.address().clone())
        .await
        .unwrap();
    assert_ne!(data, *stored.data());
    assert_eq!(&address_of(stored.data()), stored.address());

    assert_eq!(data, hs.get(&reference).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn encrypted_puts_of_equal_data_differ() {
    let store = MemChunkStore::create();
    let hs = hasher_store(true, store);

    let data = random_chunk_data(500);
    let a = hs.put(data.clone()).await.unwrap();
    let b = hs.put(data).await.unwrap();
    assert_ne!(a.address(), b.address());
    assert_ne!(a.encryption_key(), b.encryption_key());
}

#[tokio::test(flavor = "multi_thread")]
async fn short_encrypted_chunks_are_padded_and_truncated() {
    let store = MemChunkStore::create();
    let hs = hasher_store(true, store.clone());

    let data = random_chunk_data(100);
    let reference = hs.put(data.clone()).await.unwrap();
    hs.close();
    hs.wait().await.unwrap();

    // ciphertext is padded to the full chunk payload
    let stored = store
        .get(ModeGet::Request, reference.address().clone())
        .await
        .unwrap();
    assert_eq!(SPAN_SIZE + CHUNK_SIZE, stored.data().len());

    // decryption reads the plaintext span and drops the padding
    assert_eq!(data, hs.get(&reference).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_confirms_every_submitted_chunk() {
    let store = MemChunkStore::create();
    let tag = Arc::new(Tag::new(7));
    let hs = Arc::new(HasherStore::new(
        store.clone(),
        test_pool(),
        false,
        tag.clone(),
        CancellationToken::new(),
    ));

    let mut handles = Vec::new();
    for i in 0..40 {
        let hs = hs.clone();
        handles.push(tokio::spawn(async move {
            hs.put(random_chunk_data(1 + i * 97)).await.unwrap()
        }));
    }
    let mut references = Vec::new();
    for handle in handles {
        references.push(handle.await.unwrap());
    }

    hs.close();
    hs.wait().await.unwrap();

    assert_eq!(40, tag.get(TagState::Stored));
    for reference in references {
        assert!(store.has(reference.address().clone()).await.unwrap());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn seen_chunks_are_counted() {
    let store = MemChunkStore::create();
    let tag = Arc::new(Tag::new(7));
    let hs = HasherStore::new(
        store,
        test_pool(),
        false,
        tag.clone(),
        CancellationToken::new(),
    );

    // the chunk is already present before the session stores it again
    let data = random_chunk_data(64);
    hs.store
        .put(
            ModePut::Upload,
            vec![shoal_test_utils::chunk::chunk(data.clone())],
        )
        .await
        .unwrap();

    hs.put(data).await.unwrap();
    hs.close();
    hs.wait().await.unwrap();

    assert_eq!(1, tag.get(TagState::Stored));
    assert_eq!(1, tag.get(TagState::Seen));
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_surfaces_the_first_store_error() {
    let hs = hasher_store(false, Arc::new(FailingStore));

    // the reference comes back fine; the failure surfaces on wait
    hs.put(random_chunk_data(10)).await.unwrap();
    hs.close();

    let err = hs.wait().await.unwrap_err();
    assert!(matches!(err, ShoalError::Other { .. }), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_blocks_until_close() {
    let hs = hasher_store(false, MemChunkStore::create());
    hs.put(random_chunk_data(10)).await.unwrap();

    let pending = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        hs.wait(),
    )
    .await;
    assert!(pending.is_err(), "wait must not resolve before close");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_session_waits_clean() {
    let hs = hasher_store(false, MemChunkStore::create());
    hs.close();
    hs.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_aborts_wait() {
    let cancel = CancellationToken::new();
    let hs = HasherStore::new(
        MemChunkStore::create(),
        test_pool(),
        false,
        Arc::new(Tag::new(1)),
        cancel.clone(),
    );
    hs.put(random_chunk_data(10)).await.unwrap();

    let waiter = tokio::spawn(async move { hs.wait().await });
    cancel.cancel();
    assert!(matches!(
        waiter.await.unwrap(),
        Err(ShoalError::Cancelled)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn undersized_chunk_data_is_rejected() {
    let hs = hasher_store(false, MemChunkStore::create());
    let err = hs.put(Bytes::from_static(&[0; 4])).await.unwrap_err();
    assert!(matches!(err, ShoalError::InvalidChunk { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn ref_size_follows_encryption() {
    assert_eq!(
        32,
        hasher_store(false, MemChunkStore::create()).ref_size()
    );
    assert_eq!(
        64,
        hasher_store(true, MemChunkStore::create()).ref_size()
    );
}
