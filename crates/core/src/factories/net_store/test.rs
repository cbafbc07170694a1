use super::*;
use crate::factories::MemChunkStore;
use shoal_api::{
    ChunkStore, Cleanup, MockRemoteGet, ModeSet, NetStore as _,
};
use shoal_test_utils::chunk::random_chunk;
use shoal_test_utils::id::{peer_id, random_peer_id};
use std::sync::atomic::{AtomicUsize, Ordering};

fn test_config() -> NetStoreConfig {
    NetStoreConfig {
        search_timeout_ms: 100,
        global_timeout_ms: 1000,
        fetcher_cache_capacity: 100,
    }
}

fn net_store(
    store: DynChunkStore,
    remote_get: DynRemoteGet,
) -> Arc<NetStore> {
    Arc::new(NetStore::new(
        test_config(),
        store,
        remote_get,
        random_peer_id(),
    ))
}

/// A remote get handing out the scripted peers in order, then reporting
/// the peer set as exhausted. Records every selection and every cleanup.
fn scripted_remote_get(
    peers: Vec<PeerId>,
) -> (DynRemoteGet, Arc<Mutex<Vec<PeerId>>>, Arc<AtomicUsize>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let cleanups = Arc::new(AtomicUsize::new(0));
    let mut mock = MockRemoteGet::new();
    mock.expect_next_peer().returning({
        let calls = calls.clone();
        let cleanups = cleanups.clone();
        let attempt = AtomicUsize::new(0);
        move |_request, _local_id| {
            let i = attempt.fetch_add(1, Ordering::SeqCst);
            match peers.get(i).cloned() {
                Some(peer) => {
                    calls.lock().expect("poisoned").push(peer.clone());
                    let cleanups = cleanups.clone();
                    Box::pin(async move {
                        let cleanup: Cleanup = Box::new(move || {
                            cleanups.fetch_add(1, Ordering::SeqCst);
                        });
                        Ok((peer, cleanup))
                    })
                }
                None => Box::pin(async { Err(ShoalError::NoSuitablePeer) }),
            }
        }
    });
    (Arc::new(mock), calls, cleanups)
}

fn untouched_remote_get() -> DynRemoteGet {
    let mut mock = MockRemoteGet::new();
    mock.expect_next_peer().never();
    Arc::new(mock)
}

async fn wait_for_fetcher(net: &NetStore) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while net.fetcher_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("fetcher never appeared");
}

#[derive(Debug)]
struct FaultyStore;

impl ChunkStore for FaultyStore {
    fn put(
        &self,
        _mode: ModePut,
        chunks: Vec<Chunk>,
    ) -> BoxFut<'_, ShoalResult<Vec<bool>>> {
        Box::pin(async move { Ok(vec![false; chunks.len()]) })
    }

    fn get(
        &self,
        _mode: ModeGet,
        _address: Address,
    ) -> BoxFut<'_, ShoalResult<Chunk>> {
        Box::pin(async { Err(ShoalError::other("corrupt index")) })
    }

    fn has(&self, _address: Address) -> BoxFut<'_, ShoalResult<bool>> {
        Box::pin(async { Ok(false) })
    }

    fn set(
        &self,
        _mode: ModeSet,
        _addresses: Vec<Address>,
    ) -> BoxFut<'_, ShoalResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> BoxFut<'_, ShoalResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn local_hit_skips_the_network() {
    let store = MemChunkStore::create();
    let chunk = random_chunk(100);
    store
        .put(ModePut::Upload, vec![chunk.clone()])
        .await
        .unwrap();

    let net = net_store(store, untouched_remote_get());
    let request = Arc::new(Request::new(chunk.address().clone()));
    let out = net.get(ModeGet::Request, request).await.unwrap();
    assert_eq!(chunk, out);
}

#[tokio::test(flavor = "multi_thread")]
async fn miss_is_resolved_by_delivery() {
    shoal_test_utils::enable_tracing();
    let store = MemChunkStore::create();
    let chunk = random_chunk(100);
    let (remote_get, calls, cleanups) =
        scripted_remote_get(vec![peer_id("peer-a")]);
    let net = net_store(store.clone(), remote_get);

    let deliverer = {
        let net = net.clone();
        let chunk = chunk.clone();
        tokio::spawn(async move {
            wait_for_fetcher(&net).await;
            net.put(ModePut::Request, vec![chunk]).await.unwrap();
        })
    };

    let request = Arc::new(Request::new(chunk.address().clone()));
    let out = net.get(ModeGet::Request, request).await.unwrap();
    deliverer.await.unwrap();

    assert_eq!(chunk, out);
    assert_eq!(1, calls.lock().unwrap().len());
    assert_eq!(1, cleanups.load(Ordering::SeqCst));
    // the delivery stored the chunk and dropped the fetcher
    assert!(store.has(chunk.address().clone()).await.unwrap());
    assert_eq!(0, net.fetcher_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_gets_coalesce_into_one_fetch() {
    let store = MemChunkStore::create();
    let chunk = random_chunk(100);
    let (remote_get, calls, _cleanups) =
        scripted_remote_get(vec![peer_id("peer-a")]);
    let net = net_store(store, remote_get);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let net = net.clone();
        let request = Arc::new(Request::new(chunk.address().clone()));
        handles.push(tokio::spawn(async move {
            net.get(ModeGet::Request, request).await
        }));
    }

    {
        let net = net.clone();
        let chunk = chunk.clone();
        tokio::spawn(async move {
            wait_for_fetcher(&net).await;
            net.put(ModePut::Request, vec![chunk]).await.unwrap();
        });
    }

    for handle in handles {
        assert_eq!(chunk, handle.await.unwrap().unwrap());
    }
    // one remote effort served every caller
    assert_eq!(1, calls.lock().unwrap().len());
}

#[tokio::test(flavor = "multi_thread")]
async fn search_timeout_rotates_to_the_next_peer() {
    shoal_test_utils::enable_tracing();
    let store = MemChunkStore::create();
    let chunk = random_chunk(100);
    let (remote_get, calls, cleanups) =
        scripted_remote_get(vec![peer_id("peer-a"), peer_id("peer-b")]);
    let net = net_store(store, remote_get);

    // peer-a never delivers; drop the chunk in once peer-b was asked
    {
        let net = net.clone();
        let chunk = chunk.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            tokio::time::timeout(Duration::from_secs(1), async {
                while calls.lock().unwrap().len() < 2 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("second attempt never happened");
            net.put(ModePut::Request, vec![chunk]).await.unwrap();
        });
    }

    let request = Arc::new(Request::new(chunk.address().clone()));
    let out = net
        .get(ModeGet::Request, request.clone())
        .await
        .unwrap();
    assert_eq!(chunk, out);

    // both attempts are on the skip set, in order of selection
    assert_eq!(
        vec![peer_id("peer-a"), peer_id("peer-b")],
        calls.lock().unwrap().clone(),
    );
    for peer in [peer_id("peer-a"), peer_id("peer-b")] {
        assert!(request.should_skip(&peer), "{peer} missing from skip set");
    }
    assert_eq!(2, cleanups.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_peer_set_is_terminal() {
    let net = net_store(
        MemChunkStore::create(),
        scripted_remote_get(vec![]).0,
    );
    let request = Arc::new(Request::new(random_chunk(10).address().clone()));
    let err = net.get(ModeGet::Request, request).await.unwrap_err();
    assert!(matches!(err, ShoalError::NoSuitablePeer), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn global_deadline_bounds_the_retries() {
    // an endless supply of silent peers
    let peers: Vec<PeerId> =
        (0..64).map(|i| peer_id(&format!("peer-{i}"))).collect();
    let (remote_get, calls, _cleanups) = scripted_remote_get(peers);
    let net = net_store(MemChunkStore::create(), remote_get);

    let request = Arc::new(Request::new(random_chunk(10).address().clone()));
    let err = net.get(ModeGet::Request, request).await.unwrap_err();
    assert!(matches!(err, ShoalError::Timeout { .. }), "got {err:?}");
    // several attempts fit between search timeout and deadline
    assert!(calls.lock().unwrap().len() > 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn local_store_fault_is_terminal() {
    let net = net_store(Arc::new(FaultyStore), untouched_remote_get());
    let request = Arc::new(Request::new(random_chunk(10).address().clone()));
    let err = net.get(ModeGet::Request, request).await.unwrap_err();
    assert!(matches!(err, ShoalError::Other { .. }), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn delivery_is_one_shot_across_parties() {
    let store = MemChunkStore::create();
    let net = net_store(store, untouched_remote_get());
    let chunk = random_chunk(100);

    let (fetcher, _) = net
        .get_or_create_fetcher(chunk.address(), FetchParty::Syncing);

    // the same chunk lands through syncing and a retrieve request at once
    let sync_put = {
        let net = net.clone();
        let chunk = chunk.clone();
        tokio::spawn(
            async move { net.put(ModePut::Sync, vec![chunk]).await },
        )
    };
    let request_put = {
        let net = net.clone();
        let chunk = chunk.clone();
        tokio::spawn(async move {
            net.put(ModePut::Request, vec![chunk]).await
        })
    };
    sync_put.await.unwrap().unwrap();
    request_put.await.unwrap().unwrap();

    assert_eq!(chunk, fetcher.delivered().await);
    assert_eq!(0, net.fetcher_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn safe_close_ignores_later_deliveries() {
    let fetcher = Fetcher::new(FetchParty::Request);
    let first = random_chunk(10);
    let second = random_chunk(20);
    fetcher.safe_close(first.clone());
    fetcher.safe_close(second);
    assert_eq!(first, fetcher.delivered().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn cross_party_interest_issues_one_extra_retrieve() {
    let net = net_store(MemChunkStore::create(), untouched_remote_get());
    let address = random_chunk(10).address().clone();

    let (created, loaded) =
        net.get_or_create_fetcher(&address, FetchParty::Syncing);
    assert!(!loaded, "fresh fetcher");

    // first cross-party arrival asks for its own retrieve
    let (cross, loaded) =
        net.get_or_create_fetcher(&address, FetchParty::Request);
    assert!(Arc::ptr_eq(&created, &cross));
    assert!(!loaded, "first cross-party arrival issues a request");

    // afterwards both parties just join
    let (_, loaded) =
        net.get_or_create_fetcher(&address, FetchParty::Request);
    assert!(loaded);
    let (_, loaded) =
        net.get_or_create_fetcher(&address, FetchParty::Syncing);
    assert!(loaded);

    assert_eq!(1, net.fetcher_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn lru_eviction_drops_cold_fetchers() {
    let config = NetStoreConfig {
        fetcher_cache_capacity: 2,
        ..test_config()
    };
    let net = NetStore::new(
        config,
        MemChunkStore::create(),
        untouched_remote_get(),
        random_peer_id(),
    );

    let addresses: Vec<Address> =
        (0..3).map(|_| random_chunk(10).address().clone()).collect();
    let (first, _) =
        net.get_or_create_fetcher(&addresses[0], FetchParty::Request);
    net.get_or_create_fetcher(&addresses[1], FetchParty::Request);
    net.get_or_create_fetcher(&addresses[2], FetchParty::Request);
    assert_eq!(2, net.fetcher_count());

    // the evicted address gets a brand new fetcher on the next miss
    let (recreated, loaded) =
        net.get_or_create_fetcher(&addresses[0], FetchParty::Request);
    assert!(!loaded);
    assert!(!Arc::ptr_eq(&first, &recreated));
}

#[tokio::test(flavor = "multi_thread")]
async fn has_and_close_pass_through() {
    let store = MemChunkStore::create();
    let chunk = random_chunk(10);
    store
        .put(ModePut::Upload, vec![chunk.clone()])
        .await
        .unwrap();

    let net = net_store(store, untouched_remote_get());
    assert!(net.has(chunk.address().clone()).await.unwrap());
    assert!(!net.has(random_chunk(10).address().clone()).await.unwrap());
    net.close().await.unwrap();
}

#[test]
fn factory_rejects_degenerate_config() {
    let factory = NetStoreFactory::create();

    let mut config = Config::default();
    config.net_store.fetcher_cache_capacity = 0;
    assert!(factory.validate_config(&config).is_err());

    let mut config = Config::default();
    config.net_store.search_timeout_ms = 0;
    assert!(factory.validate_config(&config).is_err());

    assert!(factory.validate_config(&Config::default()).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn factory_builds_from_the_builder_config() {
    let factory = NetStoreFactory::create();
    let builder = crate::default_test_builder();
    builder.validate_config().unwrap();
    let builder = builder.build();

    let net = factory
        .create(
            builder,
            MemChunkStore::create(),
            untouched_remote_get(),
            random_peer_id(),
        )
        .await
        .unwrap();
    // trait-object surface works end to end on a local hit
    let chunk = random_chunk(10);
    net.put(ModePut::Upload, vec![chunk.clone()]).await.unwrap();
    let out = net
        .get(
            ModeGet::Request,
            Arc::new(Request::new(chunk.address().clone())),
        )
        .await
        .unwrap();
    assert_eq!(chunk, out);
}
