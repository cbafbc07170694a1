//! The remote retrieval contract and the request value it operates on.

use crate::{Address, BoxFut, PeerId, ShoalResult, Timestamp};
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A chunk retrieval request travelling through the fetch path.
///
/// The skip set accumulates every peer already asked during this request so
/// that the [RemoteGet] collaborator rotates to fresh peers on retry. It is
/// shared mutable state: the fetch loop records peers while the collaborator
/// reads the set concurrently.
pub struct Request {
    address: Address,
    origin: Option<PeerId>,
    peers_to_skip: Mutex<HashMap<PeerId, Timestamp>>,
}

impl Request {
    /// Construct a request for the given address.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            origin: None,
            peers_to_skip: Mutex::new(HashMap::new()),
        }
    }

    /// Record the peer this request arrived from, so it is never asked to
    /// serve its own request.
    pub fn with_origin(mut self, origin: PeerId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// The address being retrieved.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The peer this request arrived from, if it was relayed.
    pub fn origin(&self) -> Option<&PeerId> {
        self.origin.as_ref()
    }

    /// Add a peer to the skip set, stamped with the current time.
    pub fn skip_peer(&self, peer: &PeerId) {
        self.peers_to_skip
            .lock()
            .expect("poisoned")
            .insert(peer.clone(), Timestamp::now());
    }

    /// Whether a peer is currently in the skip set.
    pub fn should_skip(&self, peer: &PeerId) -> bool {
        self.peers_to_skip
            .lock()
            .expect("poisoned")
            .contains_key(peer)
    }

    /// Snapshot of the skip set.
    pub fn peers_to_skip(&self) -> Vec<PeerId> {
        self.peers_to_skip
            .lock()
            .expect("poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("address", &self.address)
            .field("origin", &self.origin)
            .field("peers_to_skip", &self.peers_to_skip())
            .finish()
    }
}

/// Invoked unconditionally at the end of each fetch attempt, letting the
/// collaborator release whatever it reserved when selecting the peer.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// The overlay routing contract: select the next peer eligible to serve a
/// retrieve request.
///
/// Implementations pick among connected peers, honouring the request's skip
/// set and origin, and issue the actual retrieve message to the chosen
/// peer. Delivery happens out of band through the net store's put.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait RemoteGet: 'static + Send + Sync + std::fmt::Debug {
    /// Select and contact the next eligible peer for `request`.
    ///
    /// Returns the chosen peer and a cleanup handle, or
    /// [ShoalError::NoSuitablePeer](crate::ShoalError::NoSuitablePeer) when
    /// the peer set is exhausted.
    fn next_peer(
        &self,
        request: Arc<Request>,
        local_id: PeerId,
    ) -> BoxFut<'_, ShoalResult<(PeerId, Cleanup)>>;
}

/// Trait-object version of the remote get collaborator.
pub type DynRemoteGet = Arc<dyn RemoteGet>;
