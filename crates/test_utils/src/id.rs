//! Random identity helpers.

use rand::RngCore;
use shoal_api::{Address, PeerId};

/// 32 random bytes.
pub fn random_bytes() -> bytes::Bytes {
    let mut out = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut out);
    bytes::Bytes::copy_from_slice(&out)
}

/// A random (not content-derived) address.
pub fn random_address() -> Address {
    Address::from(random_bytes())
}

/// A random peer id.
pub fn random_peer_id() -> PeerId {
    PeerId::from(random_bytes())
}

/// A peer id from a fixed label, for readable assertions.
pub fn peer_id(label: &str) -> PeerId {
    PeerId::from(bytes::Bytes::copy_from_slice(label.as_bytes()))
}
