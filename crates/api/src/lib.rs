#![deny(missing_docs)]
//! Shoal API contains the storage module traits and the basic types
//! required to define the api of those traits.
//!
//! If you want to use Shoal itself, please see the shoal crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub(crate) mod serde_bytes_base64 {
    pub fn serialize<S>(
        b: &bytes::Bytes,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use base64::prelude::*;
        serializer.serialize_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
    }

    pub fn deserialize<'de, D, T: From<bytes::Bytes>>(
        deserializer: D,
    ) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use base64::prelude::*;
        let s: &'de str = serde::Deserialize::deserialize(deserializer)?;
        BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map(|v| bytes::Bytes::copy_from_slice(&v).into())
            .map_err(serde::de::Error::custom)
    }
}

pub mod builder;
pub mod config;

mod error;
pub use error::*;

pub mod id;
pub use id::{Address, PeerId};

mod timestamp;
pub use timestamp::*;

pub mod chunk;
pub use chunk::*;

pub mod reference;
pub use reference::*;

pub mod tag;
pub use tag::*;

pub mod chunk_store;
pub use chunk_store::*;

pub mod net_store;
pub use net_store::*;

pub mod remote_get;
pub use remote_get::*;
