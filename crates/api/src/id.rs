//! Types dealing with chunk and peer identity.

macro_rules! imp_deref {
    ($i:ty, $t:ty) => {
        impl std::ops::Deref for $i {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! imp_from {
    ($a:ty, $b:ty, $i:ident => $e:expr) => {
        impl From<$b> for $a {
            fn from($i: $b) -> Self {
                $e
            }
        }
    };
}

macro_rules! imp_display_base64 {
    ($i:ty) => {
        impl std::fmt::Display for $i {
            fn fmt(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                use base64::prelude::*;
                f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(&self.0))
            }
        }

        impl std::fmt::Debug for $i {
            fn fmt(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                std::fmt::Display::fmt(self, f)
            }
        }
    };
}

/// The content address of a chunk.
///
/// These bytes are ONLY the BMT hash of the span-prefixed chunk data,
/// without prefix or suffix. The base64 form of the address is the key
/// used by the net store's fetcher table.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Address(
    #[serde(with = "crate::serde_bytes_base64")] pub bytes::Bytes,
);

imp_deref!(Address, bytes::Bytes);
imp_from!(Address, bytes::Bytes, b => Address(b));
imp_display_base64!(Address);

impl From<[u8; 32]> for Address {
    fn from(b: [u8; 32]) -> Self {
        Address(bytes::Bytes::copy_from_slice(&b))
    }
}

/// Identifies a peer on the storage overlay.
///
/// The overlay id is opaque to this crate; it is handed to and returned by
/// the [RemoteGet](crate::RemoteGet) collaborator unchanged.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct PeerId(
    #[serde(with = "crate::serde_bytes_base64")] pub bytes::Bytes,
);

imp_deref!(PeerId, bytes::Bytes);
imp_from!(PeerId, bytes::Bytes, b => PeerId(b));
imp_display_base64!(PeerId);
