//! Shoal error types.

use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The core shoal error type. This type is used in all external shoal
/// apis as well as internally in the storage modules.
///
/// This type is required to implement `Clone` so that whole `Result`s can
/// travel through shared futures: every waiter coalesced onto one in-flight
/// fetch receives the same error instance.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShoalError {
    /// The chunk is not in the local store. Non-terminal for a net store
    /// get, which falls through to the remote fetch path.
    #[error("chunk not found")]
    NotFound,

    /// Malformed chunk payload or reference: too short, too long, or a
    /// length that does not agree with its span.
    #[error("invalid chunk data: {ctx}")]
    InvalidChunk {
        /// Any context associated with this error.
        ctx: Arc<str>,
    },

    /// The remote fetch exhausted the set of eligible peers.
    #[error("no suitable peer")]
    NoSuitablePeer,

    /// A deadline elapsed. Per-attempt search timeouts are retried
    /// internally; this surfaces only when the global fetch deadline fires.
    #[error("timed out: {ctx}")]
    Timeout {
        /// Any context associated with this error.
        ctx: Arc<str>,
    },

    /// The caller cancelled the operation.
    #[error("cancelled")]
    Cancelled,

    /// Generic shoal internal error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl ShoalError {
    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// Construct an invalid-chunk error.
    pub fn invalid_chunk<C: std::fmt::Display>(ctx: C) -> Self {
        Self::InvalidChunk {
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }

    /// Construct a timeout error.
    pub fn timeout<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Timeout {
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }

    /// Whether this error is the local-store not-found miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// The core shoal result type.
pub type ShoalResult<T> = Result<T, ShoalError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            "bla (src: None)",
            ShoalError::other("bla").to_string().as_str(),
        );
        assert_eq!(
            "foo (src: bar)",
            ShoalError::other_src("foo", std::io::Error::other("bar"))
                .to_string()
                .as_str(),
        );
        assert_eq!("chunk not found", ShoalError::NotFound.to_string());
        assert_eq!(
            "invalid chunk data: short",
            ShoalError::invalid_chunk("short").to_string(),
        );
    }

    #[test]
    fn not_found_discriminates() {
        assert!(ShoalError::NotFound.is_not_found());
        assert!(!ShoalError::NoSuitablePeer.is_not_found());
        assert!(!ShoalError::other("io").is_not_found());
    }

    #[test]
    fn ensure_error_type_is_clone_send_and_sync() {
        fn ensure<T: Clone + std::fmt::Display + Send + Sync>(_t: T) {}
        ensure(ShoalError::other("bla"));
    }
}
