//! Module factories re-exported for use with the [Builder].
//!
//! [Builder]: shoal_api::builder::Builder

pub use shoal_core::factories::*;
