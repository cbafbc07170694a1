//! Shoal configuration.

use crate::NetStoreConfig;

/// Top-level shoal configuration.
///
/// Shoal has exactly two pluggable modules and only one of them carries
/// tuning knobs, so the configuration is a plain struct on the
/// [Builder](crate::builder::Builder) rather than a keyed registry. Hosts
/// deserialize it from their configuration file; unknown properties are
/// ignored and missing ones fall back to the defaults, so hand-edited
/// files stay loadable across versions. Chunk store implementations that
/// need host-specific settings (paths, connection strings) take them
/// through their factory constructors instead.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Net store tuning.
    pub net_store: NetStoreConfig,
}
