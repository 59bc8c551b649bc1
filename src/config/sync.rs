use serde::{Deserialize, Serialize};

/// Sync engine configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Rows per upsert statement. Values above SQLite's bound-parameter limit are capped
    /// per table (wrappers bind 7 values per row, so at most 4680 rows).
    /// TOML: `sync.upsert_batch_size`. Default: `500`.
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Keys per delete statement.
    /// TOML: `sync.delete_batch_size`. Default: `1000`.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Period of the background sync loop in `serve`; `0` disables it.
    /// TOML: `sync.interval_secs`. Default: `0`.
    #[serde(default)]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: default_upsert_batch_size(),
            delete_batch_size: default_delete_batch_size(),
            interval_secs: 0,
        }
    }
}

fn default_upsert_batch_size() -> usize {
    500
}

fn default_delete_batch_size() -> usize {
    1000
}
