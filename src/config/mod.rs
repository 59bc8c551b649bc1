mod basic;
mod sync;
mod upstream;

pub use basic::BasicConfig;
pub use sync::SyncConfig;
pub use upstream::UpstreamConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Storage, logging and read API settings (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Upstream export service settings (see `upstream` table in config.toml).
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Sync engine tuning (see `sync` table in config.toml).
    #[serde(default)]
    pub sync: SyncConfig,
}

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "ZYMIRROR_";

impl Config {
    /// Builds a Figment that merges defaults, the TOML file at `path` and `ZYMIRROR_*` env
    /// vars (`ZYMIRROR_UPSTREAM__API_KEY` maps to `upstream.api_key`).
    pub fn figment_from(path: PathBuf) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if path.is_file() {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extracts the merged configuration from `path` (missing file means defaults + env).
    ///
    /// Note: this does **not** validate `upstream.api_key`; commands that talk to the
    /// upstream service call `Config::validate_upstream()` first.
    pub fn load(path: PathBuf) -> Result<Self, figment::Error> {
        Self::figment_from(path).extract()
    }

    pub fn validate_upstream(&self) -> Result<(), String> {
        if self.upstream.api_key.trim().is_empty() {
            return Err("upstream.api_key must be set and non-empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let cfg = Config::load(PathBuf::from("does-not-exist.toml")).unwrap();
        assert_eq!(cfg.basic.database_url, "sqlite://zymirror.db");
        assert_eq!(cfg.sync.upsert_batch_size, 500);
        assert_eq!(cfg.sync.delete_batch_size, 1000);
        assert!(cfg.validate_upstream().is_err());
    }
}
