use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

pub static DEFAULT_UPDATES_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://api.zywrap.com/v1/sdk/export/updates")
        .expect("valid default updates URL")
});

pub static DEFAULT_EXPORT_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://api.zywrap.com/v1/sdk/export/").expect("valid default export URL")
});

/// Upstream export service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Manifest endpoint queried with `?fromVersion=`.
    /// TOML: `upstream.updates_url`.
    #[serde(default = "default_updates_url")]
    pub updates_url: Url,

    /// Full export archive fetched by `zymirror download`.
    /// TOML: `upstream.export_url`.
    #[serde(default = "default_export_url")]
    pub export_url: Url,

    /// Bearer token for the export service (required for `sync`/`serve`).
    /// TOML: `upstream.api_key`.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub api_key: String,

    /// Optional upstream HTTP proxy. Example: `http://127.0.0.1:1080`.
    /// TOML: `upstream.proxy`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Overall request timeout for manifest and bundle downloads.
    /// TOML: `upstream.timeout_secs`. Default: `60`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient upstream failures (network errors, 5xx).
    /// TOML: `upstream.retry_max_times`. Default: `2`.
    #[serde(default = "default_retry_max_times")]
    pub retry_max_times: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            updates_url: default_updates_url(),
            export_url: default_export_url(),
            api_key: String::new(),
            proxy: None,
            timeout_secs: default_timeout_secs(),
            retry_max_times: default_retry_max_times(),
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for upstream.api_key",
        )),
    }
}

fn default_updates_url() -> Url {
    DEFAULT_UPDATES_URL.clone()
}

fn default_export_url() -> Url {
    DEFAULT_EXPORT_URL.clone()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_max_times() -> usize {
    2
}
