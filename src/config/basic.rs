use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Database URL for the SQLite mirror.
    /// TOML: `basic.database_url`. Default: `sqlite://zymirror.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Read API listen address.
    /// TOML: `basic.listen_addr`. Default: `127.0.0.1`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// Read API listen port.
    /// TOML: `basic.listen_port`. Default: `8190`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            loglevel: default_loglevel(),
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://zymirror.db".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(127, 0, 0, 1).into()
}

fn default_listen_port() -> u16 {
    8190
}
