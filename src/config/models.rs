use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::request::Header;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Settings for the reqwest-backed transport
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Proxy URI; may also come from `DISPATCHBOX_PROXY`
    pub proxy: Option<String>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            proxy: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    format!("dispatchbox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    10
}

/// Values applied to every request before caller options
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DefaultsConfig {
    /// Headers installed beneath caller headers
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl DefaultsConfig {
    pub fn headers(&self) -> Vec<Header> {
        self.default_headers
            .iter()
            .map(|(name, value)| Header::new(name.clone(), value.clone()))
            .collect()
    }
}
