use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings read by the core. Built by the caller and handed to
/// [`RootContext::new`](crate::core::RootContext::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wait_timeout_ms: u64,
    pub wait_interval_ms: u64,
    /// Skip the implicit actionability wait before mutating interactions.
    pub advanced_mode: bool,
}

impl Config {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_advanced_mode(mut self, enabled: bool) -> Self {
        self.advanced_mode = enabled;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 10_000,
            wait_interval_ms: 200,
            advanced_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    pub proxy: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            disable_images: false,
            proxy: None,
            args: vec![],
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: Option<String>,
    pub request_timeout_ms: u64,
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(concat!("browser-pincer/", env!("CARGO_PKG_VERSION")).to_string()),
            request_timeout_ms: 30_000,
            proxy: None,
        }
    }
}
