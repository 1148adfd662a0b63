//! Event transports
//!
//! A transport physically delivers shaped [`Event`]s. The monitoring client
//! configures one transport for its whole lifetime and afterwards only hands
//! it events; it never looks at delivery results.
//!
//! - [`HecTransport`] posts to a Splunk HTTP Event Collector
//! - [`MemoryTransport`] keeps events in memory (tests, dry runs)

mod hec;
mod memory;

pub use hec::HecTransport;
pub use memory::MemoryTransport;

use serde::Deserialize;

use crate::error::Result;
use crate::event::Event;

/// Delivers events to a logging backend.
pub trait Transport: Send + Sync + Sized {
    /// Build the transport from connection settings. Called at most once per client.
    fn configure(settings: &TransportSettings) -> Result<Self>;

    /// Hand an event over for delivery. Must not block on the network.
    fn send_event(&self, event: Event);
}

/// Connection settings passed to [`Transport::configure`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    pub endpoint: String,
    pub token: String,
    /// Attach host metadata to every event
    pub inject_additional_info: bool,
    pub options: TransportOptions,
}

/// Transport-specific passthrough fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransportOptions {
    /// Collector path appended to the endpoint
    #[serde(default = "default_path")]
    pub path: String,

    /// Splunk `source` metadata
    #[serde(default)]
    pub source: Option<String>,

    /// Splunk `sourcetype` metadata
    #[serde(default = "default_sourcetype")]
    pub sourcetype: String,

    /// Splunk `host` metadata
    #[serde(default)]
    pub host: Option<String>,

    /// Target index (defaults to the token's index)
    #[serde(default)]
    pub index: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            path: default_path(),
            source: None,
            sourcetype: default_sourcetype(),
            host: None,
            index: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_path() -> String {
    "/services/collector/event".to_string()
}

fn default_sourcetype() -> String {
    "log".to_string()
}

fn default_timeout() -> u64 {
    30
}
