//! Error types for splunk-monitoring-core

use thiserror::Error;

/// Boxed error returned by enrichment hooks and carried through [`Error::Enrichment`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the splunk-monitoring-core library
///
/// Local diagnostics (missing context, uninitialized transport, bad log rate)
/// never surface here; they are reported through `tracing` and degrade to a
/// no-op. Only configuration loading, transport construction and enrichment
/// failures are returned to callers.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport construction or delivery error
    #[error("transport error: {0}")]
    Transport(String),

    /// A caller-supplied enrichment hook failed
    #[error("enrichment failed: {0}")]
    Enrichment(#[source] BoxError),
}

/// Result type alias for splunk-monitoring-core
pub type Result<T> = std::result::Result<T, Error>;
