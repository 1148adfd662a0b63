//! # splunk-monitoring-core
//!
//! Telemetry client for the Splunk HTTP Event Collector.
//!
//! This library provides:
//! - [`MonitoringClient`] for metrics, application errors and GraphQL failures
//! - Error boundaries ([`capture`]) that log component failures and re-raise them
//! - Transports: Splunk HEC over HTTP and an in-memory recorder
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Events flow through three stages:
//! - **Call site:** application code, or an error boundary around a component
//! - **Client:** applies the readiness gate and sampling, merges context and
//!   caller data into a payload
//! - **Transport:** delivers the shaped event (fire-and-forget)
//!
//! ## Example
//!
//! ```rust,no_run
//! use splunk_monitoring_core::{Config, HecTransport, MetricLog, MonitoringClient};
//!
//! # async fn run() -> splunk_monitoring_core::Result<()> {
//! let config = Config::load()?;
//! let client: MonitoringClient<HecTransport> = MonitoringClient::new(config.monitoring()?);
//!
//! client.log_metric(MetricLog::new("startup"));
//! if let Some(transport) = client.transport() {
//!     transport.flush().await;
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::{ErrorLog, GraphQlErrorLog, MetricLog, MonitoringClient, MonitoringConfig};
pub use config::Config;
pub use context::{AppInfo, EnvironmentContext, RuntimeInfo};
pub use enrichment::{AdditionalArgs, Enrich, StaticEnrichment};
pub use error::{BoxError, Error, Result};
pub use event::{Event, EventData, FieldValue, Importance, Severity};
pub use graphql::{GraphQlError, GraphQlErrorEntry, GraphQlOperation};
pub use transport::{HecTransport, MemoryTransport, Transport, TransportOptions, TransportSettings};

// Public modules
pub mod capture;
pub mod client;
pub mod config;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod event;
pub mod graphql;
pub mod logging;
pub mod sampling;
pub mod transport;
