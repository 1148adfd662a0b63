//! Monitoring client
//!
//! The client owns the transport and the environment context, shapes raw
//! inputs into [`Event`]s and applies the sampling policy for metrics.
//!
//! ## Lifecycle
//!
//! Both the transport and the context are write-once. The first successful
//! [`MonitoringClient::configure`] builds the transport; later calls return the
//! existing one. The first context supplied (through configuration, through
//! [`MonitoringClient::set_context`], or the placeholder substituted on first
//! use) is kept for the client's lifetime. Both slots are `OnceLock`s, so
//! concurrent first writes are resolved with exactly one winner.
//!
//! ## Diagnostics
//!
//! Problems local to the client never reach the caller as errors:
//!
//! | Condition | Level | Effect |
//! |-----------|-------|--------|
//! | no context yet | `warn` | placeholder context substituted, call proceeds |
//! | transport not initialized | `error` | call returns `None` |
//! | log rate outside `[0, 100]` | `error` | call returns `None` |
//!
//! ## Example
//!
//! ```rust,no_run
//! use splunk_monitoring_core::{event_data, HecTransport, MetricLog, MonitoringClient, MonitoringConfig};
//!
//! # async fn run() {
//! let config = MonitoringConfig::new("my-hec-token", "https://splunk.example.com:8088");
//! let client: MonitoringClient<HecTransport> = MonitoringClient::new(config);
//!
//! client.log_metric(
//!     MetricLog::new("checkout-completed")
//!         .data(event_data! { "items" => 3 })
//!         .log_rate(10.0),
//! );
//! # }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;

use futures::FutureExt;

use crate::capture::PanicError;
use crate::context::EnvironmentContext;
use crate::enrichment::{AdditionalArgs, Enrich};
use crate::error::{BoxError, Error, Result};
use crate::event::{error_trace, Event, EventData, FieldValue, Importance, Severity, TRACK, UNKNOWN_ERROR};
use crate::graphql::{GraphQlError, GraphQlOperation};
use crate::sampling::{is_valid_rate, Sampler, ThreadRngSampler};
use crate::transport::{Transport, TransportOptions, TransportSettings};

// ============================================
// Configuration
// ============================================

/// Connection settings and optional context for a [`MonitoringClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringConfig {
    /// Credential for the collector
    pub token: String,
    /// Collector base address
    pub endpoint: String,
    /// Attach host metadata to events (default: true)
    pub inject_additional_info: bool,
    /// Passthrough fields for the transport
    pub options: TransportOptions,
    /// Environment context, if already known
    pub context: Option<EnvironmentContext>,
}

impl MonitoringConfig {
    pub fn new(token: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: endpoint.into(),
            inject_additional_info: true,
            options: TransportOptions::default(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: EnvironmentContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn inject_additional_info(mut self, inject: bool) -> Self {
        self.inject_additional_info = inject;
        self
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("token must not be empty".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            inject_additional_info: self.inject_additional_info,
            options: self.options.clone(),
        }
    }
}

// ============================================
// Log requests
// ============================================

/// A metric to record.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricLog {
    pub metric_name: String,
    pub data: Option<EventData>,
    /// Percentage of calls that emit, in `[0, 100]`; `None` emits always
    pub log_rate: Option<f64>,
    pub extra: Option<EventData>,
}

impl MetricLog {
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            data: None,
            log_rate: None,
            extra: None,
        }
    }

    pub fn data(mut self, data: EventData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn log_rate(mut self, log_rate: f64) -> Self {
        self.log_rate = Some(log_rate);
        self
    }

    pub fn extra(mut self, extra: EventData) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// An application error to record.
#[derive(Debug)]
pub struct ErrorLog<'a> {
    pub error: &'a (dyn std::error::Error + Send + Sync + 'static),
    pub instance: Option<String>,
    pub args: AdditionalArgs,
}

impl<'a> ErrorLog<'a> {
    pub fn new(error: &'a (dyn std::error::Error + Send + Sync + 'static)) -> Self {
        Self {
            error,
            instance: None,
            args: AdditionalArgs::default(),
        }
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn extra(mut self, extra: EventData) -> Self {
        self.args.extra = Some(extra);
        self
    }

    pub fn enrichment(mut self, enrichment: impl Enrich + 'static) -> Self {
        self.args = self.args.enrichment(enrichment);
        self
    }

    pub fn args(mut self, args: AdditionalArgs) -> Self {
        self.args = args;
        self
    }
}

/// A failed GraphQL operation to record.
#[derive(Debug)]
pub struct GraphQlErrorLog<'a> {
    pub error: &'a GraphQlError,
    pub variables: Option<serde_json::Value>,
    pub instance: String,
    pub kind: GraphQlOperation,
    pub extra: Option<EventData>,
}

impl<'a> GraphQlErrorLog<'a> {
    pub fn new(error: &'a GraphQlError, instance: impl Into<String>, kind: GraphQlOperation) -> Self {
        Self {
            error,
            variables: None,
            instance: instance.into(),
            kind,
            extra: None,
        }
    }

    pub fn variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn extra(mut self, extra: EventData) -> Self {
        self.extra = Some(extra);
        self
    }
}

// ============================================
// Client
// ============================================

/// Shapes telemetry events and forwards them to a transport.
///
/// Construct one per process and pass it around (usually in an `Arc`).
pub struct MonitoringClient<T: Transport> {
    transport: OnceLock<T>,
    context: OnceLock<EnvironmentContext>,
    sampler: Box<dyn Sampler>,
}

impl<T: Transport> MonitoringClient<T> {
    /// Create a client and configure its transport.
    ///
    /// Never fails: a configuration problem is reported as a diagnostic and
    /// leaves the client not ready.
    pub fn new(config: MonitoringConfig) -> Self {
        Self::with_sampler(config, ThreadRngSampler)
    }

    /// Like [`MonitoringClient::new`] with a custom sampling source.
    pub fn with_sampler(config: MonitoringConfig, sampler: impl Sampler + 'static) -> Self {
        let client = Self::unconfigured_with_sampler(sampler);
        client.configure(config);
        client
    }

    /// Create a client whose transport is not configured yet.
    pub fn unconfigured() -> Self {
        Self::unconfigured_with_sampler(ThreadRngSampler)
    }

    fn unconfigured_with_sampler(sampler: impl Sampler + 'static) -> Self {
        Self {
            transport: OnceLock::new(),
            context: OnceLock::new(),
            sampler: Box::new(sampler),
        }
    }

    /// Configure the transport and context.
    ///
    /// Idempotent: an existing transport or context is never replaced.
    pub fn configure(&self, config: MonitoringConfig) -> Option<&T> {
        if let Some(context) = config.context.clone() {
            self.set_context(context);
        }

        if let Some(transport) = self.transport.get() {
            tracing::debug!("Transport already configured, ignoring new configuration");
            return Some(transport);
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Invalid monitoring configuration");
            return None;
        }

        match T::configure(&config.transport_settings()) {
            Ok(transport) => {
                // A concurrent configure may have won; theirs is kept.
                let _ = self.transport.set(transport);
                tracing::info!(endpoint = %config.endpoint, "Monitoring transport configured");
                self.transport.get()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to configure monitoring transport");
                None
            }
        }
    }

    /// Supply the environment context. Returns false if one was already set.
    pub fn set_context(&self, context: EnvironmentContext) -> bool {
        let accepted = self.context.set(context).is_ok();
        if !accepted {
            tracing::debug!("Environment context already set, keeping the existing one");
        }
        accepted
    }

    pub fn context(&self) -> Option<&EnvironmentContext> {
        self.context.get()
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.get()
    }

    pub fn is_ready(&self) -> bool {
        self.transport.get().is_some()
    }

    /// Shared precondition of every log operation.
    ///
    /// Substitutes the placeholder context if none is set (never blocking), and
    /// blocks only when the transport is not initialized.
    fn should_execute(&self) -> Option<(&T, &EnvironmentContext)> {
        let context = self.context.get_or_init(|| {
            tracing::warn!("Environment context is not set, using placeholder context");
            EnvironmentContext::sentinel()
        });

        match self.transport.get() {
            Some(transport) => Some((transport, context)),
            None => {
                tracing::error!("Monitoring transport was not initialized");
                None
            }
        }
    }

    /// Record a metric, subject to sampling.
    ///
    /// Returns the transport when an event was sent, `None` when the client is
    /// not ready, the log rate is invalid, or the call was sampled out.
    pub fn log_metric(&self, metric: MetricLog) -> Option<&T> {
        let (transport, context) = self.should_execute()?;

        if let Some(rate) = metric.log_rate {
            if !is_valid_rate(rate) {
                tracing::error!(
                    log_rate = rate,
                    metric = %metric.metric_name,
                    "log rate must be a number between 0 and 100"
                );
                return None;
            }
        }

        if !self.sampler.should_emit(metric.log_rate) {
            tracing::trace!(metric = %metric.metric_name, "Metric sampled out");
            return None;
        }

        let mut payload = context.payload();
        payload.extend(metric.data.unwrap_or_default());
        payload.extend(metric.extra.unwrap_or_default());

        self.emit(
            transport,
            Event {
                importance: Importance::Important,
                severity: Severity::Info,
                category: TRACK.to_string(),
                instance: metric.metric_name,
                payload,
                account: context.account().to_string(),
            },
        );

        Some(transport)
    }

    /// Record an application error. Errors are never sampled.
    ///
    /// The enrichment hook, if any, is awaited before the event is built. If it
    /// fails or panics, the event is still sent without its fields and the
    /// failure is returned as [`Error::Enrichment`].
    pub async fn log_error(&self, log: ErrorLog<'_>) -> Result<Option<&T>> {
        let Some((transport, context)) = self.should_execute() else {
            return Ok(None);
        };

        let enrichment = match &log.args.enrichment {
            Some(hook) => Some(
                match AssertUnwindSafe(hook.enrich()).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        Err(Box::new(PanicError::from_payload(payload.as_ref())) as BoxError)
                    }
                },
            ),
            None => None,
        };

        let mut payload = context.payload();
        payload.insert("error".to_string(), error_trace(log.error).into());
        payload.insert("message".to_string(), log.error.to_string().into());
        if let Some(extra) = log.args.extra {
            payload.extend(extra);
        }

        let enrichment_error = match enrichment {
            Some(Ok(fields)) => {
                payload.extend(fields);
                None
            }
            Some(Err(e)) => Some(e),
            None => None,
        };

        self.emit(
            transport,
            Event {
                importance: Importance::Critical,
                severity: Severity::Error,
                category: UNKNOWN_ERROR.to_string(),
                instance: log.instance.unwrap_or_default(),
                payload,
                account: context.account().to_string(),
            },
        );

        match enrichment_error {
            Some(e) => {
                tracing::warn!(error = %e, "Enrichment hook failed, error logged without it");
                Err(Error::Enrichment(e))
            }
            None => Ok(Some(transport)),
        }
    }

    /// Record a failed GraphQL query or mutation. Never sampled.
    pub fn log_graphql_error(&self, log: GraphQlErrorLog<'_>) -> Option<&T> {
        let (transport, context) = self.should_execute()?;

        let variables = match &log.variables {
            Some(variables) => FieldValue::from(variables.to_string()),
            None => FieldValue::Undefined,
        };

        let mut payload = context.payload();
        payload.insert("variables".to_string(), variables);
        payload.insert("error".to_string(), log.error.describe().into());
        payload.insert("message".to_string(), log.error.message.clone().into());
        if let Some(extra) = log.extra {
            payload.extend(extra);
        }

        self.emit(
            transport,
            Event {
                importance: Importance::Critical,
                severity: Severity::Error,
                category: log.kind.category().to_string(),
                instance: log.instance,
                payload,
                account: context.account().to_string(),
            },
        );

        Some(transport)
    }

    fn emit(&self, transport: &T, event: Event) {
        tracing::debug!(
            category = %event.category,
            instance = %event.instance,
            fields = event.payload.len(),
            "Forwarding event"
        );
        transport.send_event(event);
    }
}

impl<T: Transport> std::fmt::Debug for MonitoringClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringClient")
            .field("ready", &self.is_ready())
            .field("context", &self.context.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AppInfo, RuntimeInfo, NON_VTEX};
    use crate::event_data;
    use crate::sampling::FixedSampler;
    use crate::transport::MemoryTransport;

    fn context(account: &str) -> EnvironmentContext {
        EnvironmentContext::new(
            RuntimeInfo {
                account: account.to_string(),
                workspace: "master".to_string(),
                production: true,
                render_major: 8,
            },
            AppInfo {
                app_id: "acme.store".to_string(),
                app_version: "1.2.3".to_string(),
            },
        )
    }

    fn config() -> MonitoringConfig {
        MonitoringConfig::new("token", "https://splunk.example.com")
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());
        assert!(MonitoringConfig::new("", "https://splunk.example.com")
            .validate()
            .is_err());
        assert!(MonitoringConfig::new("token", "  ").validate().is_err());
        assert!(config().inject_additional_info);
    }

    #[test]
    fn test_invalid_config_leaves_client_not_ready() {
        let client: MonitoringClient<MemoryTransport> =
            MonitoringClient::new(MonitoringConfig::new("", "https://splunk.example.com"));
        assert!(!client.is_ready());
        assert!(client.log_metric(MetricLog::new("page-view")).is_none());
    }

    #[test]
    fn test_metric_shape() {
        let client: MonitoringClient<MemoryTransport> =
            MonitoringClient::new(config().with_context(context("acme")));

        client
            .log_metric(MetricLog::new("page-view").data(event_data! { "path" => "/cart" }))
            .unwrap();

        let events = client.transport().unwrap().events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.importance, Importance::Important);
        assert_eq!(event.severity, Severity::Info);
        assert_eq!(event.category, "Track");
        assert_eq!(event.instance, "page-view");
        assert_eq!(event.account, "acme");
        assert_eq!(event.payload["path"], FieldValue::from("/cart"));
        assert_eq!(event.payload["appId"], FieldValue::from("acme.store"));
        assert!(!event.payload.contains_key("account"));
    }

    #[test]
    fn test_metric_precedence() {
        let client: MonitoringClient<MemoryTransport> =
            MonitoringClient::new(config().with_context(context("acme")));

        client.log_metric(
            MetricLog::new("X")
                .data(event_data! { "a" => 1, "workspace" => "override" })
                .extra(event_data! { "a" => 2 }),
        );

        let event = &client.transport().unwrap().events()[0];
        assert_eq!(event.payload["a"], FieldValue::Number(2.0));
        assert_eq!(event.payload["workspace"], FieldValue::from("override"));
    }

    #[test]
    fn test_sampling_uses_sampler() {
        let client: MonitoringClient<MemoryTransport> =
            MonitoringClient::with_sampler(config(), FixedSampler(50.0));

        assert!(client.log_metric(MetricLog::new("m").log_rate(49.0)).is_none());
        assert!(client.log_metric(MetricLog::new("m").log_rate(50.0)).is_some());
        assert!(client.log_metric(MetricLog::new("m")).is_some());
        assert_eq!(client.transport().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_log_rate_sends_nothing() {
        let client: MonitoringClient<MemoryTransport> = MonitoringClient::new(config());

        assert!(client.log_metric(MetricLog::new("m").log_rate(-1.0)).is_none());
        assert!(client.log_metric(MetricLog::new("m").log_rate(100.5)).is_none());
        assert!(client.log_metric(MetricLog::new("m").log_rate(f64::NAN)).is_none());
        assert!(client.transport().unwrap().is_empty());
    }

    #[test]
    fn test_sentinel_context_becomes_permanent() {
        let client: MonitoringClient<MemoryTransport> = MonitoringClient::new(config());

        client.log_metric(MetricLog::new("first"));
        assert!(client.context().unwrap().is_sentinel());

        assert!(!client.set_context(context("late")));
        client.configure(config().with_context(context("later")));
        client.log_metric(MetricLog::new("second"));

        for event in client.transport().unwrap().events() {
            assert_eq!(event.account, NON_VTEX);
            assert_eq!(event.payload["appVersion"], FieldValue::from(NON_VTEX));
        }
    }

    #[test]
    fn test_sentinel_installed_even_when_not_ready() {
        let client: MonitoringClient<MemoryTransport> = MonitoringClient::unconfigured();
        assert!(client.log_metric(MetricLog::new("m")).is_none());
        assert!(client.context().unwrap().is_sentinel());
    }

    #[test]
    fn test_configure_is_idempotent() {
        let client: MonitoringClient<MemoryTransport> =
            MonitoringClient::new(config().with_context(context("acme")));

        let other = MonitoringConfig::new("other-token", "https://elsewhere.example.com")
            .with_context(context("other"));
        let transport = client.configure(other).unwrap();

        assert_eq!(transport.settings().endpoint, "https://splunk.example.com");
        assert_eq!(client.context().unwrap().account(), "acme");
    }

    #[test]
    fn test_late_configuration_readies_client() {
        let client: MonitoringClient<MemoryTransport> = MonitoringClient::unconfigured();
        assert!(!client.is_ready());

        client.configure(config());
        assert!(client.is_ready());
        assert!(client.log_metric(MetricLog::new("m")).is_some());
    }

    #[test]
    fn test_graphql_error_shape() {
        let client: MonitoringClient<MemoryTransport> =
            MonitoringClient::new(config().with_context(context("acme")));
        let error = GraphQlError::network("connection reset");

        client
            .log_graphql_error(
                GraphQlErrorLog::new(&error, "ProductQuery", GraphQlOperation::Query)
                    .variables(serde_json::json!({ "slug": "shoe" }))
                    .extra(event_data! { "retry" => false }),
            )
            .unwrap();

        let event = &client.transport().unwrap().events()[0];
        assert_eq!(event.importance, Importance::Critical);
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.category, "QueryError");
        assert_eq!(event.instance, "ProductQuery");
        assert_eq!(event.payload["variables"], FieldValue::from(r#"{"slug":"shoe"}"#));
        assert_eq!(
            event.payload["message"],
            FieldValue::from("Network error: connection reset")
        );
        assert!(event.payload["error"]
            .as_str()
            .unwrap()
            .contains("\"networkError\":\"connection reset\""));
        assert_eq!(event.payload["retry"], FieldValue::Bool(false));
    }

    #[test]
    fn test_graphql_error_without_variables() {
        let client: MonitoringClient<MemoryTransport> = MonitoringClient::new(config());
        let error = GraphQlError::from_entries(vec![]);

        client.log_graphql_error(GraphQlErrorLog::new(
            &error,
            "AddToCart",
            GraphQlOperation::Mutation,
        ));

        let event = &client.transport().unwrap().events()[0];
        assert_eq!(event.category, "MutationError");
        assert!(event.payload["variables"].is_undefined());
    }
}
