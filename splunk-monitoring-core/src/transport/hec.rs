//! HTTP transport for the Splunk HTTP Event Collector (HEC)
//!
//! Events are queued on an unbounded channel and posted one by one by a worker
//! task on the tokio runtime that was current when the transport was
//! configured. Delivery failures are logged and dropped: there is no retry,
//! batching or on-disk buffering.
//!
//! Each event is posted as:
//!
//! ```json
//! {
//!   "time": 1700000000.123,
//!   "sourcetype": "log",
//!   "event": {
//!     "level": "Error",
//!     "type": "Critical",
//!     "workflowType": "UnknownError",
//!     "workflowInstance": "checkout",
//!     "account": "acme",
//!     "message": "..."
//!   }
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::event::{payload_to_json, Event};

use super::{Transport, TransportSettings};

/// Header identifying the request channel to the collector
const CHANNEL_HEADER: &str = "X-Splunk-Request-Channel";

enum Command {
    Send(serde_json::Value),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct DeliveryStats {
    sent: AtomicUsize,
    failed: AtomicUsize,
}

/// Transport posting events to a Splunk HEC endpoint
pub struct HecTransport {
    settings: TransportSettings,
    url: Url,
    channel: String,
    sender: mpsc::UnboundedSender<Command>,
    stats: Arc<DeliveryStats>,
}

impl HecTransport {
    /// Full collector URL events are posted to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request channel id sent with every request
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Number of events the collector accepted
    pub fn sent_count(&self) -> usize {
        self.stats.sent.load(Ordering::Relaxed)
    }

    /// Number of events that failed to deliver
    pub fn failed_count(&self) -> usize {
        self.stats.failed.load(Ordering::Relaxed)
    }

    /// Wait until every event queued so far has been posted (or dropped)
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Command::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

impl std::fmt::Debug for HecTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HecTransport")
            .field("url", &self.url.as_str())
            .field("channel", &self.channel)
            .field("sent", &self.sent_count())
            .field("failed", &self.failed_count())
            .finish()
    }
}

impl Transport for HecTransport {
    fn configure(settings: &TransportSettings) -> Result<Self> {
        let url = collector_url(&settings.endpoint, &settings.options.path)?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::Transport("HEC transport must be configured inside a tokio runtime".to_string())
        })?;

        let channel = uuid::Uuid::new_v4().to_string();

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = format!("Splunk {}", settings.token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| Error::Config(format!("invalid token: {}", e)))?,
        );
        headers.insert(
            CHANNEL_HEADER,
            HeaderValue::from_str(&channel)
                .map_err(|e| Error::Transport(format!("invalid channel id: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.options.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(DeliveryStats::default());

        runtime.spawn(run_worker(
            http_client,
            url.clone(),
            receiver,
            Arc::clone(&stats),
        ));

        tracing::debug!(url = %url, channel = %channel, "HEC transport configured");

        Ok(Self {
            settings: settings.clone(),
            url,
            channel,
            sender,
            stats,
        })
    }

    fn send_event(&self, event: Event) {
        let body = build_body(&event, &self.settings, now_epoch_secs());
        if self.sender.send(Command::Send(body)).is_err() {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                category = %event.category,
                "HEC worker has stopped, dropping event"
            );
        }
    }
}

/// Join the collector path onto the endpoint
fn collector_url(endpoint: &str, path: &str) -> Result<Url> {
    let base = Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "endpoint must use http or https, got {:?}",
            base.scheme()
        )));
    }

    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| Error::Config(format!("invalid collector path: {}", e)))
}

fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Build the HEC request body for an event
///
/// Routing fields are written after the payload so a payload key can never
/// masquerade as `level`, `type` or `account`.
pub(crate) fn build_body(event: &Event, settings: &TransportSettings, time: f64) -> serde_json::Value {
    let mut fields = payload_to_json(&event.payload);

    if settings.inject_additional_info {
        for (key, value) in additional_info() {
            fields.insert(key.to_string(), serde_json::Value::String(value));
        }
    }

    fields.insert("level".into(), event.severity.as_str().into());
    fields.insert("type".into(), event.importance.as_str().into());
    fields.insert("workflowType".into(), event.category.clone().into());
    fields.insert("workflowInstance".into(), event.instance.clone().into());
    fields.insert("account".into(), event.account.clone().into());

    let mut body = serde_json::json!({
        "time": time,
        "sourcetype": settings.options.sourcetype,
        "event": fields,
    });

    let options = &settings.options;
    for (key, value) in [
        ("source", &options.source),
        ("host", &options.host),
        ("index", &options.index),
    ] {
        if let Some(value) = value {
            body[key] = serde_json::Value::String(value.clone());
        }
    }

    body
}

/// Host metadata attached when `inject_additional_info` is on
fn additional_info() -> [(&'static str, String); 3] {
    [
        ("additionalInfo_os", std::env::consts::OS.to_string()),
        ("additionalInfo_arch", std::env::consts::ARCH.to_string()),
        (
            "additionalInfo_sdkVersion",
            env!("CARGO_PKG_VERSION").to_string(),
        ),
    ]
}

async fn run_worker(
    client: reqwest::Client,
    url: Url,
    mut receiver: mpsc::UnboundedReceiver<Command>,
    stats: Arc<DeliveryStats>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Send(body) => match post_event(&client, &url, &body).await {
                Ok(()) => {
                    stats.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "Failed to deliver event to Splunk");
                }
            },
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn post_event(client: &reqwest::Client, url: &Url, body: &serde_json::Value) -> Result<()> {
    let response = client
        .post(url.clone())
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    Err(Error::Transport(format!(
        "HEC error ({}): {}",
        status, error_text
    )))
}
