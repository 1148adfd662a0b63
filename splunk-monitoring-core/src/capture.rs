//! Error-capturing component wrapper
//!
//! [`with_error_boundary`] binds a [`MonitoringClient`] and optional
//! [`AdditionalArgs`] and returns a factory that wraps any [`Component`]. The
//! wrapped component renders exactly like the original. When rendering fails,
//! the boundary logs the failure through [`MonitoringClient::log_error`]
//! (awaiting any enrichment hook) and then hands the original failure back to
//! the caller untouched:
//!
//! - an `Err` is returned as the same value
//! - a panic is resumed with the same payload
//!
//! The boundary is telemetry only; it never recovers from a failure.
//!
//! ```text
//! Clean --error--> Capturing --logged--> Rethrowing --error--> Capturing ...
//!   ^                                        |
//!   +------------- successful render --------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use splunk_monitoring_core::capture::{with_error_boundary, Component};
//! use splunk_monitoring_core::{AdditionalArgs, HecTransport, MonitoringClient, MonitoringConfig};
//!
//! struct Checkout;
//!
//! #[async_trait::async_trait]
//! impl Component for Checkout {
//!     type Props = ();
//!     type Output = String;
//!     type Error = std::io::Error;
//!
//!     async fn render(&self, _props: ()) -> Result<String, std::io::Error> {
//!         Ok("<checkout/>".to_string())
//!     }
//! }
//!
//! # async fn run() {
//! let client: Arc<MonitoringClient<HecTransport>> = Arc::new(MonitoringClient::new(
//!     MonitoringConfig::new("token", "https://splunk.example.com:8088"),
//! ));
//! let checkout = with_error_boundary(client, AdditionalArgs::new()).wrap(Checkout);
//! assert_eq!(checkout.display_name(), Some("WithErrorBoundary(Component)"));
//! # }
//! ```

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::client::{ErrorLog, MonitoringClient};
use crate::enrichment::AdditionalArgs;
use crate::transport::Transport;

/// Name used when the wrapped component has none.
const FALLBACK_NAME: &str = "Component";

/// Something the host environment renders.
#[async_trait]
pub trait Component: Send + Sync {
    type Props: Send;
    type Output: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name shown by debugging and introspection tools
    fn display_name(&self) -> Option<&str> {
        None
    }

    async fn render(&self, props: Self::Props) -> Result<Self::Output, Self::Error>;
}

/// Where a boundary is in its capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BoundaryState {
    /// No failure in flight
    Clean = 0,
    /// Logging a failure, possibly waiting on enrichment
    Capturing = 1,
    /// Failure logged and handed back to the caller
    Rethrowing = 2,
}

impl BoundaryState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BoundaryState::Capturing,
            2 => BoundaryState::Rethrowing,
            _ => BoundaryState::Clean,
        }
    }
}

/// A panic raised while rendering, as seen by the telemetry backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    pub message: String,
}

impl PanicError {
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PanicError {}

/// Bind a client and extra arguments; wrap components with the result.
pub fn with_error_boundary<T: Transport>(
    client: Arc<MonitoringClient<T>>,
    args: AdditionalArgs,
) -> ErrorBoundaryFactory<T> {
    ErrorBoundaryFactory { client, args }
}

/// Wraps components in [`ErrorBoundary`]s sharing one client and argument set.
pub struct ErrorBoundaryFactory<T: Transport> {
    client: Arc<MonitoringClient<T>>,
    args: AdditionalArgs,
}

impl<T: Transport> ErrorBoundaryFactory<T> {
    pub fn wrap<C: Component>(&self, component: C) -> ErrorBoundary<C, T> {
        let wrapped_name = component.display_name().unwrap_or(FALLBACK_NAME);
        let display_name = format!("WithErrorBoundary({})", wrapped_name);

        ErrorBoundary {
            inner: component,
            client: Arc::clone(&self.client),
            args: self.args.clone(),
            display_name,
            state: AtomicU8::new(BoundaryState::Clean as u8),
            captured: AtomicU64::new(0),
        }
    }
}

impl<T: Transport> Clone for ErrorBoundaryFactory<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            args: self.args.clone(),
        }
    }
}

/// A component that logs its render failures before passing them on.
///
/// Dereferences to the wrapped component, so its own methods and metadata stay
/// reachable through the wrapper.
pub struct ErrorBoundary<C, T: Transport> {
    inner: C,
    client: Arc<MonitoringClient<T>>,
    args: AdditionalArgs,
    display_name: String,
    state: AtomicU8,
    captured: AtomicU64,
}

impl<C, T: Transport> ErrorBoundary<C, T> {
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    pub fn state(&self) -> BoundaryState {
        BoundaryState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of failures this boundary has captured
    pub fn captured(&self) -> u64 {
        self.captured.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: BoundaryState) {
        self.state.store(state as u8, Ordering::Release);
    }

    async fn capture(&self, error: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.set_state(BoundaryState::Capturing);
        self.captured.fetch_add(1, Ordering::Relaxed);

        let log = ErrorLog::new(error).args(self.args.clone());
        match self.client.log_error(log).await {
            Ok(Some(_)) => {
                tracing::debug!(boundary = %self.display_name, "Captured render failure");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    boundary = %self.display_name,
                    error = %e,
                    "Render failure logged without enrichment"
                );
            }
        }

        self.set_state(BoundaryState::Rethrowing);
    }
}

impl<C, T: Transport> Deref for ErrorBoundary<C, T> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C, T: Transport> fmt::Debug for ErrorBoundary<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("display_name", &self.display_name)
            .field("state", &self.state())
            .field("captured", &self.captured())
            .finish()
    }
}

#[async_trait]
impl<C: Component, T: Transport> Component for ErrorBoundary<C, T> {
    type Props = C::Props;
    type Output = C::Output;
    type Error = C::Error;

    fn display_name(&self) -> Option<&str> {
        Some(&self.display_name)
    }

    async fn render(&self, props: C::Props) -> Result<C::Output, C::Error> {
        let outcome = AssertUnwindSafe(self.inner.render(props))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(output)) => {
                self.set_state(BoundaryState::Clean);
                Ok(output)
            }
            Ok(Err(error)) => {
                self.capture(&error).await;
                Err(error)
            }
            Err(payload) => {
                let error = PanicError::from_payload(payload.as_ref());
                self.capture(&error).await;
                std::panic::resume_unwind(payload)
            }
        }
    }
}
