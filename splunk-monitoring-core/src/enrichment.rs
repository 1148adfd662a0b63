//! Enrichment hooks for error events
//!
//! A hook produces extra payload fields at log time, for example a user id that
//! has to be fetched first. Every hook is awaited the same way whether it
//! suspends or not; a synchronous hook just returns a ready future.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::event::EventData;

/// Produces payload fields merged into an error event with highest precedence.
#[async_trait]
pub trait Enrich: Send + Sync {
    async fn enrich(&self) -> Result<EventData, BoxError>;
}

#[async_trait]
impl<F, Fut> Enrich for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<EventData, BoxError>> + Send + 'static,
{
    async fn enrich(&self) -> Result<EventData, BoxError> {
        (self)().await
    }
}

/// Enrichment that always yields the same fields.
#[derive(Debug, Clone, Default)]
pub struct StaticEnrichment(pub EventData);

#[async_trait]
impl Enrich for StaticEnrichment {
    async fn enrich(&self) -> Result<EventData, BoxError> {
        Ok(self.0.clone())
    }
}

/// Extra arguments attached to error logs.
///
/// Shared by direct `log_error` calls and by error boundaries, which hand the
/// same arguments to every error they capture.
#[derive(Clone, Default)]
pub struct AdditionalArgs {
    /// Static fields, merged after the error fields
    pub extra: Option<EventData>,
    /// Hook awaited at log time, merged last
    pub enrichment: Option<Arc<dyn Enrich>>,
}

impl AdditionalArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extra(mut self, extra: EventData) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn enrichment(mut self, enrichment: impl Enrich + 'static) -> Self {
        self.enrichment = Some(Arc::new(enrichment));
        self
    }
}

impl std::fmt::Debug for AdditionalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdditionalArgs")
            .field("extra", &self.extra)
            .field("enrichment", &self.enrichment.is_some())
            .finish()
    }
}
