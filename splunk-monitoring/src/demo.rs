//! Demo: a component that explodes behind an error boundary
//!
//! The boundary carries static extra fields and an enrichment hook that
//! simulates a slow user lookup. The failure is logged with both, then
//! re-raised and reported by the CLI.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use splunk_monitoring_core::capture::{with_error_boundary, Component};
use splunk_monitoring_core::{
    event_data, AdditionalArgs, BoxError, EventData, MonitoringClient, Transport,
};

use crate::CliError;

/// Renders a heading, or explodes when clicked.
struct App;

#[async_trait]
impl Component for App {
    /// Whether the heading was clicked
    type Props = bool;
    type Output = String;
    type Error = CliError;

    fn display_name(&self) -> Option<&str> {
        Some("App")
    }

    async fn render(&self, clicked: bool) -> Result<String, CliError> {
        if clicked {
            return Err(CliError("KABOOM!".to_string()));
        }
        Ok("<h1>Explode!</h1>".to_string())
    }
}

async fn get_important_data(delay: Duration) -> Result<EventData, BoxError> {
    tokio::time::sleep(delay).await;
    Ok(event_data! { "userId" => "9876" })
}

pub async fn run<T: Transport + 'static>(client: Arc<MonitoringClient<T>>, delay_ms: u64) -> Result<()> {
    let delay = Duration::from_millis(delay_ms);
    let args = AdditionalArgs::new()
        .extra(event_data! { "hello" => "world" })
        .enrichment(move || get_important_data(delay));

    let app = with_error_boundary(client, args).wrap(App);
    println!("Rendering {}", app.display_name().unwrap_or("Component"));

    let heading = app.render(false).await?;
    println!("{}", heading);

    println!("Clicking...");
    app.render(true).await?;

    Ok(())
}
