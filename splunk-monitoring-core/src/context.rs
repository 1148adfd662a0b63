//! Environment context merged into every event
//!
//! The context identifies the tenant (`account`, `workspace`) and the calling
//! application (`app_id`, `app_version`). A client holds at most one context
//! for its whole lifetime; see [`crate::MonitoringClient::set_context`].

use serde::{Deserialize, Serialize};

use crate::event::EventData;

/// Placeholder written into every field of the sentinel context.
pub const NON_VTEX: &str = "non-vtex";

/// Deployment/tenant information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub account: String,
    pub workspace: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default)]
    pub render_major: u32,
}

/// Identity of the calling application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_id: String,
    pub app_version: String,
}

/// Tenant and application metadata attached to events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentContext {
    pub runtime_info: RuntimeInfo,
    pub app_info: AppInfo,
}

impl EnvironmentContext {
    pub fn new(runtime_info: RuntimeInfo, app_info: AppInfo) -> Self {
        Self {
            runtime_info,
            app_info,
        }
    }

    /// Context substituted when none was supplied before the first log call.
    pub fn sentinel() -> Self {
        Self {
            runtime_info: RuntimeInfo {
                account: NON_VTEX.to_string(),
                workspace: NON_VTEX.to_string(),
                production: false,
                render_major: 0,
            },
            app_info: AppInfo {
                app_id: NON_VTEX.to_string(),
                app_version: NON_VTEX.to_string(),
            },
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    pub fn account(&self) -> &str {
        &self.runtime_info.account
    }

    /// Payload fields contributed by the context.
    ///
    /// `account` is left out: it travels as the event's routing field.
    pub fn payload(&self) -> EventData {
        let mut data = EventData::new();
        data.insert(
            "workspace".to_string(),
            self.runtime_info.workspace.clone().into(),
        );
        data.insert(
            "production".to_string(),
            self.runtime_info.production.into(),
        );
        data.insert(
            "renderMajor".to_string(),
            self.runtime_info.render_major.into(),
        );
        data.insert("appId".to_string(), self.app_info.app_id.clone().into());
        data.insert(
            "appVersion".to_string(),
            self.app_info.app_version.clone().into(),
        );
        data
    }
}
