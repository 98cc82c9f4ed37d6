//! Conversation flavors: endpoint path plus completion payload shape.

use super::phase::Phase;
use crate::config::Config;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fields every completion payload carries, whatever the flavor.
pub trait CompletionPayload: DeserializeOwned + Send + 'static {
    fn response(&self) -> &str;
    fn phase(&self) -> &str;
    fn session_id(&self) -> i64;

    /// Whether the server considers the conversation finished.
    fn is_complete(&self) -> bool {
        self.phase().parse::<Phase>().is_ok_and(|p| p.is_complete())
    }
}

/// A conversation flavor sharing the common streaming protocol.
pub trait ConversationFlavor: Send + Sync + 'static {
    type Completion: CompletionPayload;

    const NAME: &'static str;

    fn endpoint(config: &Config) -> String;
}

/// Completion for the dashboard-building conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCompletion {
    pub response: String,
    pub phase: String,
    pub session_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub suggested_actions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub complete: bool,
}

impl CompletionPayload for DashboardCompletion {
    fn response(&self) -> &str {
        &self.response
    }

    fn phase(&self) -> &str {
        &self.phase
    }

    fn session_id(&self) -> i64 {
        self.session_id
    }

    fn is_complete(&self) -> bool {
        self.complete || self.phase.parse::<Phase>().is_ok_and(|p| p.is_complete())
    }
}

/// An action button offered with a chart result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Completion for the chart-specific conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartCompletion {
    pub response: String,
    pub phase: String,
    pub session_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    /// Handed to the chart renderer as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub action_buttons: Vec<ActionButton>,
}

impl CompletionPayload for ChartCompletion {
    fn response(&self) -> &str {
        &self.response
    }

    fn phase(&self) -> &str {
        &self.phase
    }

    fn session_id(&self) -> i64 {
        self.session_id
    }
}

/// Generic dashboard-building conversation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardFlavor;

impl ConversationFlavor for DashboardFlavor {
    type Completion = DashboardCompletion;

    const NAME: &'static str = "dashboard";

    fn endpoint(config: &Config) -> String {
        config.dashboard_stream_path.clone()
    }
}

/// Chart-specific conversation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartFlavor;

impl ConversationFlavor for ChartFlavor {
    type Completion = ChartCompletion;

    const NAME: &'static str = "chart";

    fn endpoint(config: &Config) -> String {
        config.chart_stream_path.clone()
    }
}
