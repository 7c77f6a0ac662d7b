use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::App;

#[derive(Debug, Deserialize, Default)]
pub struct CreateRequest {
    #[serde(default)]
    pub version: Option<JsonValue>,
}

impl CreateRequest {
    /// The version as stored: strings verbatim, anything else as JSON text.
    pub fn version_string(&self) -> Option<String> {
        match &self.version {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default)]
    pub bookmarks: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub max_sync_size: u64,
    pub message: String,
    pub status: u8,
    pub version: String,
}

impl InfoResponse {
    pub fn from_app(app: &App) -> Self {
        InfoResponse {
            max_sync_size: app.max_sync_size,
            message: app.message.clone(),
            status: app.service_status(),
            version: app.api_version.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdatedResponse {
    pub last_updated: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}
