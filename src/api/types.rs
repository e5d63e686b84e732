//! Request and response DTOs for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::history::HistoryQuery;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// --- Analyze ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Raw base64 or a `data:<mime>;base64,<data>` URL.
    #[serde(default)]
    pub base64_image: Option<String>,
    #[serde(default)]
    pub camera_id: Option<String>,
}

// --- History ---

/// Query string for `GET /api/history`.
///
/// Numbers arrive as strings so that junk falls back to defaults instead of
/// rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub camera_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl HistoryParams {
    pub fn into_query(self) -> HistoryQuery {
        HistoryQuery {
            camera_id: self.camera_id.filter(|c| !c.is_empty()),
            limit: self.limit.and_then(|v| v.trim().parse().ok()),
            offset: self.offset.and_then(|v| v.trim().parse().ok()),
        }
    }
}
