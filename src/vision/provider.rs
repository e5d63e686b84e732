//! Vision provider trait and the analysis it returns.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::VisionError;
use crate::history::{
    AnalysisRecord, DEFAULT_SUMMARY, IdentifiedIssue, count_from_value, score_from_value,
};

/// Raw analysis from a provider. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderAnalysis {
    pub cattle_count: Option<u32>,
    pub health_score: Option<u8>,
    pub identified_issues: Vec<IdentifiedIssue>,
    pub recommendations: Vec<String>,
    pub summary: Option<String>,
}

impl ProviderAnalysis {
    /// Parse a provider payload, unwrapping an optional `result` envelope.
    ///
    /// Malformed fields are dropped rather than failing the whole payload.
    /// Returns `None` if the payload is not a JSON object.
    pub fn from_json(payload: &Value) -> Option<Self> {
        let body = match payload.get("result") {
            Some(inner) if inner.is_object() => inner,
            _ => payload,
        };
        let obj = body.as_object()?;

        let present = |key: &str| obj.get(key).filter(|v| !v.is_null());

        Some(Self {
            cattle_count: present("cattleCount").map(count_from_value),
            health_score: present("healthScore").map(score_from_value),
            identified_issues: present("identifiedIssues")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            recommendations: present("recommendations")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            summary: present("summary")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        })
    }

    /// Build a new history record, defaulting anything missing.
    pub fn into_record(self, camera_id: Option<String>) -> AnalysisRecord {
        AnalysisRecord {
            cattle_count: self.cattle_count.unwrap_or(0),
            health_score: self.health_score.unwrap_or(0).min(100),
            identified_issues: self.identified_issues,
            recommendations: self.recommendations,
            raw_analysis: self
                .summary
                .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
            ..AnalysisRecord::new(camera_id)
        }
    }
}

/// A capability that turns one base64-encoded image into an analysis.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Analyse one image. `image_base64` carries no `data:` prefix.
    async fn analyze(&self, image_base64: &str) -> Result<ProviderAnalysis, VisionError>;
}
