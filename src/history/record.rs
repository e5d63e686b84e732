//! Persisted analysis records and the document that holds them.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Summary used when a provider returns no free-text analysis.
pub const DEFAULT_SUMMARY: &str = "Analysis complete.";

/// A health issue spotted in one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedIssue {
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub possible_causes: Vec<String>,
}

/// One completed analysis.
///
/// `id` and `timestamp` are required when decoding. Every other field falls
/// back to its default so that partially written records stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub cattle_count: u32,
    #[serde(default, deserialize_with = "lenient_score")]
    pub health_score: u8,
    #[serde(default)]
    pub identified_issues: Vec<IdentifiedIssue>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default = "default_summary")]
    pub raw_analysis: String,
}

fn default_summary() -> String {
    DEFAULT_SUMMARY.to_string()
}

/// Non-negative whole count from any JSON value; anything else is 0.
pub(crate) fn count_from_value(value: &Value) -> u32 {
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round().min(u32::MAX as f64) as u32)
        .unwrap_or(0)
}

/// Health score clamped to 0..=100; non-numbers are 0.
pub(crate) fn score_from_value(value: &Value) -> u8 {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Value::deserialize(deserializer).map(|v| count_from_value(&v))
}

fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Value::deserialize(deserializer).map(|v| score_from_value(&v))
}

impl AnalysisRecord {
    /// Create an empty record stamped with a fresh id and the current time.
    pub fn new(camera_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            camera_id,
            cattle_count: 0,
            health_score: 0,
            identified_issues: Vec::new(),
            recommendations: Vec::new(),
            raw_analysis: default_summary(),
        }
    }
}

/// The persisted aggregate: `{ "history": [...] }`, newest first.
///
/// Entries that could not be decoded into an [`AnalysisRecord`] are kept
/// verbatim in `unparsed` and written back after the typed records, so a
/// rewrite never loses data it does not understand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
    pub history: Vec<AnalysisRecord>,
    pub(crate) unparsed: Vec<Value>,
}

impl Serialize for HistoryState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Entries<'a>(&'a HistoryState);

        impl Serialize for Entries<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut seq = serializer.serialize_seq(Some(self.0.stored_len()))?;
                for record in &self.0.history {
                    seq.serialize_element(record)?;
                }
                for raw in &self.0.unparsed {
                    seq.serialize_element(raw)?;
                }
                seq.end()
            }
        }

        let mut doc = serializer.serialize_struct("HistoryState", 1)?;
        doc.serialize_field("history", &Entries(self))?;
        doc.end()
    }
}

impl HistoryState {
    pub fn new(history: Vec<AnalysisRecord>) -> Self {
        Self {
            history,
            unparsed: Vec::new(),
        }
    }

    /// Number of decoded records.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Entries kept verbatim because they could not be decoded.
    pub fn unparsed(&self) -> &[Value] {
        &self.unparsed
    }

    /// Length of the persisted `history` array.
    pub fn stored_len(&self) -> usize {
        self.history.len() + self.unparsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Insert a record at the front (newest-first convention).
    pub fn prepend(&mut self, record: AnalysisRecord) {
        self.history.insert(0, record);
    }

    /// Keep at most `max` entries, dropping the oldest by timestamp.
    ///
    /// The sort is stable, so records sharing a timestamp keep their
    /// insertion order and the later-positioned one is evicted first.
    /// Unparsed entries have no usable timestamp and are evicted before
    /// any decoded record.
    pub fn enforce_bound(&mut self, max: usize) {
        self.history
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.history.truncate(max);
        self.unparsed.truncate(max - self.history.len());
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record_at(id: &str, minutes_ago: i64) -> AnalysisRecord {
        AnalysisRecord {
            id: id.to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            ..AnalysisRecord::new(None)
        }
    }

    #[test]
    fn test_record_uses_camel_case_on_the_wire() {
        let mut record = record_at("r1", 0);
        record.camera_id = Some("cam-01".to_string());
        record.identified_issues.push(IdentifiedIssue {
            issue: "Lameness".to_string(),
            description: "Uneven gait".to_string(),
            possible_causes: vec!["Hoof injury".to_string()],
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cameraId"], "cam-01");
        assert_eq!(json["cattleCount"], 0);
        assert_eq!(json["healthScore"], 0);
        assert_eq!(json["rawAnalysis"], DEFAULT_SUMMARY);
        assert_eq!(
            json["identifiedIssues"][0]["possibleCauses"][0],
            "Hoof injury"
        );
    }

    #[test]
    fn test_missing_optional_fields_take_defaults() {
        let record: AnalysisRecord = serde_json::from_value(serde_json::json!({
            "id": "legacy",
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.cattle_count, 0);
        assert_eq!(record.health_score, 0);
        assert!(record.camera_id.is_none());
        assert!(record.identified_issues.is_empty());
        assert_eq!(record.raw_analysis, DEFAULT_SUMMARY);
    }

    #[test]
    fn test_invalid_numbers_are_normalised() {
        let record: AnalysisRecord = serde_json::from_value(serde_json::json!({
            "id": "odd",
            "timestamp": "2024-05-01T10:00:00Z",
            "cattleCount": -3,
            "healthScore": 140.4
        }))
        .unwrap();
        assert_eq!(record.cattle_count, 0);
        assert_eq!(record.health_score, 100);

        assert_eq!(count_from_value(&serde_json::json!("twelve")), 0);
        assert_eq!(count_from_value(&serde_json::json!(12.6)), 13);
        assert_eq!(score_from_value(&Value::Null), 0);
    }

    #[test]
    fn test_enforce_bound_drops_oldest_even_when_appended() {
        let mut state = HistoryState::new(vec![record_at("new", 1), record_at("mid", 5)]);
        // Appended instead of prepended: oldest sits at the front.
        state.history.insert(0, record_at("old", 60));

        state.enforce_bound(2);

        let ids: Vec<_> = state.history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_unparsed_entries_serialize_after_records_and_evict_first() {
        let mut state = HistoryState::new(vec![record_at("new", 1), record_at("old", 30)]);
        state.unparsed = vec![serde_json::json!({ "rawAnalysis": "legacy" }), Value::from(7)];

        let json = serde_json::to_value(&state).unwrap();
        let ids: Vec<_> = json["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].clone())
            .collect();
        assert_eq!(ids[..2], [Value::from("new"), Value::from("old")]);
        assert_eq!(json["history"][2]["rawAnalysis"], "legacy");
        assert_eq!(json["history"][3], 7);

        state.enforce_bound(3);
        assert_eq!(state.len(), 2);
        assert_eq!(state.unparsed().len(), 1);

        state.enforce_bound(1);
        assert_eq!(state.stored_len(), 1);
        assert_eq!(state.history[0].id, "new");
    }

    #[test]
    fn test_enforce_bound_keeps_insertion_order_on_ties() {
        let now = Utc::now();
        let mut a = record_at("a", 0);
        let mut b = record_at("b", 0);
        a.timestamp = now;
        b.timestamp = now;
        let mut state = HistoryState::new(vec![a, b]);

        state.enforce_bound(1);

        assert_eq!(state.history[0].id, "a");
    }
}
