//! Read-side views over the history: filtered pages, lookup, and summary.
//!
//! The pure functions live on [`HistoryState`]; the async wrappers on
//! [`HistoryStore`] read a fresh snapshot first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::history::record::{AnalysisRecord, HistoryState};
use crate::history::store::HistoryStore;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: i64 = 200;

/// Records at or below this score count as critical.
pub const CRITICAL_SCORE: u8 = 60;

/// Filter and pagination parameters for list views.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Exact-match camera filter.
    pub camera_id: Option<String>,
    /// Clamped to `[1, history_max]`. Defaults to [`DEFAULT_PAGE_LIMIT`].
    pub limit: Option<i64>,
    /// Negative values are treated as 0.
    pub offset: Option<i64>,
}

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub history: Vec<AnalysisRecord>,
    /// Matching records before pagination.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Aggregate figures for the dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total: usize,
    pub avg_score: u8,
    pub critical: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl HistoryState {
    /// Filter, sort by timestamp descending, and slice one page.
    ///
    /// Storage order is not trusted for display; ties keep storage order.
    pub fn page(&self, query: &HistoryQuery, history_max: usize) -> HistoryPage {
        let max = history_max.max(1) as i64;
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, max) as usize;
        let offset = query.offset.unwrap_or(0).max(0) as usize;

        let mut matching: Vec<&AnalysisRecord> = self
            .history
            .iter()
            .filter(|r| match &query.camera_id {
                Some(camera) => r.camera_id.as_deref() == Some(camera.as_str()),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matching.len();
        let history = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        HistoryPage {
            history,
            total,
            limit,
            offset,
        }
    }

    pub fn find(&self, id: &str) -> Option<&AnalysisRecord> {
        self.history.iter().find(|r| r.id == id)
    }

    pub fn summary(&self) -> HistorySummary {
        let total = self.history.len();
        let avg_score = if total == 0 {
            0
        } else {
            let sum: u64 = self.history.iter().map(|r| u64::from(r.health_score)).sum();
            (sum as f64 / total as f64).round() as u8
        };
        let critical = self
            .history
            .iter()
            .filter(|r| r.health_score <= CRITICAL_SCORE)
            .count();

        HistorySummary {
            total,
            avg_score,
            critical,
            last_update: self.history.iter().map(|r| r.timestamp).max(),
        }
    }
}

impl HistoryStore {
    /// Current page of history for `query`.
    pub async fn query(&self, query: &HistoryQuery) -> Result<HistoryPage, StoreError> {
        let state = self.read().await?;
        Ok(state.page(query, self.history_max()))
    }

    /// Look up one record by id.
    pub async fn find(&self, id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        let state = self.read().await?;
        Ok(state.find(id).cloned())
    }

    pub async fn summary(&self) -> Result<HistorySummary, StoreError> {
        Ok(self.read().await?.summary())
    }
}
