//! Analysis history persistence.
//!
//! A single JSON document holds every analysis record, newest first:
//! - [`HistoryStore`] owns the file and serialises all writes
//! - [`HistoryState`] is the in-memory snapshot callers mutate
//! - query, lookup and summary views live in `analytics`

mod analytics;
mod record;
mod seed;
mod store;

pub use analytics::{
    CRITICAL_SCORE, DEFAULT_PAGE_LIMIT, HistoryPage, HistoryQuery, HistorySummary,
};
pub use record::{AnalysisRecord, DEFAULT_SUMMARY, HistoryState, IdentifiedIssue};
pub use seed::seed_history;
pub use store::HistoryStore;

pub(crate) use record::{count_from_value, score_from_value};
