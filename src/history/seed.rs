//! Example records written on first access when no history exists yet.

use chrono::{Duration, Utc};

use crate::history::record::{AnalysisRecord, IdentifiedIssue};

/// Build the seed history, newest first.
pub fn seed_history() -> Vec<AnalysisRecord> {
    let now = Utc::now();

    vec![
        AnalysisRecord {
            id: "seed-3".to_string(),
            timestamp: now - Duration::minutes(30),
            camera_id: Some("cam-02".to_string()),
            cattle_count: 8,
            health_score: 91,
            identified_issues: Vec::new(),
            recommendations: Vec::new(),
            raw_analysis: "Animals drinking water regularly.".to_string(),
        },
        AnalysisRecord {
            id: "seed-1".to_string(),
            timestamp: now - Duration::minutes(45),
            camera_id: Some("cam-01".to_string()),
            cattle_count: 15,
            health_score: 94,
            identified_issues: Vec::new(),
            recommendations: vec!["Keep current routine".to_string()],
            raw_analysis: "Herd grazing normally. No visual signs of stress.".to_string(),
        },
        AnalysisRecord {
            id: "seed-2".to_string(),
            timestamp: now - Duration::hours(4),
            camera_id: Some("cam-01".to_string()),
            cattle_count: 14,
            health_score: 88,
            identified_issues: vec![IdentifiedIssue {
                issue: "Mild agitation".to_string(),
                description: "One animal shows repetitive head movement and frequent \
                              walking without grazing."
                    .to_string(),
                possible_causes: vec![
                    "Mild heat stress".to_string(),
                    "Insect pressure".to_string(),
                    "Early physical discomfort".to_string(),
                ],
            }],
            recommendations: vec!["Watch the isolated animal".to_string()],
            raw_analysis: "Most of the herd is calm, but one animal moves excessively."
                .to_string(),
        },
    ]
}
