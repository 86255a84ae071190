use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub date: String,
    pub term: String,
    pub region: String,
    pub leads_requested: u64,
    pub leads_found: u64,
    pub outcome: JobState,
    pub filename: String,
}

impl HistoryEntry {
    pub fn new(
        finished_at: DateTime<Utc>,
        term: &str,
        region: &str,
        leads_requested: u64,
        leads_found: u64,
        outcome: JobState,
        filename: &str,
    ) -> Self {
        HistoryEntry {
            timestamp: finished_at.timestamp(),
            date: finished_at.format("%Y-%m-%d %H:%M").to_string(),
            term: term.to_string(),
            region: region.to_uppercase(),
            leads_requested,
            leads_found,
            outcome,
            filename: filename.to_string(),
        }
    }
}
