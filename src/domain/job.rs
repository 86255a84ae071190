use std::{collections::VecDeque, time::Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{filter::QualityThresholds, pagination::PaginationMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Quoted term only.
    #[default]
    Literal,
    /// Quoted term followed by the unquoted term.
    LiteralAndBroad,
}

/// Everything a caller chooses when starting a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlParameters {
    pub region: String,
    #[serde(default)]
    pub search_term: Option<String>,
    /// Category bundle key, used instead of `search_term` when present.
    #[serde(default)]
    pub category: Option<String>,
    pub target: u64,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub include_translation: bool,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub sub_regions: Vec<String>,
    #[serde(default)]
    pub pagination: PaginationMode,
    #[serde(default)]
    pub min_weight: u64,
}

impl CrawlParameters {
    pub fn validate(mut self) -> Result<Self, String> {
        self.region = self.region.trim().to_lowercase();
        self.search_term = self
            .search_term
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self.category = self
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        if self.region.is_empty() {
            return Err("A region is required.".to_string());
        }
        if self.search_term.is_none() && self.category.is_none() {
            return Err("Either a search term or a category is required.".to_string());
        }
        if self.target == 0 {
            return Err("The target must be at least 1.".to_string());
        }
        if self.thresholds.min_rating.is_nan() || self.thresholds.min_rating < 0.0 {
            return Err("The minimum rating must be a non-negative number.".to_string());
        }
        Ok(self)
    }

    /// Label used for history entries and export names.
    pub fn subject(&self) -> &str {
        self.category
            .as_deref()
            .or(self.search_term.as_deref())
            .unwrap_or_default()
    }

    /// The job id suffix keeps two jobs started in the same second apart.
    pub fn export_filename(&self, timestamp: i64, job_id: &Uuid) -> String {
        let safe_subject: String = self
            .subject()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let short_id = &job_id.simple().to_string()[..8];
        format!(
            "{}_{}_{}_{}.csv",
            safe_subject, self.region, timestamp, short_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    LimitReached,
    Stopped,
    Failed,
}

impl JobState {
    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running)
    }
}

/// How a crawl that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed,
    LimitReached,
    Stopped,
}

impl From<CrawlOutcome> for JobState {
    fn from(value: CrawlOutcome) -> Self {
        match value {
            CrawlOutcome::Completed => JobState::Completed,
            CrawlOutcome::LimitReached => JobState::LimitReached,
            CrawlOutcome::Stopped => JobState::Stopped,
        }
    }
}

/// The single status record shared between the crawl worker and pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: Option<Uuid>,
    pub state: JobState,
    pub is_running: bool,
    pub status_message: String,
    pub current_location: String,
    pub total_leads: u64,
    pub skipped: u64,
    /// Records discarded for lacking an identifier.
    pub dropped: u64,
    pub target: u64,
    pub new_logs: VecDeque<String>,
    pub current_filename: String,
    pub work_units_total: usize,
    pub work_units_done: usize,
    pub elapsed_secs: f64,
    pub leads_per_sec: f64,
    pub remaining_locations: usize,
    pub eta_secs: Option<f64>,
    #[serde(skip)]
    started_at: Option<Instant>,
    #[serde(skip)]
    max_pending_logs: usize,
}

impl JobStatus {
    pub fn idle(max_pending_logs: usize) -> Self {
        JobStatus {
            job_id: None,
            state: JobState::Idle,
            is_running: false,
            status_message: "Idle".to_string(),
            current_location: String::new(),
            total_leads: 0,
            skipped: 0,
            dropped: 0,
            target: 0,
            new_logs: VecDeque::new(),
            current_filename: String::new(),
            work_units_total: 0,
            work_units_done: 0,
            elapsed_secs: 0.0,
            leads_per_sec: 0.0,
            remaining_locations: 0,
            eta_secs: None,
            started_at: None,
            max_pending_logs: max_pending_logs.max(1),
        }
    }

    pub fn starting(
        job_id: Uuid,
        params: &CrawlParameters,
        filename: &str,
        max_pending_logs: usize,
    ) -> Self {
        JobStatus {
            job_id: Some(job_id),
            state: JobState::Running,
            is_running: true,
            status_message: format!(
                "Starting crawl for '{}' in {}...",
                params.subject(),
                params.region.to_uppercase()
            ),
            target: params.target,
            current_filename: filename.to_string(),
            started_at: Some(Instant::now()),
            ..JobStatus::idle(max_pending_logs)
        }
    }

    pub fn push_log(&mut self, line: String) {
        if self.new_logs.len() >= self.max_pending_logs {
            self.new_logs.pop_front();
        }
        self.new_logs.push_back(line);
    }

    /// Copy for a poller; pending log lines are handed out only once.
    pub fn take_snapshot(&mut self) -> JobStatus {
        self.refresh_elapsed();
        let snapshot = self.clone();
        self.new_logs.clear();
        snapshot
    }

    pub fn set_plan(&mut self, work_units_total: usize) {
        self.work_units_total = work_units_total;
        self.remaining_locations = work_units_total;
    }

    pub fn begin_location(&mut self, label: &str) {
        self.current_location = label.to_string();
    }

    pub fn finish_location(&mut self) {
        self.work_units_done += 1;
        self.remaining_locations = self.work_units_total.saturating_sub(self.work_units_done);
        self.refresh_elapsed();
        self.recompute_eta();
    }

    pub fn finish(&mut self, state: JobState, message: String) {
        self.refresh_elapsed();
        self.state = state;
        self.is_running = false;
        self.status_message = message;
        self.current_location = "Done".to_string();
        self.eta_secs = None;
    }

    fn refresh_elapsed(&mut self) {
        if let (Some(started_at), true) = (self.started_at, self.is_running) {
            self.elapsed_secs = started_at.elapsed().as_secs_f64();
        }
        self.leads_per_sec = match self.elapsed_secs > 0.0 {
            true => self.total_leads as f64 / self.elapsed_secs,
            false => 0.0,
        };
    }

    fn recompute_eta(&mut self) {
        self.eta_secs = match (self.work_units_done, self.leads_per_sec > 0.0) {
            (0, _) | (_, false) => None,
            (done, true) => {
                let per_location = self.total_leads as f64 / done as f64;
                Some(self.remaining_locations as f64 * per_location / self.leads_per_sec)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use uuid::Uuid;

    use super::{CrawlParameters, JobState, JobStatus, MatchMode};
    use crate::domain::{filter::QualityThresholds, pagination::PaginationMode};

    fn params() -> CrawlParameters {
        CrawlParameters {
            region: " DE ".to_string(),
            search_term: Some(" Marketing Agency ".to_string()),
            category: None,
            target: 10,
            match_mode: MatchMode::Literal,
            include_translation: false,
            thresholds: QualityThresholds::default(),
            sub_regions: vec![],
            pagination: PaginationMode::Adaptive,
            min_weight: 0,
        }
    }

    #[test]
    fn validate_normalizes_and_rejects() {
        let valid = params().validate().unwrap();
        assert_eq!(valid.region, "de");
        assert_eq!(valid.subject(), "Marketing Agency");

        let mut zero_target = params();
        zero_target.target = 0;
        assert!(zero_target.validate().is_err());

        let mut no_subject = params();
        no_subject.search_term = Some("   ".to_string());
        assert!(no_subject.validate().is_err());
    }

    #[test]
    fn export_filename_is_sanitized() {
        let valid = params().validate().unwrap();
        let job_id = Uuid::parse_str("3f2a9c1e-0b7d-4e58-9a61-2c4d8e0f1b23").unwrap();
        assert_eq!(
            valid.export_filename(1_698_345, &job_id),
            "Marketing_Agency_de_1698345_3f2a9c1e.csv"
        );
    }

    #[test]
    fn jobs_in_the_same_second_get_distinct_exports() {
        let valid = params().validate().unwrap();
        let first = valid.export_filename(1_698_345, &Uuid::new_v4());
        let second = valid.export_filename(1_698_345, &Uuid::new_v4());

        assert_ne!(first, second);
        assert!(first.starts_with("Marketing_Agency_de_1698345_"));
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let params: CrawlParameters =
            serde_json::from_str(r#"{"region": "de", "category": "legal", "target": 3}"#).unwrap();

        assert_eq!(params.match_mode, MatchMode::Literal);
        assert_eq!(params.pagination, PaginationMode::Adaptive);
        assert_eq!(params.thresholds, QualityThresholds::default());
        assert_eq!(params.subject(), "legal");
    }

    #[test]
    fn snapshot_hands_out_logs_once() {
        let mut status = JobStatus::starting(Uuid::new_v4(), &params(), "f.csv", 10);
        status.push_log("Bäckerei Schmitz (Köln)".to_string());

        let first = status.take_snapshot();
        let second = status.take_snapshot();

        assert_eq!(first.new_logs.len(), 1);
        assert!(second.new_logs.is_empty());
        assert!(second.is_running);
    }

    #[test]
    fn pending_logs_are_bounded() {
        let mut status = JobStatus::idle(3);
        for i in 0..5 {
            status.push_log(format!("line {}", i));
        }

        let logs: Vec<String> = status.take_snapshot().new_logs.into_iter().collect();
        assert_eq!(logs, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn eta_undefined_before_first_location() {
        let mut status = JobStatus::starting(Uuid::new_v4(), &params(), "f.csv", 10);
        status.set_plan(4);

        assert_eq!(status.take_snapshot().eta_secs, None);
        assert_eq!(status.remaining_locations, 4);

        status.finish_location();
        assert_eq!(status.remaining_locations, 3);
    }

    #[test]
    fn rate_and_eta_follow_progress() {
        let mut status = JobStatus::starting(Uuid::new_v4(), &params(), "f.csv", 10);
        status.started_at = Instant::now().checked_sub(Duration::from_secs(10));
        status.set_plan(5);
        status.total_leads = 20;

        status.finish_location();

        // 20 leads in ~10s, 4 locations left at 20 leads each.
        assert_eq!(status.remaining_locations, 4);
        assert!((status.elapsed_secs - 10.0).abs() < 0.5);
        assert!((status.leads_per_sec - 2.0).abs() < 0.1);
        let eta = status.eta_secs.unwrap();
        assert!((eta - 40.0).abs() < 2.0, "eta was {}", eta);

        status.finish(JobState::Completed, "Done.".to_string());
        assert_eq!(status.eta_secs, None);
    }

    #[test]
    fn finish_clears_running_flag() {
        let mut status = JobStatus::starting(Uuid::new_v4(), &params(), "f.csv", 10);
        status.finish(JobState::LimitReached, "Limit reached.".to_string());

        assert!(!status.is_running);
        assert_eq!(status.state, JobState::LimitReached);
        assert_eq!(status.current_location, "Done");
    }
}
