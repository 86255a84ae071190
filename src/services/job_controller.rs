use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    dal::history_log::HistoryLog,
    domain::{
        history::HistoryEntry,
        job::{CrawlOutcome, CrawlParameters, JobState, JobStatus},
    },
    services::crawler::{run_crawl, CrawlContext},
};

struct SharedJob {
    status: Mutex<JobStatus>,
    stop_requested: AtomicBool,
}

/// The worker's view of the job: progress updates and the stop flag.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<SharedJob>,
}

impl JobHandle {
    pub fn new(status: JobStatus) -> Self {
        JobHandle {
            shared: Arc::new(SharedJob {
                status: Mutex::new(status),
                stop_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Runs `f` under the status lock. Never hold the result across an await.
    pub fn update<T>(&self, f: impl FnOnce(&mut JobStatus) -> T) -> T {
        let mut status = self
            .shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut status)
    }

    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub filename: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Job already running.")]
    AlreadyRunning,
    #[error("{0}")]
    Invalid(String),
}

/// Owns the single crawl slot. At most one job runs at a time.
pub struct JobController {
    handle: JobHandle,
    ctx: Arc<CrawlContext>,
    history: Arc<HistoryLog>,
}

impl JobController {
    pub fn new(ctx: CrawlContext) -> Self {
        let history = HistoryLog::new(ctx.settings.history_file.clone());
        let idle = JobStatus::idle(ctx.settings.max_pending_logs);

        JobController {
            handle: JobHandle::new(idle),
            ctx: Arc::new(ctx),
            history: Arc::new(history),
        }
    }

    pub fn submit(&self, params: CrawlParameters) -> Result<JobTicket, SubmitError> {
        let params = params.validate().map_err(SubmitError::Invalid)?;
        let job_id = Uuid::new_v4();
        let filename = params.export_filename(Utc::now().timestamp(), &job_id);

        self.handle.update(|status| {
            if status.is_running {
                return Err(SubmitError::AlreadyRunning);
            }
            *status = JobStatus::starting(
                job_id,
                &params,
                &filename,
                self.ctx.settings.max_pending_logs,
            );
            self.handle.shared.stop_requested.store(false, Ordering::SeqCst);
            Ok(())
        })?;

        log::info!(
            "Starting job {} for '{}' in {} with target {}",
            job_id,
            params.subject(),
            params.region,
            params.target
        );

        tokio::spawn(run_job(
            params,
            self.ctx.settings.export_dir.join(&filename),
            self.ctx.clone(),
            self.handle.clone(),
            self.history.clone(),
        ));

        Ok(JobTicket { job_id, filename })
    }

    /// Cooperative: the worker notices at its next location or page.
    pub fn stop(&self) {
        self.handle.request_stop();
        self.handle.update(|status| {
            if status.is_running {
                status.push_log("Stop requested".to_string());
            }
        });
    }

    pub fn snapshot(&self) -> JobStatus {
        self.handle.update(|status| status.take_snapshot())
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.list()
    }

    pub fn categories(&self) -> Vec<String> {
        self.ctx
            .catalog
            .category_keys()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn export_dir(&self) -> PathBuf {
        self.ctx.settings.export_dir.clone()
    }
}

async fn run_job(
    params: CrawlParameters,
    export_path: PathBuf,
    ctx: Arc<CrawlContext>,
    handle: JobHandle,
    history: Arc<HistoryLog>,
) {
    // Run the crawl in its own task so a panic still ends the job.
    let worker = {
        let params = params.clone();
        let export_path = export_path.clone();
        let handle = handle.clone();
        tokio::spawn(async move { run_crawl(&params, &export_path, &ctx, &handle).await })
    };

    let (state, message) = match worker.await {
        Ok(Ok(outcome)) => (JobState::from(outcome), finish_message(outcome).to_string()),
        Ok(Err(e)) => {
            log::error!("Crawl for '{}' failed: {}", params.subject(), e);
            (JobState::Failed, format!("Error: {}", e))
        }
        Err(e) => {
            log::error!("Crawl worker for '{}' crashed: {:?}", params.subject(), e);
            (JobState::Failed, "Error: crawl worker crashed".to_string())
        }
    };

    let accepted = handle.update(|status| {
        status.push_log(message.clone());
        status.finish(state, message);
        status.total_leads
    });
    log::info!(
        "Job for '{}' ended as {:?} with {} leads",
        params.subject(),
        state,
        accepted
    );

    if !export_path.exists() {
        return;
    }
    let filename = export_path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let entry = HistoryEntry::new(
        Utc::now(),
        params.subject(),
        &params.region,
        params.target,
        accepted,
        state,
        &filename,
    );
    if let Err(e) = history.record(entry) {
        log::error!("Failed to record history for {}: {:?}", filename, e);
    }
}

fn finish_message(outcome: CrawlOutcome) -> &'static str {
    match outcome {
        CrawlOutcome::Completed => "Job finished.",
        CrawlOutcome::LimitReached => "Limit reached.",
        CrawlOutcome::Stopped => "Job stopped.",
    }
}
