use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::browser::BrowserSessionManager;
use crate::config::{is_valid_cron, AppConfig};
use crate::rate_limiter::RateLimiter;

pub const RATE_LIMIT_SWEEP: &str = "rate_limit_sweep";
pub const BROWSER_REAPER: &str = "browser_reaper";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub name: String,
    pub cron_expression: String,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    /// Rate limit windows dropped or browser processes recycled, summed over runs.
    pub items_processed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_jobs: usize,
    pub total_runs: u64,
    pub uptime_seconds: u64,
}

type JobTable = Arc<RwLock<HashMap<String, JobInfo>>>;

/// Background housekeeping: expired rate-limit windows and stale idle
/// browser processes.
pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
    rate_limiter: Arc<RateLimiter>,
    sessions: Arc<BrowserSessionManager>,
    jobs: JobTable,
    start_time: DateTime<Utc>,
}

impl MaintenanceScheduler {
    pub async fn new(rate_limiter: Arc<RateLimiter>, sessions: Arc<BrowserSessionManager>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            rate_limiter,
            sessions,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            start_time: Utc::now(),
        })
    }

    /// Registers both housekeeping jobs from configuration.
    pub async fn schedule_defaults(&self, config: &AppConfig) -> Result<()> {
        self.schedule_rate_limit_sweep(&config.rate_limit.sweep_cron).await?;
        self.schedule_browser_reaper(&config.browser.reap_cron).await?;
        Ok(())
    }

    pub async fn start(&mut self) -> Result<()> {
        self.scheduler.start().await?;
        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Maintenance scheduler shutdown");
        Ok(())
    }

    pub async fn schedule_rate_limit_sweep(&self, cron: &str) -> Result<()> {
        let limiter = Arc::clone(&self.rate_limiter);
        let jobs = Arc::clone(&self.jobs);

        let job = Job::new_async(validated(cron)?, move |_uuid, _l| {
            let limiter = Arc::clone(&limiter);
            let jobs = Arc::clone(&jobs);
            Box::pin(async move {
                let removed = limiter.sweep_expired();
                record_run(&jobs, RATE_LIMIT_SWEEP, removed as u64).await;
            })
        })?;

        self.register(RATE_LIMIT_SWEEP, cron, job).await
    }

    pub async fn schedule_browser_reaper(&self, cron: &str) -> Result<()> {
        let sessions = Arc::clone(&self.sessions);
        let jobs = Arc::clone(&self.jobs);

        let job = Job::new_async(validated(cron)?, move |_uuid, _l| {
            let sessions = Arc::clone(&sessions);
            let jobs = Arc::clone(&jobs);
            Box::pin(async move {
                let recycled = sessions.recycle_if_idle().await;
                record_run(&jobs, BROWSER_REAPER, recycled as u64).await;
            })
        })?;

        self.register(BROWSER_REAPER, cron, job).await
    }

    /// Runs a job body immediately, outside its schedule.
    pub async fn run_now(&self, name: &str) -> Result<u64> {
        let processed = match name {
            RATE_LIMIT_SWEEP => self.rate_limiter.sweep_expired() as u64,
            BROWSER_REAPER => self.sessions.recycle_if_idle().await as u64,
            other => return Err(anyhow::anyhow!("Unknown maintenance job: {}", other)),
        };
        record_run(&self.jobs, name, processed).await;
        Ok(processed)
    }

    pub async fn get_job_info(&self, name: &str) -> Option<JobInfo> {
        self.jobs.read().await.get(name).cloned()
    }

    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let jobs = self.jobs.read().await;
        SchedulerStats {
            total_jobs: jobs.len(),
            total_runs: jobs.values().map(|j| j.run_count).sum(),
            uptime_seconds: (Utc::now() - self.start_time).num_seconds().max(0) as u64,
        }
    }

    async fn register(&self, name: &str, cron: &str, job: Job) -> Result<()> {
        let id = self.scheduler.add(job).await?;

        let info = JobInfo {
            id,
            name: name.to_string(),
            cron_expression: cron.to_string(),
            created_at: Utc::now(),
            last_run: None,
            run_count: 0,
            items_processed: 0,
        };

        if let Some(previous) = self.jobs.write().await.insert(name.to_string(), info) {
            self.scheduler.remove(&previous.id).await?;
        }

        tracing::info!(job = name, cron, "Scheduled maintenance job");
        Ok(())
    }
}

fn validated(cron: &str) -> Result<&str> {
    if is_valid_cron(cron) {
        Ok(cron)
    } else {
        Err(anyhow::anyhow!("Invalid cron expression: {}", cron))
    }
}

async fn record_run(jobs: &JobTable, name: &str, processed: u64) {
    let mut jobs = jobs.write().await;
    if let Some(info) = jobs.get_mut(name) {
        info.last_run = Some(Utc::now());
        info.run_count += 1;
        info.items_processed += processed;
    }
    tracing::debug!(job = name, processed, "Maintenance job ran");
}
