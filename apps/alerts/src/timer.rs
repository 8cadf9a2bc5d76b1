use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::monitor::Command;

/// Named recurring timer. Each firing delivers `Command::Alarm(name)`.
#[async_trait]
pub trait Timer: Send + Sync {
    /// First firing after `delay`, then every `period`.
    async fn create(&self, name: &str, delay: Duration, period: Duration) -> Result<()>;

    /// Returns true if a timer with that name existed.
    async fn clear(&self, name: &str) -> Result<bool>;
}

type Jobs = Arc<Mutex<HashMap<String, Vec<Uuid>>>>;

/// `Timer` on top of a `JobScheduler`: a one-shot job covers the initial
/// delay and, when it fires, installs the repeating job.
pub struct CronTimer {
    sched: JobScheduler,
    events: mpsc::Sender<Command>,
    jobs: Jobs,
}

impl CronTimer {
    pub fn new(sched: JobScheduler, events: mpsc::Sender<Command>) -> Self {
        Self {
            sched,
            events,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn deliver(events: &mpsc::Sender<Command>, name: &str) {
    // a full queue means cycles are backing up; drop this firing
    match events.try_send(Command::Alarm(name.to_string())) {
        Ok(()) => debug!(alarm = %name, "alarm fired"),
        Err(e) => warn!(alarm = %name, error = %e, "alarm dropped"),
    }
}

fn repeating(events: mpsc::Sender<Command>, name: String, period: Duration) -> Result<Job> {
    let job = Job::new_repeated_async(period, move |_uuid, _l| {
        deliver(&events, &name);
        Box::pin(async {})
    })?;
    Ok(job)
}

#[async_trait]
impl Timer for CronTimer {
    async fn create(&self, name: &str, delay: Duration, period: Duration) -> Result<()> {
        let events = self.events.clone();
        let jobs = Arc::clone(&self.jobs);
        let owner = name.to_string();

        let first = Job::new_one_shot_async(delay, move |uuid, sched| {
            let events = events.clone();
            let jobs = Arc::clone(&jobs);
            let name = owner.clone();

            Box::pin(async move {
                let mut jobs = jobs.lock().await;

                // cleared or re-created since this job was scheduled
                let Some(ids) = jobs.get_mut(&name).filter(|ids| ids.contains(&uuid)) else {
                    return;
                };

                deliver(&events, &name);

                match repeating(events, name.clone(), period) {
                    Ok(job) => match sched.add(job).await {
                        Ok(id) => ids.push(id),
                        Err(e) => error!(alarm = %name, error = ?e, "schedule repeating job failed"),
                    },
                    Err(e) => error!(alarm = %name, error = ?e, "build repeating job failed"),
                }
            })
        })?;

        // hold the lock across add so the one-shot cannot observe a missing entry
        let mut jobs = self.jobs.lock().await;
        let id = self.sched.add(first).await?;
        jobs.insert(name.to_string(), vec![id]);

        info!(alarm = %name, ?delay, ?period, "timer created");
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<bool> {
        let Some(ids) = self.jobs.lock().await.remove(name) else {
            return Ok(false);
        };

        for id in ids {
            // the one-shot job is gone once it has fired
            if let Err(e) = self.sched.remove(&id).await {
                debug!(alarm = %name, job = %id, error = ?e, "remove job failed");
            }
        }

        debug!(alarm = %name, "timer cleared");
        Ok(true)
    }
}
