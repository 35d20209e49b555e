use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::scheduler::job::{Job, JobState, JobView, Transcript};

/// Record of every job ever submitted, keyed by id.
///
/// All state transitions go through the mutators below, which enforce the
/// lifecycle: `Queued → Running → Done | Error`, with `Queued → Error` only
/// for jobs whose model turns out to be unavailable before dispatch. A
/// transition request against any other state is refused, so a job can never
/// move backward and `finished_at` is stamped exactly once.
#[derive(Debug)]
pub struct JobStore {
    jobs: HashMap<Uuid, Job>,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            max_jobs,
        }
    }

    /// Add a new job record. Returns false if the table is at capacity.
    pub fn insert(&mut self, job: Job) -> bool {
        if self.jobs.len() >= self.max_jobs {
            return false;
        }
        self.jobs.insert(job.id, job);
        true
    }

    pub fn get(&self, id: &Uuid) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn view(&self, id: &Uuid) -> Option<JobView> {
        self.jobs.get(id).map(Job::view)
    }

    /// Transition `Queued → Running`: bind the GPU and stamp `started_at`.
    pub fn mark_running(&mut self, id: &Uuid, gpu_id: u32, now: DateTime<Utc>) -> bool {
        match self.jobs.get_mut(id) {
            Some(job) if job.state == JobState::Queued => {
                job.state = JobState::Running;
                job.gpu_id = Some(gpu_id);
                job.started_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Transition `Running → Done`: record the transcript, clear the GPU
    /// binding and stamp `finished_at`.
    pub fn complete(&mut self, id: &Uuid, transcript: Transcript, now: DateTime<Utc>) -> bool {
        match self.jobs.get_mut(id) {
            Some(job) if job.state == JobState::Running => {
                job.state = JobState::Done;
                job.gpu_id = None;
                job.result = Some(transcript);
                job.finished_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Transition to `Error` from `Running`, or from `Queued` when the model
    /// is discovered unavailable before dispatch (`started_at` stays unset on
    /// that path). Refused for terminal jobs, so a late failure report after
    /// normal completion cannot overwrite the outcome.
    pub fn fail(&mut self, id: &Uuid, error: impl Into<String>, now: DateTime<Utc>) -> bool {
        match self.jobs.get_mut(id) {
            Some(job) if !job.state.is_terminal() => {
                job.state = JobState::Error;
                job.gpu_id = None;
                job.error = Some(error.into());
                job.finished_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Delete a record outright. Used only for cancellation of queued jobs.
    pub fn remove(&mut self, id: &Uuid) -> Option<Job> {
        self.jobs.remove(id)
    }

    /// Snapshot views of every job in `state`, oldest first.
    pub fn views_in_state(&self, state: JobState) -> Vec<JobView> {
        let mut views: Vec<JobView> = self
            .jobs
            .values()
            .filter(|job| job.state == state)
            .map(Job::view)
            .collect();
        views.sort_by_key(|view| view.created_at);
        views
    }

    /// Terminal jobs that finished within `window` of `now`, newest first.
    /// A window too large to represent means no cutoff at all.
    pub fn history(&self, window: Duration, now: DateTime<Utc>) -> Vec<JobView> {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window));
        let mut views: Vec<JobView> = self
            .jobs
            .values()
            .filter(|job| {
                job.state.is_terminal()
                    && job
                        .finished_at
                        .is_some_and(|at| cutoff.map_or(true, |cutoff| at >= cutoff))
            })
            .map(Job::view)
            .collect();
        views.sort_by_key(|view| std::cmp::Reverse(view.finished_at));
        views
    }

    /// Drop terminal records older than the retention window. Returns the
    /// number of jobs pruned.
    pub fn prune_finished(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = match chrono::Duration::from_std(retention) {
            Ok(d) => now - d,
            Err(_) => return 0,
        };
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            !(job.state.is_terminal() && job.finished_at.is_some_and(|at| at < cutoff))
        });
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.max_jobs
    }
}
