use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLevel, AuditLog};
use crate::config::SchedulerConfig;
use crate::engine::{EngineOptions, InferenceEngine};
use crate::error::{Result, SchedulerError};
use crate::registry::ModelRegistry;
use crate::scheduler::dispatch::{self, DispatchContext};
use crate::scheduler::job::{Job, JobState, JobView};
use crate::scheduler::pool::GpuPool;
use crate::scheduler::queue::WaitQueue;
use crate::scheduler::store::JobStore;
use crate::telemetry::{GpuSample, GpuTelemetry, NullTelemetry, TelemetryHistory, TelemetryRecord};

/// A submission: what to run, with which model, and how urgently.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Reference to the input payload, owned by the caller.
    pub input: PathBuf,
    pub model: String,
    /// Jump to the front of the wait queue.
    pub priority: bool,
    pub options: EngineOptions,
}

impl SubmitRequest {
    pub fn new(input: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            model: model.into(),
            priority: false,
            options: EngineOptions::default(),
        }
    }

    pub fn with_priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }
}

/// Occupancy and telemetry for one GPU, as reported by [`Scheduler::gpu_status`].
#[derive(Debug, Clone, Serialize)]
pub struct GpuStatus {
    pub gpu_id: u32,
    pub bound_job: Option<Uuid>,
    pub sample: Option<GpuSample>,
}

/// The scheduler facade.
///
/// Owns the job store, wait queue and GPU pool, and runs the dispatch loop
/// as a cancellable task. Submission and every status query return
/// immediately; only [`shutdown`](Scheduler::shutdown) awaits anything.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<RwLock<JobStore>>,
    queue: Arc<Mutex<WaitQueue>>,
    pool: Arc<GpuPool>,
    registry: Arc<dyn ModelRegistry>,
    engine: Arc<dyn InferenceEngine>,
    telemetry: Arc<dyn GpuTelemetry>,
    telemetry_history: Mutex<TelemetryHistory>,
    audit: Arc<AuditLog>,
    shutdown: CancellationToken,
    dispatch_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<dyn InferenceEngine>,
        registry: Arc<dyn ModelRegistry>,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(JobStore::new(config.max_jobs))),
            queue: Arc::new(Mutex::new(WaitQueue::new())),
            pool: Arc::new(GpuPool::new(config.gpu_ids.iter().copied())),
            registry,
            engine,
            telemetry: Arc::new(NullTelemetry),
            telemetry_history: Mutex::new(TelemetryHistory::default()),
            audit: Arc::new(AuditLog::default()),
            shutdown: CancellationToken::new(),
            dispatch_handle: Mutex::new(None),
            config,
        }
    }

    pub fn with_telemetry(mut self, probe: Arc<dyn GpuTelemetry>) -> Self {
        self.telemetry = probe;
        self
    }

    /// Spawn the dispatch loop. Calling `start` again is a no-op.
    pub fn start(&self) {
        let mut handle = self.dispatch_handle.lock().unwrap();
        if handle.is_some() {
            return;
        }
        let ctx = DispatchContext {
            config: self.config.clone(),
            store: self.store.clone(),
            queue: self.queue.clone(),
            pool: self.pool.clone(),
            registry: self.registry.clone(),
            engine: self.engine.clone(),
            audit: self.audit.clone(),
        };
        *handle = Some(tokio::spawn(dispatch::run(ctx, self.shutdown.clone())));
    }

    /// Signal the dispatch loop to stop and join it. In-flight executions
    /// finish on their own tasks and still release their GPUs.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.dispatch_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "Dispatch loop ended abnormally");
            }
        }
    }

    /// Queue a job. Returns immediately; the job runs once the dispatch loop
    /// pairs it with a free GPU. A model the registry knows nothing about is
    /// rejected here; a model that is still loading is accepted and waits.
    pub fn submit(&self, request: SubmitRequest) -> Result<Uuid> {
        if !self.registry.is_ready(&request.model) && !self.registry.is_loading(&request.model) {
            return Err(SchedulerError::UnknownModel(request.model));
        }

        let job = Job::new(request.input, request.model, request.options);
        let id = job.id;
        let model = job.model.clone();
        {
            let mut store = self.store.write().unwrap();
            if !store.insert(job) {
                return Err(SchedulerError::CapacityExhausted(self.config.max_jobs));
            }
        }
        self.queue.lock().unwrap().enqueue(id, request.priority);

        tracing::info!(job_id = %id, model = %model, priority = request.priority, "Job submitted");
        self.audit
            .record(AuditLevel::Info, format!("Job {id} queued (model: {model})"));
        Ok(id)
    }

    pub fn job(&self, id: Uuid) -> Result<JobView> {
        self.store
            .read()
            .unwrap()
            .view(&id)
            .ok_or(SchedulerError::JobNotFound(id))
    }

    /// Jobs awaiting a GPU, in queue order.
    pub fn list_queued(&self) -> Vec<JobView> {
        let ids = self.queue.lock().unwrap().snapshot();
        let store = self.store.read().unwrap();
        ids.iter().filter_map(|id| store.view(id)).collect()
    }

    pub fn list_running(&self) -> Vec<JobView> {
        self.store.read().unwrap().views_in_state(JobState::Running)
    }

    /// Terminal jobs that finished within `window`, newest first.
    pub fn list_history(&self, window: Duration) -> Vec<JobView> {
        self.store.read().unwrap().history(window, Utc::now())
    }

    /// Cancel a still-queued job. Returns true only if the job was removed
    /// before it started; a running or finished job is left untouched.
    pub fn cancel(&self, id: Uuid) -> bool {
        if !self.queue.lock().unwrap().remove(id) {
            return false;
        }
        self.store.write().unwrap().remove(&id);
        tracing::info!(job_id = %id, "Job cancelled");
        self.audit
            .record(AuditLevel::Info, format!("Job {id} cancelled"));
        true
    }

    /// Occupancy plus a fresh telemetry sample for every GPU in the pool.
    /// Samples are also appended to the bounded telemetry history.
    pub fn gpu_status(&self) -> Vec<GpuStatus> {
        let statuses: Vec<GpuStatus> = self
            .pool
            .bindings()
            .into_iter()
            .map(|binding| GpuStatus {
                gpu_id: binding.gpu_id,
                bound_job: binding.bound_job,
                sample: self.telemetry.sample(binding.gpu_id),
            })
            .collect();

        let samples: Vec<GpuSample> = statuses
            .iter()
            .filter_map(|status| status.sample.clone())
            .collect();
        if !samples.is_empty() {
            self.telemetry_history.lock().unwrap().push(samples);
        }
        statuses
    }

    /// The most recent telemetry recordings, oldest first.
    pub fn telemetry_history(&self, limit: usize) -> Vec<TelemetryRecord> {
        self.telemetry_history.lock().unwrap().recent(limit)
    }

    /// The most recent audit entries, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit)
    }
}
