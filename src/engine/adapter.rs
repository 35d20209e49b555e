use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::task;
use uuid::Uuid;

use crate::audit::{AuditLevel, AuditLog};
use crate::engine::{InferenceEngine, InferenceRequest};
use crate::scheduler::pool::GpuPool;
use crate::scheduler::store::JobStore;
use crate::scheduler::Transcript;

/// Run one bound (job, GPU) pair to completion.
///
/// The engine call happens on a blocking thread. Whatever happens to it —
/// normal return, engine failure, a panic inside the engine, or this task
/// being torn down by the runtime — the guard below releases the GPU and
/// stamps the terminal state exactly once.
pub(crate) async fn execute(
    job_id: Uuid,
    gpu_id: u32,
    request: InferenceRequest,
    engine: Arc<dyn InferenceEngine>,
    store: Arc<RwLock<JobStore>>,
    pool: Arc<GpuPool>,
    audit: Arc<AuditLog>,
) {
    let guard = CompletionGuard {
        job_id,
        gpu_id,
        store,
        pool,
        audit,
        settled: false,
    };

    let outcome = task::spawn_blocking(move || engine.run(&request)).await;
    match outcome {
        Ok(Ok(transcript)) => guard.complete(transcript),
        Ok(Err(err)) => guard.fail(err.to_string()),
        Err(join_err) => guard.fail(format!("Execution aborted: {join_err}")),
    }
}

/// Guarantees the cleanup half of every execution: the GPU is released on
/// drop, and a job whose outcome was never recorded is failed so that
/// `finished_at` is still stamped.
struct CompletionGuard {
    job_id: Uuid,
    gpu_id: u32,
    store: Arc<RwLock<JobStore>>,
    pool: Arc<GpuPool>,
    audit: Arc<AuditLog>,
    settled: bool,
}

impl CompletionGuard {
    fn complete(mut self, transcript: Transcript) {
        self.store
            .write()
            .unwrap()
            .complete(&self.job_id, transcript, Utc::now());
        tracing::info!(job_id = %self.job_id, gpu_id = self.gpu_id, "Job finished");
        self.audit.record(
            AuditLevel::Info,
            format!("Job {} finished on GPU {}", self.job_id, self.gpu_id),
        );
        self.settled = true;
    }

    fn fail(mut self, message: String) {
        self.store
            .write()
            .unwrap()
            .fail(&self.job_id, &message, Utc::now());
        tracing::warn!(job_id = %self.job_id, gpu_id = self.gpu_id, error = %message, "Job failed");
        self.audit.record(
            AuditLevel::Error,
            format!("Job {} failed on GPU {}: {}", self.job_id, self.gpu_id, message),
        );
        self.settled = true;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.settled {
            // The execution unit was dropped before an outcome was recorded.
            let failed = self.store.write().unwrap().fail(
                &self.job_id,
                "Execution unit terminated before completion",
                Utc::now(),
            );
            if failed {
                tracing::warn!(job_id = %self.job_id, gpu_id = self.gpu_id, "Execution unit terminated before completion");
                self.audit.record(
                    AuditLevel::Error,
                    format!("Job {} aborted on GPU {}", self.job_id, self.gpu_id),
                );
            }
        }
        self.pool.release(self.gpu_id);
    }
}
