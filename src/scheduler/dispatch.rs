use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditLevel, AuditLog};
use crate::config::SchedulerConfig;
use crate::engine::{adapter, InferenceEngine, InferenceRequest};
use crate::registry::ModelRegistry;
use crate::scheduler::pool::GpuPool;
use crate::scheduler::queue::WaitQueue;
use crate::scheduler::store::JobStore;

/// Shared state handed to the dispatch loop.
#[derive(Clone)]
pub(crate) struct DispatchContext {
    pub config: SchedulerConfig,
    pub store: Arc<RwLock<JobStore>>,
    pub queue: Arc<Mutex<WaitQueue>>,
    pub pool: Arc<GpuPool>,
    pub registry: Arc<dyn ModelRegistry>,
    pub engine: Arc<dyn InferenceEngine>,
    pub audit: Arc<AuditLog>,
}

/// Long-lived dispatch loop.
///
/// Runs one pairing pass per poll interval and prunes expired terminal
/// records. The loop itself never blocks on inference; every started job
/// runs on its own task. Exits when the shutdown token is cancelled.
pub(crate) async fn run(ctx: DispatchContext, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(ctx.config.poll_interval());
    tracing::info!(
        gpus = ctx.pool.ids().len(),
        poll_interval_ms = ctx.config.poll_interval_ms,
        "Dispatch loop started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Dispatch loop stopping");
                break;
            }
            _ = interval.tick() => {
                dispatch_pass(&ctx);

                let pruned = ctx
                    .store
                    .write()
                    .unwrap()
                    .prune_finished(ctx.config.retention(), Utc::now());
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned expired job records");
                }
            }
        }
    }
}

/// One pairing pass: walk the queue in order, stepping over jobs whose model
/// is still loading, until the pool runs out of free GPUs.
fn dispatch_pass(ctx: &DispatchContext) {
    let candidates = ctx.queue.lock().unwrap().snapshot();

    for job_id in candidates {
        let snapshot = {
            let store = ctx.store.read().unwrap();
            store
                .get(&job_id)
                .map(|job| (job.model.clone(), job.input.clone(), job.options.clone()))
        };
        let Some((model, input, options)) = snapshot else {
            // Record vanished under us; drop the stale queue entry.
            ctx.queue.lock().unwrap().remove(job_id);
            continue;
        };

        if !ctx.registry.is_ready(&model) {
            if ctx.registry.is_loading(&model) {
                // Stepped over; keeps its queue position for the next pass.
                continue;
            }
            // Neither ready nor loading: this model will never become
            // available, so surface the failure on the record now.
            if ctx.queue.lock().unwrap().remove(job_id) {
                ctx.store.write().unwrap().fail(
                    &job_id,
                    format!("Model {model} is not available"),
                    Utc::now(),
                );
                tracing::warn!(job_id = %job_id, model = %model, "Dropped job with unavailable model");
                ctx.audit.record(
                    AuditLevel::Error,
                    format!("Job {job_id} failed: model {model} is not available"),
                );
            }
            continue;
        }

        let Some(gpu_id) = ctx.pool.try_acquire(job_id) else {
            // Every GPU is occupied; later entries cannot do better this pass.
            break;
        };

        if !ctx.queue.lock().unwrap().remove(job_id) {
            // Lost the race against a cancellation; hand the GPU back.
            ctx.pool.release(gpu_id);
            continue;
        }

        if !ctx
            .store
            .write()
            .unwrap()
            .mark_running(&job_id, gpu_id, Utc::now())
        {
            ctx.pool.release(gpu_id);
            continue;
        }

        tracing::info!(job_id = %job_id, gpu_id, model = %model, "Job started");
        ctx.audit.record(
            AuditLevel::Info,
            format!("Job {job_id} started on GPU {gpu_id} (model: {model})"),
        );

        let request = InferenceRequest {
            input,
            model,
            gpu_id,
            options,
        };
        tokio::spawn(adapter::execute(
            job_id,
            gpu_id,
            request,
            ctx.engine.clone(),
            ctx.store.clone(),
            ctx.pool.clone(),
            ctx.audit.clone(),
        ));
    }
}
