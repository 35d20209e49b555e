use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Telemetry reading for one GPU.
///
/// Observability only: the dispatch loop never consults telemetry when
/// pairing jobs with GPUs.
#[derive(Debug, Clone, Serialize)]
pub struct GpuSample {
    pub gpu_id: u32,
    pub name: String,
    pub memory_total_mb: u64,
    pub memory_used_mb: u64,
    /// Kernel utilization percent; `None` when the probe cannot report it.
    pub utilization_percent: Option<u8>,
}

/// Probe into per-GPU utilization and memory.
pub trait GpuTelemetry: Send + Sync + 'static {
    fn sample(&self, gpu_id: u32) -> Option<GpuSample>;
}

/// Probe that reports nothing. The default when no real probe is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl GpuTelemetry for NullTelemetry {
    fn sample(&self, _gpu_id: u32) -> Option<GpuSample> {
        None
    }
}

/// One recorded set of samples across the pool.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub at: DateTime<Utc>,
    pub gpus: Vec<GpuSample>,
}

/// Bounded history of telemetry recordings, oldest dropped first.
#[derive(Debug)]
pub struct TelemetryHistory {
    records: VecDeque<TelemetryRecord>,
    capacity: usize,
}

impl Default for TelemetryHistory {
    fn default() -> Self {
        // 48 hours of minute-granularity recordings.
        Self::with_capacity(48 * 60)
    }
}

impl TelemetryHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, gpus: Vec<GpuSample>) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(TelemetryRecord {
            at: Utc::now(),
            gpus,
        });
    }

    /// The most recent `limit` recordings in chronological order.
    pub fn recent(&self, limit: usize) -> Vec<TelemetryRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
