use std::time::Duration;

/// Configuration for the scheduler and its dispatch loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// GPU device ids managed by the pool. Fixed for the process lifetime.
    pub gpu_ids: Vec<u32>,
    /// Interval between dispatch passes in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of job records held at once (queued, running and
    /// retained terminal jobs combined).
    pub max_jobs: usize,
    /// How long terminal job records are retained before pruning, in seconds.
    pub retention_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            gpu_ids: vec![0],
            poll_interval_ms: 100,
            max_jobs: 10_000,
            retention_secs: 48 * 3600,
        }
    }
}

impl SchedulerConfig {
    /// Configuration for a pool of `count` GPUs with ids `0..count`.
    pub fn with_gpu_count(count: u32) -> Self {
        Self {
            gpu_ids: (0..count).collect(),
            ..Default::default()
        }
    }

    pub fn with_gpu_ids(mut self, ids: Vec<u32>) -> Self {
        self.gpu_ids = ids;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    pub fn with_retention_secs(mut self, secs: u64) -> Self {
        self.retention_secs = secs;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
