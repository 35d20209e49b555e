use std::path::PathBuf;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use gpu_dispatch::engine::EngineOptions;
use gpu_dispatch::scheduler::job::{Job, JobState, Transcript};
use gpu_dispatch::scheduler::store::JobStore;
use uuid::Uuid;

fn test_job(input: &str) -> Job {
    Job::new(PathBuf::from(input), "base", EngineOptions::default())
}

fn transcript(text: &str) -> Transcript {
    Transcript {
        text: text.to_string(),
        artifact: None,
    }
}

#[test]
fn test_job_creation() {
    let job = test_job("call.wav");
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.input, PathBuf::from("call.wav"));
    assert_eq!(job.model, "base");
    assert!(job.gpu_id.is_none());
    assert!(job.result.is_none());
    assert!(job.error.is_none());
    assert!(job.started_at.is_none());
    assert!(job.finished_at.is_none());
}

#[test]
fn test_store_insert_and_view() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;

    assert!(store.insert(job));
    assert_eq!(store.len(), 1);

    let view = store.view(&id).unwrap();
    assert_eq!(view.id, id);
    assert_eq!(view.state, JobState::Queued);

    assert!(store.view(&Uuid::new_v4()).is_none());
}

#[test]
fn test_running_transition_stamps_start_and_binds_gpu() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);

    let started = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    assert!(store.mark_running(&id, 1, started));

    let view = store.view(&id).unwrap();
    assert_eq!(view.state, JobState::Running);
    assert_eq!(view.gpu_id, Some(1));
    assert_eq!(view.started_at, Some(started));
    assert!(view.finished_at.is_none());

    // A running job cannot be started again.
    assert!(!store.mark_running(&id, 0, started));
}

#[test]
fn test_complete_records_result_and_clears_binding() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);

    let started = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let finished = Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap();
    store.mark_running(&id, 0, started);
    assert!(store.complete(&id, transcript("[00:00] hello"), finished));

    let view = store.view(&id).unwrap();
    assert_eq!(view.state, JobState::Done);
    assert_eq!(view.gpu_id, None);
    assert_eq!(view.result.unwrap().text, "[00:00] hello");
    assert!(view.error.is_none());
    assert_eq!(view.finished_at, Some(finished));
}

#[test]
fn test_fail_from_running() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);

    let now = Utc::now();
    store.mark_running(&id, 0, now);
    assert!(store.fail(&id, "engine exploded", now));

    let view = store.view(&id).unwrap();
    assert_eq!(view.state, JobState::Error);
    assert_eq!(view.error.as_deref(), Some("engine exploded"));
    assert!(view.result.is_none());
    assert_eq!(view.gpu_id, None);
    assert!(view.finished_at.is_some());
}

#[test]
fn test_fail_from_queued_leaves_started_unset() {
    // The model-never-became-available path fails a job before dispatch.
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);

    assert!(store.fail(&id, "Model base is not available", Utc::now()));

    let view = store.view(&id).unwrap();
    assert_eq!(view.state, JobState::Error);
    assert!(view.started_at.is_none());
    assert!(view.finished_at.is_some());
}

#[test]
fn test_no_backward_or_double_transitions() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);

    let now = Utc::now();

    // Completing a job that never ran is refused.
    assert!(!store.complete(&id, transcript("early"), now));

    store.mark_running(&id, 0, now);
    assert!(store.complete(&id, transcript("done"), now));

    // Terminal jobs accept no further transitions; a late failure report
    // cannot overwrite the recorded outcome.
    assert!(!store.fail(&id, "late failure", now));
    assert!(!store.mark_running(&id, 0, now));
    assert!(!store.complete(&id, transcript("again"), now));

    let view = store.view(&id).unwrap();
    assert_eq!(view.state, JobState::Done);
    assert_eq!(view.result.unwrap().text, "done");
    assert!(view.error.is_none());
}

#[test]
fn test_result_and_error_are_exclusive() {
    let mut store = JobStore::new(16);

    let done = test_job("done.wav");
    let done_id = done.id;
    store.insert(done);
    store.mark_running(&done_id, 0, Utc::now());
    store.complete(&done_id, transcript("ok"), Utc::now());

    let failed = test_job("failed.wav");
    let failed_id = failed.id;
    store.insert(failed);
    store.mark_running(&failed_id, 1, Utc::now());
    store.fail(&failed_id, "broken", Utc::now());

    let done_view = store.view(&done_id).unwrap();
    assert!(done_view.result.is_some() && done_view.error.is_none());

    let failed_view = store.view(&failed_id).unwrap();
    assert!(failed_view.error.is_some() && failed_view.result.is_none());
}

#[test]
fn test_views_in_state_sorted_by_creation() {
    let mut store = JobStore::new(16);

    let mut first = test_job("first.wav");
    first.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
    let mut second = test_job("second.wav");
    second.created_at = Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap();
    let first_id = first.id;
    let second_id = second.id;

    // Insert out of order; listing is by creation time.
    store.insert(second);
    store.insert(first);

    let queued = store.views_in_state(JobState::Queued);
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].id, first_id);
    assert_eq!(queued[1].id, second_id);
    assert!(store.views_in_state(JobState::Running).is_empty());
}

#[test]
fn test_history_window_and_order() {
    let mut store = JobStore::new(16);
    let now = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();

    let old = test_job("old.wav");
    let old_id = old.id;
    store.insert(old);
    store.mark_running(&old_id, 0, now - chrono::Duration::hours(3));
    store.complete(&old_id, transcript("old"), now - chrono::Duration::hours(2));

    let recent = test_job("recent.wav");
    let recent_id = recent.id;
    store.insert(recent);
    store.mark_running(&recent_id, 0, now - chrono::Duration::minutes(10));
    store.fail(&recent_id, "late failure", now - chrono::Duration::minutes(5));

    let still_queued = test_job("queued.wav");
    store.insert(still_queued);

    // One-hour window only sees the recent job.
    let history = store.history(Duration::from_secs(3600), now);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, recent_id);

    // A wide window sees both, newest first.
    let history = store.history(Duration::from_secs(48 * 3600), now);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, recent_id);
    assert_eq!(history[1].id, old_id);
}

#[test]
fn test_prune_finished_respects_retention() {
    let mut store = JobStore::new(16);
    let now = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();

    let expired = test_job("expired.wav");
    let expired_id = expired.id;
    store.insert(expired);
    store.mark_running(&expired_id, 0, now - chrono::Duration::hours(50));
    store.complete(&expired_id, transcript("gone"), now - chrono::Duration::hours(49));

    let kept = test_job("kept.wav");
    let kept_id = kept.id;
    store.insert(kept);
    store.mark_running(&kept_id, 0, now - chrono::Duration::hours(1));
    store.complete(&kept_id, transcript("kept"), now - chrono::Duration::minutes(30));

    let running = test_job("running.wav");
    let running_id = running.id;
    store.insert(running);
    store.mark_running(&running_id, 1, now - chrono::Duration::hours(72));

    let pruned = store.prune_finished(Duration::from_secs(48 * 3600), now);
    assert_eq!(pruned, 1);
    assert!(store.view(&expired_id).is_none());
    assert!(store.view(&kept_id).is_some());
    // Non-terminal jobs are never pruned, however old.
    assert!(store.view(&running_id).is_some());
}

#[test]
fn test_store_capacity_limit() {
    let mut store = JobStore::new(2);

    assert!(store.insert(test_job("1.wav")));
    assert!(store.insert(test_job("2.wav")));
    assert!(store.is_full());
    assert!(!store.insert(test_job("3.wav")));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_remove_record() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);

    assert!(store.remove(&id).is_some());
    assert!(store.remove(&id).is_none());
    assert!(store.is_empty());
}

#[test]
fn test_job_view_serializes() {
    let mut store = JobStore::new(16);
    let job = test_job("a.wav");
    let id = job.id;
    store.insert(job);
    store.mark_running(&id, 2, Utc::now());

    let view = store.view(&id).unwrap();
    let value = serde_json::to_value(&view).expect("view should serialize");
    assert_eq!(value["state"], "Running");
    assert_eq!(value["gpu_id"], 2);
    assert_eq!(value["model"], "base");
}
