use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;

use crate::error::RehashError;
use crate::steps::StepKind;

/// Process-wide sequence component of job ids. A batch creates all of its
/// jobs inside one millisecond, so the timestamp alone cannot keep ids
/// unique.
static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

/// One pipeline run against a single input video
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique id; also names the job's scratch directory
    pub id: String,
    /// Path of the source video. Never modified by the pipeline.
    pub input: PathBuf,
}

impl Job {
    /// Creates a job with a fresh id. The sequence number keeps ids unique
    /// within the process no matter how quickly a batch creates them; the
    /// salt separates runs that share a scratch root.
    pub fn new(input: PathBuf) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = JOB_SEQ.fetch_add(1, Ordering::Relaxed);
        let salt: u16 = rand::thread_rng().gen_range(1000..10000);
        Self {
            id: format!("job_{}_{}_{}", millis, seq, salt),
            input,
        }
    }
}

/// Successful terminal state of a job
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: String,
    pub input: PathBuf,
    /// Final artifact in the output directory, under its randomized name
    pub output: PathBuf,
    /// Steps applied, in execution order
    pub applied: Vec<StepKind>,
    pub elapsed: Duration,
}

/// Failed terminal state of a job. `step` names the transformation that
/// failed; setup failures (unreadable input, scratch allocation) carry none.
#[derive(Debug)]
pub struct JobFailure {
    pub job_id: String,
    pub input: PathBuf,
    pub step: Option<StepKind>,
    pub error: RehashError,
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.step {
            Some(step) => write!(f, "{} failed at {}: {}", self.job_id, step, self.error),
            None => write!(f, "{} failed: {}", self.job_id, self.error),
        }
    }
}

/// Progress for one job, pushed as plain values
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub job_id: String,
    /// Step about to run
    pub step: StepKind,
    /// Zero-based position of that step in this job's chain
    pub step_index: usize,
    pub total_steps: usize,
    /// Percent of the chain completed before this step
    pub percent: f32,
}

/// Receives progress updates from running jobs
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Sink that discards every update
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VideoError;
    use std::collections::HashSet;

    #[test]
    fn test_job_ids_unique_in_a_tight_loop() {
        // A directory batch mints every id within one millisecond, so
        // uniqueness must not depend on the timestamp advancing.
        let ids: HashSet<String> = (0..2000)
            .map(|_| Job::new(PathBuf::from("a.mp4")).id)
            .collect();

        assert_eq!(ids.len(), 2000);
        assert!(ids.iter().all(|id| id.starts_with("job_")));
    }

    #[test]
    fn test_failure_display_names_the_step() {
        let failure = JobFailure {
            job_id: "job_1_0001".to_string(),
            input: PathBuf::from("clip.mp4"),
            step: Some(StepKind::Reencode),
            error: VideoError::EncodingFailed {
                reason: "boom".to_string(),
            }
            .into(),
        };

        let text = failure.to_string();
        assert!(text.contains("re-encode"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_setup_failure_display_has_no_step() {
        let failure = JobFailure {
            job_id: "job_1_0001".to_string(),
            input: PathBuf::from("clip.mp4"),
            step: None,
            error: VideoError::InputUnreadable {
                path: "clip.mp4".to_string(),
                reason: "missing".to_string(),
            }
            .into(),
        };

        assert!(failure.to_string().contains("job_1_0001 failed:"));
    }
}
