//! # Batch
//!
//! Input discovery and the bounded worker pool. Jobs run in parallel with
//! each other but strictly sequentially inside themselves; a failed or even
//! panicked job never takes a sibling down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::info;

use crate::error::{RehashError, Result};
use crate::pipeline::{Job, JobFailure, JobOutcome, PipelineRunner, ProgressSink};

/// Recursively collect video files under `root`, filtered by extension and
/// sorted for a deterministic processing order. `exclude` skips the output
/// directory when it nests inside the input tree, so already-processed
/// artifacts are never re-fed into the pipeline.
pub fn discover_videos(
    root: &Path,
    extensions: &[String],
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    if root.is_file() {
        if has_video_extension(root, extensions) {
            found.push(root.to_path_buf());
        }
        return Ok(found);
    }

    walk(root, extensions, exclude, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(
    dir: &Path,
    extensions: &[String],
    exclude: Option<&Path>,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if exclude.map(|excluded| path == excluded).unwrap_or(false) {
            continue;
        }

        if path.is_dir() {
            walk(&path, extensions, exclude, found)?;
        } else if has_video_extension(&path, extensions) {
            found.push(path);
        }
    }
    Ok(())
}

fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|known| known == &ext)
        })
        .unwrap_or(false)
}

/// Terminal state of a whole batch
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
    pub failures: Vec<JobFailure>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives a set of inputs through the pipeline on a bounded pool
pub struct BatchRunner {
    pipeline: Arc<PipelineRunner>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(pipeline: PipelineRunner, workers: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            workers: workers.max(1),
        }
    }

    /// Process every input to a terminal state and report both lists.
    ///
    /// Pipeline work is blocking (external encoder processes), so each job
    /// runs on the blocking pool while a semaphore caps how many run at
    /// once.
    pub async fn run(&self, inputs: Vec<PathBuf>, progress: Arc<dyn ProgressSink>) -> BatchReport {
        let started = Instant::now();
        info!(
            "processing {} video(s) with {} worker(s)",
            inputs.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(inputs.len());

        for input in inputs {
            let job = Job::new(input);
            let identity = (job.id.clone(), job.input.clone());
            let pipeline = Arc::clone(&self.pipeline);
            let progress = Arc::clone(&progress);
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return Err(JobFailure {
                            job_id: job.id.clone(),
                            input: job.input.clone(),
                            step: None,
                            error: RehashError::pipeline(format!("worker pool closed: {}", e)),
                        });
                    }
                };

                let (job_id, input) = (job.id.clone(), job.input.clone());
                match tokio::task::spawn_blocking(move || {
                    pipeline.run_job(&job, progress.as_ref())
                })
                .await
                {
                    Ok(result) => result,
                    Err(e) => Err(JobFailure {
                        job_id,
                        input,
                        step: None,
                        error: RehashError::pipeline(format!("worker terminated: {}", e)),
                    }),
                }
            });

            handles.push((identity, handle));
        }

        let mut outcomes = Vec::new();
        let mut failures = Vec::new();

        for ((job_id, input), handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(failure)) => failures.push(failure),
                Err(e) => failures.push(JobFailure {
                    job_id,
                    input,
                    step: None,
                    error: RehashError::pipeline(format!("worker terminated: {}", e)),
                }),
            }
        }

        let elapsed = started.elapsed();
        info!(
            "batch finished: {} succeeded, {} failed in {:.1}s",
            outcomes.len(),
            failures.len(),
            elapsed.as_secs_f64()
        );

        BatchReport {
            outcomes,
            failures,
            elapsed,
        }
    }
}
