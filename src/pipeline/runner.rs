use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{RehashError, Result, VideoError};
use crate::ffmpeg::{MediaRunner, SystemRunner, VideoEncoder};
use crate::steps::{enabled_steps, StepContext, StepKind};
use crate::workspace::Workspace;

use super::job::{Job, JobFailure, JobOutcome, ProgressSink, ProgressUpdate};

/// Runs jobs through the fixed-order transformation chain.
///
/// Each step writes a fresh intermediate into the job's scratch directory
/// and the superseded one is removed, so at most two intermediates exist at
/// a time. The last intermediate is promoted into the output directory;
/// everything else is gone by the time `run_job` returns, success or not.
pub struct PipelineRunner {
    config: Config,
    workspace: Workspace,
    runner: Arc<dyn MediaRunner>,
    encoder: VideoEncoder,
}

impl PipelineRunner {
    /// Construct against the system ffmpeg/ffprobe binaries
    pub fn new(config: Config, workspace: Workspace) -> Result<Self> {
        let system = SystemRunner::new();
        system.ensure_available()?;
        Self::with_runner(config, workspace, Arc::new(system))
    }

    /// Construct against any runner; tests inject a mock here
    pub fn with_runner(
        config: Config,
        workspace: Workspace,
        runner: Arc<dyn MediaRunner>,
    ) -> Result<Self> {
        config.validate()?;

        let encoder = if config.encode.use_hardware {
            VideoEncoder::detect(runner.as_ref())
        } else {
            VideoEncoder::SoftwareX264
        };

        Ok(Self {
            config,
            workspace,
            runner,
            encoder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Steps the current configuration would run, for planning output
    pub fn planned_steps(&self) -> Vec<StepKind> {
        enabled_steps(&self.config, &self.encoder)
            .iter()
            .map(|step| step.kind())
            .collect()
    }

    /// Run one job to a terminal state.
    ///
    /// On success the output directory gains exactly one new file; on
    /// failure it is untouched. The job's scratch directory is removed
    /// either way.
    pub fn run_job(
        &self,
        job: &Job,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<JobOutcome, JobFailure> {
        let started = Instant::now();
        info!("{}: processing {}", job.id, job.input.display());

        if let Err(e) = self.check_input(job) {
            return Err(self.fail(job, None, e));
        }

        let scratch = match self.workspace.job_scratch(&job.id) {
            Ok(scratch) => scratch,
            Err(e) => return Err(self.fail(job, None, e)),
        };

        let steps = enabled_steps(&self.config, &self.encoder);
        let total = steps.len();

        let mut current: PathBuf = job.input.clone();
        let mut applied = Vec::with_capacity(total);

        for (index, step) in steps.iter().enumerate() {
            progress.on_progress(&ProgressUpdate {
                job_id: job.id.clone(),
                step: step.kind(),
                step_index: index,
                total_steps: total,
                percent: (index as f32 / total as f32) * 100.0,
            });
            debug!("{}: step {}/{} {}", job.id, index + 1, total, step.kind());

            let output = scratch.path().join(format!("step{}_{}.mp4", index + 1, job.id));
            let ctx = StepContext {
                runner: self.runner.as_ref(),
                config: &self.config,
                scratch: scratch.path(),
                input: &current,
                output: &output,
            };

            if let Err(e) = step.apply(&ctx) {
                return Err(self.fail(job, Some(step.kind()), e));
            }

            // The superseded intermediate is dead weight. The original
            // input is never ours to delete.
            if current != job.input {
                if let Err(e) = fs::remove_file(&current) {
                    warn!("{}: failed to remove intermediate: {}", job.id, e);
                }
            }
            current = output;
            applied.push(step.kind());
        }

        // With every step disabled the input is promoted as-is, and the
        // source must survive since it is the user's file
        let keep_source = current == job.input;
        let output = match self.workspace.promote(&current, keep_source) {
            Ok(path) => path,
            Err(e) => return Err(self.fail(job, None, e)),
        };

        let elapsed = started.elapsed();
        info!(
            "{}: done in {:.1}s -> {}",
            job.id,
            elapsed.as_secs_f64(),
            output.display()
        );

        Ok(JobOutcome {
            job_id: job.id.clone(),
            input: job.input.clone(),
            output,
            applied,
            elapsed,
        })
    }

    fn check_input(&self, job: &Job) -> Result<()> {
        let meta = fs::metadata(&job.input).map_err(|e| VideoError::InputUnreadable {
            path: job.input.display().to_string(),
            reason: e.to_string(),
        })?;

        if !meta.is_file() || meta.len() == 0 {
            return Err(VideoError::InputUnreadable {
                path: job.input.display().to_string(),
                reason: "not a regular non-empty file".to_string(),
            }
            .into());
        }

        let supported = job
            .input
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.config.batch.extensions.iter().any(|known| known == &ext)
            })
            .unwrap_or(false);
        if !supported {
            return Err(VideoError::InputUnreadable {
                path: job.input.display().to_string(),
                reason: "unsupported container extension".to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn fail(&self, job: &Job, step: Option<StepKind>, error: RehashError) -> JobFailure {
        match step {
            Some(step) => error!("{}: {} failed: {}", job.id, step, error),
            None => error!("{}: {}", job.id, error),
        }
        JobFailure {
            job_id: job.id.clone(),
            input: job.input.clone(),
            step,
            error,
        }
    }
}
