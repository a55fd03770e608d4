//! # vid-rehash
//!
//! Give short videos a new byte-level fingerprint without visibly changing them.
//!
//! Every input runs through a fixed-order chain of optional transformations
//! (metadata strip, pixel noise, re-encode, silence padding, corner overlay).
//! Each step perturbs the file's bytes while leaving the rendered content
//! effectively untouched, and the final artifact lands in the output
//! directory under a fresh randomized name.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vid_rehash::{
//!     config::Config,
//!     pipeline::{Job, NullProgress, PipelineRunner},
//!     workspace::Workspace,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let workspace = Workspace::new(&config.paths);
//! workspace.prepare()?;
//!
//! let pipeline = PipelineRunner::new(config, workspace)?;
//! let job = Job::new("clip.mp4".into());
//!
//! match pipeline.run_job(&job, &NullProgress) {
//!     Ok(outcome) => println!("wrote {}", outcome.output.display()),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`pipeline`] - Job orchestration and terminal states
//! - [`steps`] - The five fingerprint-perturbing transformations
//! - [`ffmpeg`] - Encoder/prober process boundary and stream probing
//! - [`workspace`] - Staging, scratch and output areas; randomized naming
//! - [`batch`] - Input discovery and the bounded parallel worker pool
//! - [`verify`] - Post-run fingerprint and duration checks
//! - [`config`] - Configuration management
//!
//! All heavy lifting is delegated to the system `ffmpeg`/`ffprobe`
//! binaries; this crate never links codec libraries.
//!
//! ## Custom Steps
//!
//! Additional transformations implement the [`TransformStep`](steps::TransformStep) trait:
//!
//! ```rust,no_run
//! use vid_rehash::error::Result;
//! use vid_rehash::steps::{StepContext, StepKind, TransformStep};
//!
//! struct CopyStep;
//!
//! impl TransformStep for CopyStep {
//!     fn kind(&self) -> StepKind {
//!         StepKind::Overlay
//!     }
//!
//!     fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
//!         // Real steps build encoder arguments and hand them to ctx.runner
//!         std::fs::copy(ctx.input, ctx.output)?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod pipeline;
pub mod steps;
pub mod verify;
pub mod workspace;

// Re-export commonly used types for convenience
pub use crate::{
    batch::{discover_videos, BatchReport, BatchRunner},
    config::Config,
    error::{RehashError, Result},
    pipeline::{Job, JobFailure, JobOutcome, PipelineRunner},
    steps::{StepKind, TransformStep}, // Export the step trait
    workspace::Workspace,
};
