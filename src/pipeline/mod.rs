//! # Pipeline
//!
//! Job orchestration: each job walks the fixed-order step chain inside its
//! own scratch directory, then the final artifact is promoted into the
//! output area under a randomized name. Every job ends in exactly one
//! terminal state, [`JobOutcome`] or [`JobFailure`], and scratch space is
//! reclaimed at both.

pub mod job;
pub mod runner;

pub use job::{Job, JobFailure, JobOutcome, NullProgress, ProgressSink, ProgressUpdate};
pub use runner::PipelineRunner;
