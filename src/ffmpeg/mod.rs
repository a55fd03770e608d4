//! # FFmpeg Integration
//!
//! Everything that touches the external `ffmpeg`/`ffprobe` binaries lives
//! here. Invocation goes through the [`MediaRunner`] trait so the rest of
//! the crate never spawns a process directly and tests can substitute a
//! mock. A non-zero exit code or a missing output file is always a hard
//! failure of the invoking step.

pub mod encoder;
pub mod probe;
pub mod runner;

pub use encoder::{bitrate_for_crf, VideoEncoder};
pub use probe::{duration_of, probe, MediaInfo};
pub use runner::{MediaRunner, SystemRunner};

pub(crate) use runner::{encode_to_file, run_encoder_checked};
