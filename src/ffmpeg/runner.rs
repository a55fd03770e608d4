use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{Result, VideoError};

/// Process boundary for the external encoder and prober.
///
/// Steps build argument lists and hand them to this trait; the real
/// implementation spawns `ffmpeg`/`ffprobe`, the mocked one drives failure
/// paths in tests without any binary installed.
#[cfg_attr(test, mockall::automock)]
pub trait MediaRunner: Send + Sync {
    /// Run the encoder (ffmpeg) with the given arguments
    fn run_encoder(&self, args: &[String]) -> io::Result<Output>;

    /// Run the prober (ffprobe) with the given arguments
    fn run_prober(&self, args: &[String]) -> io::Result<Output>;
}

/// Real runner spawning the system ffmpeg/ffprobe binaries
pub struct SystemRunner {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }

    /// Use non-default binary names or paths
    pub fn with_binaries<S: Into<String>>(ffmpeg: S, ffprobe: S) -> Self {
        Self {
            ffmpeg_bin: ffmpeg.into(),
            ffprobe_bin: ffprobe.into(),
        }
    }

    /// Confirm the encoder binary launches at all. Checked once before any
    /// job runs so a missing install fails fast instead of per-job.
    pub fn ensure_available(&self) -> Result<()> {
        let status = Command::new(&self.ffmpeg_bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => Ok(()),
            Ok(s) => Err(VideoError::EncoderUnavailable {
                reason: format!("{} -version exited with {}", self.ffmpeg_bin, s),
            }
            .into()),
            Err(e) => Err(VideoError::EncoderUnavailable {
                reason: format!("failed to launch {}: {}", self.ffmpeg_bin, e),
            }
            .into()),
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaRunner for SystemRunner {
    fn run_encoder(&self, args: &[String]) -> io::Result<Output> {
        Command::new(&self.ffmpeg_bin).args(args).output()
    }

    fn run_prober(&self, args: &[String]) -> io::Result<Output> {
        Command::new(&self.ffprobe_bin).args(args).output()
    }
}

/// Run the encoder and enforce the step contract: a launch error, a
/// non-zero exit, or a missing/empty output file all fail the step.
pub(crate) fn encode_to_file(
    runner: &dyn MediaRunner,
    args: &[String],
    output: &Path,
) -> Result<()> {
    debug!("ffmpeg {}", args.join(" "));

    let out = match runner.run_encoder(args) {
        Ok(out) => out,
        Err(e) if e.kind() == io::ErrorKind::StorageFull => {
            return Err(VideoError::InsufficientSpace {
                path: output.display().to_string(),
            }
            .into());
        }
        Err(e) => {
            return Err(VideoError::EncodingFailed {
                reason: format!("failed to launch encoder: {}", e),
            }
            .into());
        }
    };

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        if stderr.contains("No space left on device") {
            return Err(VideoError::InsufficientSpace {
                path: output.display().to_string(),
            }
            .into());
        }
        return Err(VideoError::EncodingFailed {
            reason: stderr_tail(&stderr),
        }
        .into());
    }

    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(VideoError::EncodingFailed {
            reason: format!("encoder produced an empty file: {}", output.display()),
        }
        .into()),
        Err(_) => Err(VideoError::EncodingFailed {
            reason: format!("encoder produced no output: {}", output.display()),
        }
        .into()),
    }
}

/// Run the encoder where the output is a file pattern (frame extraction)
/// rather than a single path; enforces launch and exit checks only.
pub(crate) fn run_encoder_checked(
    runner: &dyn MediaRunner,
    args: &[String],
    at: &Path,
) -> Result<()> {
    debug!("ffmpeg {}", args.join(" "));

    let out = match runner.run_encoder(args) {
        Ok(out) => out,
        Err(e) if e.kind() == io::ErrorKind::StorageFull => {
            return Err(VideoError::InsufficientSpace {
                path: at.display().to_string(),
            }
            .into());
        }
        Err(e) => {
            return Err(VideoError::EncodingFailed {
                reason: format!("failed to launch encoder: {}", e),
            }
            .into());
        }
    };

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        if stderr.contains("No space left on device") {
            return Err(VideoError::InsufficientSpace {
                path: at.display().to_string(),
            }
            .into());
        }
        return Err(VideoError::EncodingFailed {
            reason: stderr_tail(&stderr),
        }
        .into());
    }

    Ok(())
}

/// Last few stderr lines; the full encoder spew is unhelpful in an error value
fn stderr_tail(stderr: &str) -> String {
    let mut lines: Vec<&str> = stderr.lines().rev().take(8).collect();
    lines.reverse();
    let tail = lines.join("\n").trim().to_string();
    if tail.is_empty() {
        "encoder exited with a non-zero status".to_string()
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RehashError;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::tempdir;

    fn fake_output(stdout: &str, stderr: &str, success: bool) -> io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1)
            },
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        })
    }

    #[test]
    fn test_encode_to_file_success() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.mp4");
        let written = out_path.clone();

        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(move |_| {
                std::fs::write(&written, b"video bytes").unwrap();
                fake_output("", "", true)
            });

        let args = vec!["-i".to_string(), "in.mp4".to_string()];
        assert!(encode_to_file(&runner, &args, &out_path).is_ok());
    }

    #[test]
    fn test_nonzero_exit_is_encoding_failure() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.mp4");

        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(|_| fake_output("", "Invalid data found when processing input", false));

        let err = encode_to_file(&runner, &[], &out_path).unwrap_err();
        match err {
            RehashError::Video(VideoError::EncodingFailed { reason }) => {
                assert!(reason.contains("Invalid data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_success_without_output_file_fails() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("never_written.mp4");

        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(|_| fake_output("", "", true));

        let err = encode_to_file(&runner, &[], &out_path).unwrap_err();
        match err {
            RehashError::Video(VideoError::EncodingFailed { reason }) => {
                assert!(reason.contains("no output"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_enospc_stderr_classified_as_insufficient_space() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.mp4");

        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(|_| fake_output("", "av_interleaved_write_frame(): No space left on device", false));

        let err = encode_to_file(&runner, &[], &out_path).unwrap_err();
        assert!(matches!(
            err,
            RehashError::Video(VideoError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn test_launch_error_reported() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.mp4");

        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "ffmpeg not found")));

        let err = encode_to_file(&runner, &[], &out_path).unwrap_err();
        match err {
            RehashError::Video(VideoError::EncodingFailed { reason }) => {
                assert!(reason.contains("launch"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let long: String = (0..40).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&long);
        assert!(tail.contains("line 39"));
        assert!(!tail.contains("line 0\n"));
    }
}
