//! # Verify
//!
//! Post-run confirmation that a re-hashed output actually differs from its
//! input at the byte level, plus a duration comparison so container damage
//! shows up immediately instead of on playback.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::ffmpeg::{duration_of, MediaRunner};

const COMPARE_CHUNK: usize = 64 * 1024;

/// Result of comparing an output against its input
#[derive(Debug, Clone)]
pub struct VerifyReport {
    /// Byte-identical output means the fingerprint did not change
    pub identical: bool,
    pub input_duration: f64,
    pub output_duration: f64,
}

impl VerifyReport {
    /// Absolute duration drift in seconds. Silence padding legitimately
    /// extends the container, so the caller decides what drift is fine.
    pub fn duration_delta(&self) -> f64 {
        (self.output_duration - self.input_duration).abs()
    }

    pub fn within_tolerance(&self, tolerance_secs: f64) -> bool {
        self.duration_delta() <= tolerance_secs
    }
}

/// Probe both files and compare their bytes
pub fn verify_output(runner: &dyn MediaRunner, input: &Path, output: &Path) -> Result<VerifyReport> {
    Ok(VerifyReport {
        identical: files_identical(input, output)?,
        input_duration: duration_of(runner, input)?,
        output_duration: duration_of(runner, output)?,
    })
}

/// Chunked byte comparison. A length mismatch short-circuits; equal-length
/// files are streamed so a multi-hundred-megabyte video never loads whole.
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    if std::fs::metadata(a)?.len() != std::fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(File::open(a)?);
    let mut reader_b = BufReader::new(File::open(b)?);
    let mut buf_a = vec![0u8; COMPARE_CHUNK];
    let mut buf_b = vec![0u8; COMPARE_CHUNK];

    loop {
        let read_a = read_full(&mut reader_a, &mut buf_a)?;
        let read_b = read_full(&mut reader_b, &mut buf_b)?;

        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// Fill the buffer as far as the stream allows; plain `read` may return
/// short counts and misalign the two sides
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
