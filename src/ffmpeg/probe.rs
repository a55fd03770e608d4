use std::path::Path;

use serde_json::Value;

use crate::error::{RehashError, Result, VideoError};

use super::runner::MediaRunner;

/// Stream facts for one media file, as reported by the prober
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration_secs: f64,

    /// Video width in pixels
    pub width: u32,

    /// Video height in pixels
    pub height: u32,

    /// Raw frame rate ratio, e.g. "30000/1001". Handed back to the encoder
    /// verbatim so rational rates survive the round trip.
    pub frame_rate: String,

    /// Video codec name
    pub video_codec: String,

    /// Whether the container carries at least one audio stream
    pub has_audio: bool,

    /// Number of container-level metadata tags
    pub tag_count: usize,
}

impl MediaInfo {
    /// Frame rate as a float, 0.0 when the ratio is degenerate
    pub fn fps(&self) -> f64 {
        match self.frame_rate.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().unwrap_or(0.0);
                let den: f64 = den.parse().unwrap_or(0.0);
                if den == 0.0 {
                    0.0
                } else {
                    num / den
                }
            }
            None => self.frame_rate.parse().unwrap_or(0.0),
        }
    }

    pub(crate) fn from_json(json: &str) -> std::result::Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("prober output was not JSON: {}", e))?;

        let streams = value
            .get("streams")
            .and_then(Value::as_array)
            .ok_or_else(|| "prober output listed no streams".to_string())?;

        let video = streams
            .iter()
            .find(|s| s.get("codec_type").and_then(Value::as_str) == Some("video"))
            .ok_or_else(|| "no video stream in container".to_string())?;

        let width = video.get("width").and_then(Value::as_u64).unwrap_or(0) as u32;
        let height = video.get("height").and_then(Value::as_u64).unwrap_or(0) as u32;
        if width == 0 || height == 0 {
            return Err("video stream has no dimensions".to_string());
        }

        let frame_rate = video
            .get("r_frame_rate")
            .and_then(Value::as_str)
            .unwrap_or("30/1")
            .to_string();

        let video_codec = video
            .get("codec_name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let has_audio = streams
            .iter()
            .any(|s| s.get("codec_type").and_then(Value::as_str) == Some("audio"));

        let format = value.get("format");

        let duration_secs = format
            .and_then(|f| f.get("duration"))
            .and_then(Value::as_str)
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| "container reports no duration".to_string())?;

        let tag_count = format
            .and_then(|f| f.get("tags"))
            .and_then(Value::as_object)
            .map(|tags| tags.len())
            .unwrap_or(0);

        Ok(Self {
            duration_secs,
            width,
            height,
            frame_rate,
            video_codec,
            has_audio,
            tag_count,
        })
    }
}

/// Probe a media file's streams and container format
pub fn probe(runner: &dyn MediaRunner, path: &Path) -> Result<MediaInfo> {
    let args: Vec<String> = [
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(path.display().to_string()))
    .collect();

    let out = runner
        .run_prober(&args)
        .map_err(|e| unreadable(path, format!("failed to launch prober: {}", e)))?;

    if !out.status.success() {
        return Err(unreadable(path, "prober exited with a non-zero status"));
    }

    let text = String::from_utf8_lossy(&out.stdout);
    MediaInfo::from_json(&text).map_err(|reason| unreadable(path, reason))
}

/// Container duration only, cheaper than a full probe
pub fn duration_of(runner: &dyn MediaRunner, path: &Path) -> Result<f64> {
    let args: Vec<String> = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(path.display().to_string()))
    .collect();

    let out = runner
        .run_prober(&args)
        .map_err(|e| unreadable(path, format!("failed to launch prober: {}", e)))?;

    if !out.status.success() {
        return Err(unreadable(path, "prober exited with a non-zero status"));
    }

    String::from_utf8_lossy(&out.stdout)
        .trim()
        .parse::<f64>()
        .map_err(|_| unreadable(path, "prober returned no parseable duration"))
}

fn unreadable<S: Into<String>>(path: &Path, reason: S) -> RehashError {
    VideoError::InputUnreadable {
        path: path.display().to_string(),
        reason: reason.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::runner::MockMediaRunner;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    const PROBE_FIXTURE: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1280,
                "height": 720,
                "r_frame_rate": "30000/1001"
            },
            {
                "codec_type": "audio",
                "codec_name": "aac",
                "sample_rate": "48000"
            }
        ],
        "format": {
            "duration": "6.040000",
            "tags": {
                "major_brand": "isom",
                "encoder": "Lavf59.27.100"
            }
        }
    }"#;

    #[test]
    fn test_parse_full_probe_output() {
        let info = MediaInfo::from_json(PROBE_FIXTURE).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.video_codec, "h264");
        assert!(info.has_audio);
        assert_eq!(info.tag_count, 2);
        assert!((info.duration_secs - 6.04).abs() < 1e-9);
        assert!((info.fps() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_video_only_container() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 640, "height": 480, "r_frame_rate": "25/1"}
            ],
            "format": {"duration": "3.0"}
        }"#;
        let info = MediaInfo::from_json(json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.tag_count, 0);
        assert_eq!(info.fps(), 25.0);
    }

    #[test]
    fn test_audio_only_container_rejected() {
        let json = r#"{
            "streams": [{"codec_type": "audio", "codec_name": "mp3"}],
            "format": {"duration": "3.0"}
        }"#;
        let err = MediaInfo::from_json(json).unwrap_err();
        assert!(err.contains("no video stream"));
    }

    #[test]
    fn test_garbage_output_rejected() {
        assert!(MediaInfo::from_json("not json at all").is_err());
    }

    #[test]
    fn test_probe_maps_failure_to_input_unreadable() {
        let mut runner = MockMediaRunner::new();
        runner.expect_run_prober().times(1).returning(|_| {
            Ok(Output {
                status: ExitStatus::from_raw(1),
                stdout: Vec::new(),
                stderr: b"moov atom not found".to_vec(),
            })
        });

        let err = probe(&runner, Path::new("broken.mp4")).unwrap_err();
        assert!(matches!(
            err,
            RehashError::Video(VideoError::InputUnreadable { .. })
        ));
    }

    #[test]
    fn test_duration_of_parses_plain_value() {
        let mut runner = MockMediaRunner::new();
        runner.expect_run_prober().times(1).returning(|_| {
            Ok(Output {
                status: ExitStatus::from_raw(0),
                stdout: b"12.500000\n".to_vec(),
                stderr: Vec::new(),
            })
        });

        let secs = duration_of(&runner, Path::new("clip.mp4")).unwrap();
        assert!((secs - 12.5).abs() < 1e-9);
    }
}
