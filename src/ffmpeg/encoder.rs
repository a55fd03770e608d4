use tracing::{debug, warn};

use super::runner::MediaRunner;

/// Video encoder selected for the re-encode step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEncoder {
    /// libx264 software encode with CRF rate control
    SoftwareX264,

    /// Platform hardware encoder with bitrate rate control
    Hardware(String),
}

impl VideoEncoder {
    /// Scan the encoder listing for a usable hardware H.264 encoder.
    /// Any probe trouble falls back to software, never an error.
    pub fn detect(runner: &dyn MediaRunner) -> Self {
        let args = vec!["-hide_banner".to_string(), "-encoders".to_string()];
        match runner.run_encoder(&args) {
            Ok(out) if out.status.success() => {
                let listing = String::from_utf8_lossy(&out.stdout);
                if listing.contains("h264_videotoolbox") {
                    debug!("hardware encoder available: h264_videotoolbox");
                    Self::Hardware("h264_videotoolbox".to_string())
                } else {
                    Self::SoftwareX264
                }
            }
            _ => {
                warn!("encoder listing failed, using libx264");
                Self::SoftwareX264
            }
        }
    }

    /// Codec name as passed to `-c:v`
    pub fn codec_name(&self) -> &str {
        match self {
            Self::SoftwareX264 => "libx264",
            Self::Hardware(name) => name,
        }
    }

    /// Rate-control and tuning arguments for this encoder.
    ///
    /// Hardware encoders have no CRF mode, so quality is approximated with
    /// a bitrate derived from the requested CRF.
    pub fn rate_args(&self, crf: u8, preset: &str) -> Vec<String> {
        match self {
            Self::SoftwareX264 => vec![
                "-crf".to_string(),
                crf.to_string(),
                "-preset".to_string(),
                preset.to_string(),
                "-tune".to_string(),
                "fastdecode".to_string(),
            ],
            Self::Hardware(_) => vec![
                "-b:v".to_string(),
                format!("{}k", bitrate_for_crf(crf)),
            ],
        }
    }
}

/// Approximate bitrate (kbit/s) matching a CRF level
pub fn bitrate_for_crf(crf: u8) -> u32 {
    match crf {
        0..=18 => 8000,
        19..=20 => 6000,
        21..=23 => 4000,
        24..=27 => 2500,
        28..=30 => 1500,
        31..=32 => 1000,
        _ => 800,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::runner::MockMediaRunner;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    fn listing_output(body: &str, success: bool) -> std::io::Result<Output> {
        Ok(Output {
            status: if success {
                ExitStatus::from_raw(0)
            } else {
                ExitStatus::from_raw(1)
            },
            stdout: body.as_bytes().to_vec(),
            stderr: Vec::new(),
        })
    }

    #[test]
    fn test_detect_finds_videotoolbox() {
        let mut runner = MockMediaRunner::new();
        runner.expect_run_encoder().times(1).returning(|_| {
            listing_output(
                " V....D h264_videotoolbox    VideoToolbox H.264 Encoder\n",
                true,
            )
        });

        assert_eq!(
            VideoEncoder::detect(&runner),
            VideoEncoder::Hardware("h264_videotoolbox".to_string())
        );
    }

    #[test]
    fn test_detect_defaults_to_software() {
        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(|_| listing_output(" V..... libx264    H.264 software encoder\n", true));

        assert_eq!(VideoEncoder::detect(&runner), VideoEncoder::SoftwareX264);
    }

    #[test]
    fn test_detect_failure_falls_back_to_software() {
        let mut runner = MockMediaRunner::new();
        runner
            .expect_run_encoder()
            .times(1)
            .returning(|_| listing_output("", false));

        assert_eq!(VideoEncoder::detect(&runner), VideoEncoder::SoftwareX264);
    }

    #[test]
    fn test_bitrate_table_boundaries() {
        assert_eq!(bitrate_for_crf(18), 8000);
        assert_eq!(bitrate_for_crf(20), 6000);
        assert_eq!(bitrate_for_crf(23), 4000);
        assert_eq!(bitrate_for_crf(27), 2500);
        assert_eq!(bitrate_for_crf(30), 1500);
        assert_eq!(bitrate_for_crf(32), 1000);
        assert_eq!(bitrate_for_crf(35), 800);
    }

    #[test]
    fn test_software_rate_args_use_crf() {
        let args = VideoEncoder::SoftwareX264.rate_args(27, "medium");
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "27"));
        assert!(args.windows(2).any(|w| w[0] == "-preset" && w[1] == "medium"));
        assert!(args.windows(2).any(|w| w[0] == "-tune" && w[1] == "fastdecode"));
    }

    #[test]
    fn test_hardware_rate_args_use_bitrate() {
        let hw = VideoEncoder::Hardware("h264_videotoolbox".to_string());
        let args = hw.rate_args(27, "medium");
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "2500k"));
        assert!(!args.contains(&"-crf".to_string()));
    }
}
