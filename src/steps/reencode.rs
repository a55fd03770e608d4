use std::path::Path;

use tracing::debug;

use crate::config::EncodeConfig;
use crate::error::Result;
use crate::ffmpeg::{encode_to_file, VideoEncoder};

use super::{StepContext, StepKind, TransformStep};

/// Full re-encode with a changed compression configuration, shifting the
/// compressed byte stream independent of pixel content.
pub struct Reencode {
    encoder: VideoEncoder,
}

impl Reencode {
    pub fn new(encoder: VideoEncoder) -> Self {
        Self { encoder }
    }
}

pub(crate) fn build_reencode_args(
    input: &Path,
    output: &Path,
    encoder: &VideoEncoder,
    encode: &EncodeConfig,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.display().to_string(),
        "-c:v".to_string(),
        encoder.codec_name().to_string(),
    ];

    args.extend(encoder.rate_args(encode.crf, &encode.preset));

    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", encode.audio_bitrate_kbps),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]);

    args
}

impl TransformStep for Reencode {
    fn kind(&self) -> StepKind {
        StepKind::Reencode
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        debug!(
            "re-encoding {} with {}",
            ctx.input.display(),
            self.encoder.codec_name()
        );
        let args = build_reencode_args(ctx.input, ctx.output, &self.encoder, &ctx.config.encode);
        encode_to_file(ctx.runner, &args, ctx.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_reencode_args() {
        let args = build_reencode_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &VideoEncoder::SoftwareX264,
            &EncodeConfig::default(),
        );

        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "27"));
        assert!(args.windows(2).any(|w| w[0] == "-preset" && w[1] == "medium"));
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "128k"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "-movflags" && w[1] == "+faststart"));
    }

    #[test]
    fn test_hardware_reencode_uses_bitrate() {
        let hw = VideoEncoder::Hardware("h264_videotoolbox".to_string());
        let args = build_reencode_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &hw,
            &EncodeConfig::default(),
        );

        assert!(args
            .windows(2)
            .any(|w| w[0] == "-c:v" && w[1] == "h264_videotoolbox"));
        assert!(args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "2500k"));
        assert!(!args.contains(&"-crf".to_string()));
    }
}
