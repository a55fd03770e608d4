use std::fs;
use std::path::Path;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::Result;
use crate::ffmpeg::{encode_to_file, probe};

use super::{StepContext, StepKind, TransformStep};

/// Which end of the audio track receives the padding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PadSide {
    Start,
    End,
}

/// Concatenate a short randomly-sized silence to one end of the audio
/// track. The video stream is copied untouched, so video-only duration
/// never changes; only the container and audio durations grow.
pub struct SilencePad;

pub(crate) fn build_silence_args(
    input: &Path,
    output: &Path,
    duration_secs: f64,
    side: PadSide,
) -> Vec<String> {
    // Both legs are forced to 44.1 kHz stereo first; concat refuses
    // mismatched inputs and sources are not all 44.1 kHz
    let filter = match side {
        PadSide::Start => {
            "[0:a]aformat=sample_rates=44100:channel_layouts=stereo[main];\
             [1:a]aformat=sample_rates=44100:channel_layouts=stereo[pad];\
             [pad][main]concat=n=2:v=0:a=1[outa]"
        }
        PadSide::End => {
            "[0:a]aformat=sample_rates=44100:channel_layouts=stereo[main];\
             [1:a]aformat=sample_rates=44100:channel_layouts=stereo[pad];\
             [main][pad]concat=n=2:v=0:a=1[outa]"
        }
    };

    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-t".to_string(),
        format!("{:.3}", duration_secs),
        "-i".to_string(),
        "anullsrc=channel_layout=stereo:sample_rate=44100".to_string(),
        "-filter_complex".to_string(),
        filter.to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

impl TransformStep for SilencePad {
    fn kind(&self) -> StepKind {
        StepKind::SilencePad
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let info = probe(ctx.runner, ctx.input)?;
        if !info.has_audio {
            warn!(
                "{} has no audio track, silence padding passes through",
                ctx.input.display()
            );
            fs::copy(ctx.input, ctx.output)?;
            return Ok(());
        }

        let mut rng = rand::thread_rng();
        let duration =
            rng.gen_range(ctx.config.silence.min_secs..=ctx.config.silence.max_secs);
        let side = if rng.gen_bool(0.5) {
            PadSide::Start
        } else {
            PadSide::End
        };
        debug!("padding {:.3}s of silence at the {:?}", duration, side);

        let args = build_silence_args(ctx.input, ctx.output, duration, side);
        encode_to_file(ctx.runner, &args, ctx.output)
    }
}
