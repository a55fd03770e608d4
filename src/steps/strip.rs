use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::ffmpeg::encode_to_file;

use super::{StepContext, StepKind, TransformStep};

/// Stream-copy remux that discards all container and stream metadata tags.
/// Never re-encodes, so it costs no quality and runs in container-copy time.
pub struct StripMetadata;

pub(crate) fn build_strip_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-map_metadata".to_string(),
        "-1".to_string(),
        "-map".to_string(),
        "0".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

impl TransformStep for StripMetadata {
    fn kind(&self) -> StepKind {
        StepKind::StripMetadata
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        debug!("stripping metadata from {}", ctx.input.display());
        let args = build_strip_args(ctx.input, ctx.output);
        encode_to_file(ctx.runner, &args, ctx.output)
    }
}
