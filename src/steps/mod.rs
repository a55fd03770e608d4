//! # Transformation Steps
//!
//! The five fingerprint-perturbing transformations, each optional and each
//! running in a fixed position in the chain:
//!
//! 1. **strip-metadata**: stream-copy remux discarding all metadata tags
//! 2. **pixel-noise**: imperceptible random perturbation of a small pixel
//!    fraction per frame
//! 3. **re-encode**: full re-encode with a changed compression configuration
//! 4. **silence-pad**: a short random silence concatenated to the audio
//! 5. **overlay**: a near-transparent 1x1 pixel composited at a random corner
//!
//! A step consumes the previous step's file and writes a new one into the
//! job's scratch directory. Later steps assume the container state left by
//! earlier ones, so the order is a hard contract, never a preference.

pub mod noise;
pub mod overlay;
pub mod reencode;
pub mod silence;
pub mod strip;

pub use noise::PixelNoise;
pub use overlay::CornerOverlay;
pub use reencode::Reencode;
pub use silence::SilencePad;
pub use strip::StripMetadata;

use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::ffmpeg::{MediaRunner, VideoEncoder};

/// Identity of a pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    StripMetadata,
    PixelNoise,
    Reencode,
    SilencePad,
    Overlay,
}

impl StepKind {
    /// All steps in execution order
    pub const ORDERED: [StepKind; 5] = [
        StepKind::StripMetadata,
        StepKind::PixelNoise,
        StepKind::Reencode,
        StepKind::SilencePad,
        StepKind::Overlay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StripMetadata => "strip-metadata",
            Self::PixelNoise => "pixel-noise",
            Self::Reencode => "re-encode",
            Self::SilencePad => "silence-pad",
            Self::Overlay => "overlay",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a step may touch while running
pub struct StepContext<'a> {
    /// Process boundary for encoder/prober invocations
    pub runner: &'a dyn MediaRunner,

    /// Effective configuration for this job
    pub config: &'a Config,

    /// The job's private scratch directory
    pub scratch: &'a Path,

    /// File produced by the previous step (or the original input)
    pub input: &'a Path,

    /// File this step must produce
    pub output: &'a Path,
}

/// One fingerprint-perturbing transformation
///
/// Implementations must either produce `ctx.output` in full or return an
/// error; a partial output file is never acceptable.
pub trait TransformStep: Send + Sync {
    /// Which step this is
    fn kind(&self) -> StepKind;

    /// Consume `ctx.input`, produce `ctx.output`
    fn apply(&self, ctx: &StepContext<'_>) -> Result<()>;
}

/// Build the enabled steps in the pipeline's fixed order
pub fn enabled_steps(config: &Config, encoder: &VideoEncoder) -> Vec<Box<dyn TransformStep>> {
    let mut steps: Vec<Box<dyn TransformStep>> = Vec::new();

    if config.pipeline.strip_metadata {
        steps.push(Box::new(StripMetadata));
    }
    if config.pipeline.pixel_noise {
        steps.push(Box::new(PixelNoise));
    }
    if config.pipeline.reencode {
        steps.push(Box::new(Reencode::new(encoder.clone())));
    }
    if config.pipeline.silence_pad {
        steps.push(Box::new(SilencePad));
    }
    if config.pipeline.overlay {
        steps.push(Box::new(CornerOverlay));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_enables_three_steps() {
        let config = Config::default();
        let steps = enabled_steps(&config, &VideoEncoder::SoftwareX264);
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![StepKind::StripMetadata, StepKind::PixelNoise, StepKind::Reencode]
        );
    }

    #[test]
    fn test_all_steps_follow_fixed_order() {
        let mut config = Config::default();
        config.pipeline.silence_pad = true;
        config.pipeline.overlay = true;

        let steps = enabled_steps(&config, &VideoEncoder::SoftwareX264);
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, StepKind::ORDERED.to_vec());
    }

    #[test]
    fn test_no_steps_when_everything_disabled() {
        let mut config = Config::default();
        config.pipeline.strip_metadata = false;
        config.pipeline.pixel_noise = false;
        config.pipeline.reencode = false;

        let steps = enabled_steps(&config, &VideoEncoder::SoftwareX264);
        assert!(steps.is_empty());
    }

    #[test]
    fn test_step_names() {
        assert_eq!(StepKind::StripMetadata.to_string(), "strip-metadata");
        assert_eq!(StepKind::Overlay.to_string(), "overlay");
    }
}
