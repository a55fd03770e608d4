use std::path::Path;

use image::{Rgba, RgbaImage};
use rand::Rng;
use tracing::debug;

use crate::error::{Result, VideoError};
use crate::ffmpeg::encode_to_file;

use super::{StepContext, StepKind, TransformStep};

/// Overlay corner, 10 px in from the frame edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Corner {
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

impl Corner {
    pub(crate) const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::BottomLeft,
        Corner::TopRight,
        Corner::BottomRight,
    ];

    /// Position expression for the overlay filter
    pub(crate) fn position(&self) -> &'static str {
        match self {
            Self::TopLeft => "10:10",
            Self::BottomLeft => "10:main_h-20",
            Self::TopRight => "main_w-20:10",
            Self::BottomRight => "main_w-20:main_h-20",
        }
    }
}

/// Composite a 1x1 near-fully-transparent pixel at a random corner for the
/// clip's whole duration. Forces a full video re-encode while staying
/// invisible to a viewer.
pub struct CornerOverlay;

pub(crate) fn write_overlay_pixel(path: &Path, alpha: u8) -> Result<()> {
    let pixel = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, alpha]));
    pixel.save(path).map_err(|e| VideoError::EncodingFailed {
        reason: format!("failed to write overlay pixel: {}", e),
    })?;
    Ok(())
}

pub(crate) fn build_overlay_args(
    input: &Path,
    pixel: &Path,
    output: &Path,
    position: &str,
    crf: u8,
    preset: &str,
) -> Vec<String> {
    let filter = format!("[1:v]scale=1:1[ovr];[0:v][ovr]overlay={}", position);

    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-i".to_string(),
        pixel.display().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-preset".to_string(),
        preset.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]
}

impl TransformStep for CornerOverlay {
    fn kind(&self) -> StepKind {
        StepKind::Overlay
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let pixel_path = ctx.scratch.join("overlay_pixel.png");
        write_overlay_pixel(&pixel_path, ctx.config.overlay.alpha)?;

        let corner = Corner::ALL[rand::thread_rng().gen_range(0..Corner::ALL.len())];
        debug!("compositing overlay pixel at {:?}", corner);

        let args = build_overlay_args(
            ctx.input,
            &pixel_path,
            ctx.output,
            corner.position(),
            ctx.config.encode.crf,
            &ctx.config.encode.preset,
        );
        encode_to_file(ctx.runner, &args, ctx.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_corner_positions() {
        assert_eq!(Corner::TopLeft.position(), "10:10");
        assert_eq!(Corner::BottomLeft.position(), "10:main_h-20");
        assert_eq!(Corner::TopRight.position(), "main_w-20:10");
        assert_eq!(Corner::BottomRight.position(), "main_w-20:main_h-20");
    }

    #[test]
    fn test_overlay_pixel_is_near_transparent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pixel.png");

        write_overlay_pixel(&path, 1).unwrap();

        let pixel = image::open(&path).unwrap().to_rgba8();
        assert_eq!(pixel.dimensions(), (1, 1));
        assert_eq!(pixel.get_pixel(0, 0).0[3], 1);
    }

    #[test]
    fn test_overlay_args_scale_and_position() {
        let args = build_overlay_args(
            Path::new("in.mp4"),
            Path::new("pixel.png"),
            Path::new("out.mp4"),
            Corner::BottomRight.position(),
            27,
            "medium",
        );

        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.starts_with("[1:v]scale=1:1[ovr]"));
        assert!(filter.ends_with("overlay=main_w-20:main_h-20"));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "copy"));
    }
}
