use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::NoiseConfig;
use crate::error::{Result, VideoError};
use crate::ffmpeg::{encode_to_file, probe, run_encoder_checked, MediaInfo};

use super::{StepContext, StepKind, TransformStep};

/// Rate configuration for re-assembling the perturbed frames. Deliberately
/// distinct from the re-encode step's configuration so the pipeline never
/// performs the same internal encode twice.
const REASSEMBLY_CRF: u8 = 18;
const REASSEMBLY_PRESET: &str = "veryfast";

/// Perturb a small random fraction of pixels per frame by a small signed
/// per-channel offset, then re-assemble the clip with the original audio
/// track, resolution, and frame rate.
///
/// Selection and offsets come from a fresh thread-local generator on every
/// run. A fixed seed would make repeated runs of the same input emit the
/// same noise pattern, which defeats the whole exercise.
pub struct PixelNoise;

impl TransformStep for PixelNoise {
    fn kind(&self) -> StepKind {
        StepKind::PixelNoise
    }

    fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let info = probe(ctx.runner, ctx.input)?;

        let frames_dir = ctx.scratch.join("frames");
        fs::create_dir_all(&frames_dir)?;

        extract_frames(ctx, &frames_dir)?;

        let frames = frame_files(&frames_dir)?;
        if frames.is_empty() {
            return Err(VideoError::EncodingFailed {
                reason: "no frames extracted for noise injection".to_string(),
            }
            .into());
        }
        debug!("perturbing {} frames", frames.len());

        let noise = &ctx.config.noise;
        frames
            .par_iter()
            .try_for_each(|frame| perturb_file(frame, noise))?;

        reassemble(ctx, &frames_dir, &info)?;

        // Extracted frames can dwarf the clip itself; reclaim eagerly
        if let Err(e) = fs::remove_dir_all(&frames_dir) {
            warn!("failed to remove frame directory: {}", e);
        }

        Ok(())
    }
}

fn extract_frames(ctx: &StepContext<'_>, frames_dir: &Path) -> Result<()> {
    let pattern = frames_dir.join("f_%06d.png");
    let args = vec![
        "-i".to_string(),
        ctx.input.display().to_string(),
        "-vsync".to_string(),
        "0".to_string(),
        "-y".to_string(),
        pattern.display().to_string(),
    ];
    run_encoder_checked(ctx.runner, &args, frames_dir)
}

fn frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "png").unwrap_or(false))
        .collect();
    frames.sort();
    Ok(frames)
}

fn perturb_file(path: &Path, noise: &NoiseConfig) -> Result<()> {
    let decoded = image::open(path).map_err(|e| VideoError::EncodingFailed {
        reason: format!("failed to decode frame {}: {}", path.display(), e),
    })?;

    let mut frame = decoded.to_rgb8();
    perturb_frame(
        &mut frame,
        noise.pixel_fraction,
        noise.max_offset,
        &mut rand::thread_rng(),
    );

    frame.save(path).map_err(|e| VideoError::EncodingFailed {
        reason: format!("failed to rewrite frame {}: {}", path.display(), e),
    })?;
    Ok(())
}

/// Shift up to `fraction` of the frame's pixels, each selected at most once,
/// each channel moved by a uniform offset within ±`max_offset` and clamped
/// to the 8-bit range.
///
/// Sampling without replacement keeps the per-channel bound strict; a pixel
/// drawn twice could otherwise accumulate a double shift.
pub(crate) fn perturb_frame(
    frame: &mut RgbImage,
    fraction: f64,
    max_offset: u8,
    rng: &mut impl Rng,
) {
    let (width, height) = frame.dimensions();
    let total = (width as usize) * (height as usize);
    let count = ((total as f64) * fraction) as usize;
    if count == 0 {
        return;
    }

    let offset = max_offset as i16;
    for index in rand::seq::index::sample(rng, total, count) {
        let x = (index % width as usize) as u32;
        let y = (index / width as usize) as u32;
        let pixel = frame.get_pixel_mut(x, y);
        for channel in pixel.0.iter_mut() {
            let shift = rng.gen_range(-offset..=offset);
            *channel = (*channel as i16 + shift).clamp(0, 255) as u8;
        }
    }
}

pub(crate) fn build_reassembly_args(
    original: &Path,
    frames_pattern: &Path,
    output: &Path,
    frame_rate: &str,
    has_audio: bool,
) -> Vec<String> {
    let mut args = vec![
        "-framerate".to_string(),
        frame_rate.to_string(),
        "-i".to_string(),
        frames_pattern.display().to_string(),
    ];

    if has_audio {
        args.extend([
            "-i".to_string(),
            original.display().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-shortest".to_string(),
        ]);
    } else {
        args.extend(["-map".to_string(), "0:v:0".to_string()]);
    }

    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        REASSEMBLY_CRF.to_string(),
        "-preset".to_string(),
        REASSEMBLY_PRESET.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-y".to_string(),
        output.display().to_string(),
    ]);

    args
}

fn reassemble(ctx: &StepContext<'_>, frames_dir: &Path, info: &MediaInfo) -> Result<()> {
    let pattern = frames_dir.join("f_%06d.png");
    let args = build_reassembly_args(
        ctx.input,
        &pattern,
        ctx.output,
        &info.frame_rate,
        info.has_audio,
    );
    encode_to_file(ctx.runner, &args, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat_frame(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    fn changed_pixels(a: &RgbImage, b: &RgbImage) -> usize {
        a.pixels().zip(b.pixels()).filter(|(x, y)| x != y).count()
    }

    #[test]
    fn test_offsets_stay_within_bound() {
        let mut frame = flat_frame(64, 64, 128);
        perturb_frame(&mut frame, 0.05, 2, &mut rand::thread_rng());

        for pixel in frame.pixels() {
            for channel in pixel.0 {
                assert!((126..=130).contains(&channel));
            }
        }
    }

    #[test]
    fn test_fraction_bounds_touched_pixels() {
        let original = flat_frame(64, 64, 128);
        let mut frame = original.clone();
        perturb_frame(&mut frame, 0.05, 2, &mut rand::thread_rng());

        // floor(64 * 64 * 0.05) = 204 selected pixels, selection without
        // replacement, so no more than 204 can differ
        let changed = changed_pixels(&original, &frame);
        assert!(changed <= 204, "{} pixels changed", changed);
        assert!(changed >= 1);
    }

    #[test]
    fn test_clamping_at_channel_extremes() {
        let mut frame = flat_frame(32, 32, 255);
        perturb_frame(&mut frame, 1.0, 2, &mut rand::thread_rng());

        for pixel in frame.pixels() {
            for channel in pixel.0 {
                assert!(channel >= 253);
            }
        }
    }

    #[test]
    fn test_repeated_runs_differ() {
        let base = flat_frame(64, 64, 128);

        let mut first = base.clone();
        perturb_frame(&mut first, 0.05, 2, &mut rand::thread_rng());

        let mut second = base.clone();
        perturb_frame(&mut second, 0.05, 2, &mut rand::thread_rng());

        assert_ne!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_tiny_fraction_leaves_frame_untouched() {
        let original = flat_frame(4, 4, 128);
        let mut frame = original.clone();
        perturb_frame(&mut frame, 0.001, 2, &mut rand::thread_rng());
        assert_eq!(original.as_raw(), frame.as_raw());
    }

    #[test]
    fn test_reassembly_args_keep_original_audio() {
        let args = build_reassembly_args(
            Path::new("in.mp4"),
            Path::new("frames/f_%06d.png"),
            Path::new("out.mp4"),
            "30000/1001",
            true,
        );

        assert!(args
            .windows(2)
            .any(|w| w[0] == "-framerate" && w[1] == "30000/1001"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "1:a:0"));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "copy"));
        assert!(args.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
    }

    #[test]
    fn test_reassembly_args_for_silent_clip() {
        let args = build_reassembly_args(
            Path::new("in.mp4"),
            Path::new("frames/f_%06d.png"),
            Path::new("out.mp4"),
            "25/1",
            false,
        );

        assert!(!args.contains(&"1:a:0".to_string()));
        assert!(!args.contains(&"-shortest".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:v:0"));
    }
}
