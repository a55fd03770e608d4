use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Encoder presets accepted by the re-encode step (x264 naming).
pub const X264_PRESETS: [&str; 9] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Main configuration for vid-rehash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which transformation steps run
    pub pipeline: PipelineConfig,

    /// Pixel noise injection settings
    pub noise: NoiseConfig,

    /// Re-encode settings
    pub encode: EncodeConfig,

    /// Silence padding settings
    pub silence: SilenceConfig,

    /// Transparent overlay settings
    pub overlay: OverlayConfig,

    /// Workspace directories
    pub paths: PathsConfig,

    /// Batch execution settings
    pub batch: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            noise: NoiseConfig::default(),
            encode: EncodeConfig::default(),
            silence: SilenceConfig::default(),
            overlay: OverlayConfig::default(),
            paths: PathsConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|_| ConfigError::ParseFailed {
            path: path.display().to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.noise.validate()?;
        self.encode.validate()?;
        self.silence.validate()?;
        self.overlay.validate()?;
        self.paths.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

/// Step toggles, applied in the pipeline's fixed order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Strip container and stream metadata (stream copy, no quality loss)
    pub strip_metadata: bool,

    /// Inject imperceptible random pixel noise
    pub pixel_noise: bool,

    /// Re-encode with a changed compression configuration
    pub reencode: bool,

    /// Pad the audio track with a short random silence
    pub silence_pad: bool,

    /// Composite a near-transparent 1x1 pixel at a random corner
    pub overlay: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strip_metadata: true,
            pixel_noise: true,
            reencode: true,
            silence_pad: false,
            overlay: false,
        }
    }
}

/// Pixel noise injection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Fraction of pixels perturbed per frame (0.0-1.0)
    pub pixel_fraction: f64,

    /// Maximum absolute per-channel offset, in 8-bit channel units
    pub max_offset: u8,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            pixel_fraction: 0.005,
            max_offset: 2,
        }
    }
}

impl NoiseConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pixel_fraction) {
            return Err(ConfigError::InvalidValue {
                key: "noise.pixel_fraction".to_string(),
                value: self.pixel_fraction.to_string(),
            }
            .into());
        }

        if !(1..=8).contains(&self.max_offset) {
            return Err(ConfigError::InvalidValue {
                key: "noise.max_offset".to_string(),
                value: self.max_offset.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Re-encode step configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Constant rate factor for the software encoder (18-35)
    pub crf: u8,

    /// x264 preset name
    pub preset: String,

    /// AAC audio bitrate in kbit/s
    pub audio_bitrate_kbps: u32,

    /// Probe for a hardware H.264 encoder and use it when present
    pub use_hardware: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            crf: 27,
            preset: "medium".to_string(),
            audio_bitrate_kbps: 128,
            use_hardware: false,
        }
    }
}

impl EncodeConfig {
    fn validate(&self) -> Result<()> {
        if !(18..=35).contains(&self.crf) {
            return Err(ConfigError::InvalidValue {
                key: "encode.crf".to_string(),
                value: self.crf.to_string(),
            }
            .into());
        }

        if !X264_PRESETS.contains(&self.preset.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "encode.preset".to_string(),
                value: self.preset.clone(),
            }
            .into());
        }

        if !(32..=320).contains(&self.audio_bitrate_kbps) {
            return Err(ConfigError::InvalidValue {
                key: "encode.audio_bitrate_kbps".to_string(),
                value: self.audio_bitrate_kbps.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Silence padding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    /// Minimum padding duration in seconds
    pub min_secs: f64,

    /// Maximum padding duration in seconds
    pub max_secs: f64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            min_secs: 0.1,
            max_secs: 1.0,
        }
    }
}

impl SilenceConfig {
    fn validate(&self) -> Result<()> {
        if self.min_secs <= 0.0 || self.min_secs > self.max_secs {
            return Err(ConfigError::InvalidValue {
                key: "silence.duration_range".to_string(),
                value: format!("{}-{}", self.min_secs, self.max_secs),
            }
            .into());
        }

        if self.max_secs > 5.0 {
            return Err(ConfigError::InvalidValue {
                key: "silence.max_secs".to_string(),
                value: self.max_secs.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Transparent overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Alpha of the overlay pixel (0 = invisible; kept near zero so the
    /// overlay never shows)
    pub alpha: u8,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { alpha: 1 }
    }
}

impl OverlayConfig {
    fn validate(&self) -> Result<()> {
        if self.alpha > 16 {
            return Err(ConfigError::InvalidValue {
                key: "overlay.alpha".to_string(),
                value: self.alpha.to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Workspace directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Input staging area
    pub staging_dir: PathBuf,

    /// Scratch area for per-job intermediates
    pub scratch_dir: PathBuf,

    /// Output area for final artifacts
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./uploads"),
            scratch_dir: std::env::temp_dir().join("vid-rehash"),
            output_dir: PathBuf::from("./processed"),
        }
    }
}

impl PathsConfig {
    fn validate(&self) -> Result<()> {
        // Intermediates in the output area would break the "output dir
        // unchanged on failure" guarantee
        if self.scratch_dir == self.output_dir {
            return Err(ConfigError::InvalidValue {
                key: "paths.scratch_dir".to_string(),
                value: self.scratch_dir.display().to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Parallel job slots; 0 picks min(8, cpu count)
    pub workers: usize,

    /// File extensions considered video inputs (lowercase, no dot)
    pub extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            extensions: ["mp4", "avi", "mov", "mkv", "webm", "m4v", "flv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl BatchConfig {
    /// Effective worker count after resolving the 0 = auto default
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            std::cmp::min(8, num_cpus::get()).max(1)
        } else {
            self.workers
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workers > 64 {
            return Err(ConfigError::InvalidValue {
                key: "batch.workers".to_string(),
                value: self.workers.to_string(),
            }
            .into());
        }

        if self.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "batch.extensions".to_string(),
                value: "[]".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.pipeline.silence_pad = true;
        original_config.encode.crf = 23;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert!(loaded_config.pipeline.silence_pad);
        assert_eq!(loaded_config.encode.crf, 23);
        assert_eq!(
            loaded_config.noise.pixel_fraction,
            original_config.noise.pixel_fraction
        );
    }

    #[test]
    fn test_partial_file_gets_defaults() {
        let config: Config = toml::from_str("[pipeline]\nsilence_pad = true\n").unwrap();
        assert!(config.pipeline.silence_pad);
        assert!(config.pipeline.strip_metadata);
        assert_eq!(config.encode.crf, 27);
    }

    #[test]
    fn test_invalid_noise_fraction() {
        let mut config = Config::default();
        config.noise.pixel_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_crf() {
        let mut config = Config::default();
        config.encode.crf = 51;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_preset() {
        let mut config = Config::default();
        config.encode.preset = "warp9".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_silence_range() {
        let mut config = Config::default();
        config.silence.min_secs = 2.0;
        config.silence.max_secs = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scratch_must_not_be_output() {
        let mut config = Config::default();
        config.paths.scratch_dir = PathBuf::from("./same");
        config.paths.output_dir = PathBuf::from("./same");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers_auto() {
        let config = BatchConfig::default();
        let workers = config.effective_workers();
        assert!(workers >= 1 && workers <= 8);
    }
}
