use thiserror::Error;

/// Main error type for the vid-rehash library
#[derive(Error, Debug)]
pub enum RehashError {
    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline error: {message}")]
    Pipeline { message: String },
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Input not readable: {path} - {reason}")]
    InputUnreadable { path: String, reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Encoder unavailable: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("Insufficient disk space writing {path}")]
    InsufficientSpace { path: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using RehashError
pub type Result<T> = std::result::Result<T, RehashError>;

impl RehashError {
    /// Create a pipeline error with a custom message
    pub fn pipeline<S: Into<String>>(message: S) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }

    /// Check if this error is scoped to a single job (sibling jobs in a
    /// batch can keep running) or poisons the whole run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A misconfigured run would fail every job the same way
            Self::Config(_) => false,
            // No encoder means no job can succeed
            Self::Video(VideoError::EncoderUnavailable { .. }) => false,
            // A full disk will fail the next job too
            Self::Video(VideoError::InsufficientSpace { .. }) => false,
            _ => true,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::InputUnreadable { path, reason }) => {
                format!(
                    "Could not read input video '{}': {}. Check the file exists and is a supported container.",
                    path, reason
                )
            }
            Self::Video(VideoError::EncoderUnavailable { .. }) => {
                "ffmpeg was not found on PATH. Install ffmpeg and ffprobe to use this tool.".to_string()
            }
            Self::Video(VideoError::InsufficientSpace { path }) => {
                format!("Ran out of disk space while writing '{}'. Free up space and rerun.", path)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
