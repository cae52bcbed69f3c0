//! Error handling for sstv-glitch
//!
//! Fatal conditions are reported per operation; nothing here aborts the host.
//! Every error carries a stable code and recovery suggestions.

use thiserror::Error;

/// Result type alias for sstv-glitch operations
pub type Result<T> = std::result::Result<T, SstvError>;

/// Main error type for sstv-glitch operations
#[derive(Error, Debug)]
pub enum SstvError {
    // Mode / image errors
    #[error("Unknown SSTV mode: {name}")]
    UnknownMode { name: String },

    #[error(
        "Image is {actual_width}x{actual_height} but mode {mode} requires {expected_width}x{expected_height}"
    )]
    InvalidImageDimensions {
        mode: String,
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    // Effect errors
    #[error("Parameter '{param}' of effect '{effect}' out of range: {value} (clamped to {clamped})")]
    InvalidEffectParameter {
        effect: String,
        param: String,
        value: f64,
        clamped: f64,
    },

    #[error("Unknown effect: {name}")]
    UnknownEffect { name: String },

    #[error("Unknown preset: {name}")]
    UnknownPreset { name: String },

    // Decode / session states
    #[error("Sync lost at {position_secs:.3}s, falling back to time-estimated scanlines")]
    DecodeDesync { position_secs: f64 },

    #[error("Transmission session {session_id} was cancelled")]
    SessionCancelled { session_id: String },

    // File errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid image file: {reason}")]
    InvalidImage { reason: String },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SstvError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SstvError::UnknownMode { .. } => "UNKNOWN_MODE",
            SstvError::InvalidImageDimensions { .. } => "INVALID_IMAGE_DIMENSIONS",
            SstvError::InvalidEffectParameter { .. } => "INVALID_EFFECT_PARAMETER",
            SstvError::UnknownEffect { .. } => "UNKNOWN_EFFECT",
            SstvError::UnknownPreset { .. } => "UNKNOWN_PRESET",
            SstvError::DecodeDesync { .. } => "DECODE_DESYNC",
            SstvError::SessionCancelled { .. } => "SESSION_CANCELLED",
            SstvError::FileNotFound { .. } => "FILE_NOT_FOUND",
            SstvError::InvalidAudio { .. } => "INVALID_AUDIO",
            SstvError::InvalidImage { .. } => "INVALID_IMAGE",
            SstvError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            SstvError::EmptyAudio => "EMPTY_AUDIO",
            SstvError::Io(_) => "IO_ERROR",
            SstvError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Clamped parameters, desync and cancellation are states rather than
    /// failures; the operation that reported them still produced output.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SstvError::InvalidEffectParameter { .. }
                | SstvError::DecodeDesync { .. }
                | SstvError::SessionCancelled { .. }
                | SstvError::FileNotFound { .. }
                | SstvError::InvalidAudio { .. }
                | SstvError::InvalidImage { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SstvError::UnknownMode { .. } => vec![
                "Run 'sstv-glitch-cli modes' to list supported modes",
                "Supported: MartinM1, MartinM2, ScottieS1, ScottieS2, Robot36, PD90",
            ],
            SstvError::InvalidImageDimensions { .. } => vec![
                "Resize the image to the mode's resolution before encoding",
                "Pass --resize to the encode command to resize automatically",
            ],
            SstvError::InvalidEffectParameter { .. } => vec![
                "The value was clamped to the nearest valid boundary",
                "Run 'sstv-glitch-cli effects' to see declared ranges",
            ],
            SstvError::UnknownEffect { .. } => {
                vec!["Run 'sstv-glitch-cli effects' to list available effects"]
            }
            SstvError::UnknownPreset { .. } => {
                vec!["Run 'sstv-glitch-cli presets' to list available presets"]
            }
            SstvError::DecodeDesync { .. } => vec![
                "Reduce sync-affecting effects (sync dropout, time stretch, phase modulation)",
                "Increase the decoder tolerance factor in the configuration",
            ],
            SstvError::FileNotFound { .. } => vec![
                "Check the path, relative paths resolve from the working directory",
                "Saved transmissions are listed by 'sstv-glitch-cli outputs'",
            ],
            SstvError::InvalidAudio { .. } => vec![
                "Only RIFF WAV input is read; convert other containers first",
                "A truncated recording can be re-exported from the recorder",
            ],
            SstvError::InvalidImage { .. } => vec![
                "Convert the image to binary PPM (P6) with 8-bit channels",
                "Example: convert input.png -depth 8 output.ppm",
            ],
            SstvError::UnsupportedFormat { .. } => {
                vec!["Supported formats: WAV (16/24/32-bit), PPM (P6)"]
            }
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SstvError::UnknownMode {
            name: "Martin M9".to_string(),
        };
        assert_eq!(err.error_code(), "UNKNOWN_MODE");
        assert!(!err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_states_are_recoverable() {
        assert!(SstvError::DecodeDesync { position_secs: 1.0 }.is_recoverable());
        assert!(SstvError::SessionCancelled {
            session_id: "abc".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_dimension_message() {
        let err = SstvError::InvalidImageDimensions {
            mode: "MartinM1".into(),
            expected_width: 320,
            expected_height: 256,
            actual_width: 100,
            actual_height: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("100x50"));
        assert!(msg.contains("320x256"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SstvError = io_err.into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
