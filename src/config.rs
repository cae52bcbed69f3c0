//! Application configuration
//!
//! Everything needed to run a transmission from the command line, stored as
//! JSON. Missing fields fall back to their defaults, so a config file only
//! needs the values it changes.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::dsp::EffectChain;
use crate::engine::DEFAULT_SAMPLE_RATE;
use crate::error::{Result, SstvError};
use crate::sstv::{DecoderConfig, EncoderConfig, ModeId, ModeSpec};

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Processing rate; applied to both the encoder and the decoder
    pub sample_rate: u32,
    pub mode: ModeId,
    pub encoder: EncoderConfig,
    pub decoder: DecoderConfig,
    pub chain: EffectChain,
    /// Simulated playback speed for paced decoding (1.0 = real time)
    pub playback_speed: f64,
    /// Root folder for saved transmissions
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            mode: ModeId::MartinM1,
            encoder: EncoderConfig::default(),
            decoder: DecoderConfig::default(),
            chain: EffectChain::new(),
            playback_speed: 1.0,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl AppConfig {
    /// Load a config file
    ///
    /// # Errors
    /// * `FileNotFound` - If `path` does not exist
    /// * `Serialization` - If the file is not valid config JSON
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SstvError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }
        let reader = BufReader::new(File::open(path)?);
        let config: AppConfig = serde_json::from_reader(reader)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Write the config as pretty JSON, creating parent folders
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn mode_spec(&self) -> &'static ModeSpec {
        self.mode.spec()
    }

    /// Encoder settings at the configured rate
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            sample_rate: self.sample_rate,
            ..self.encoder
        }
    }

    /// Decoder settings matching the encoder
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            sample_rate: self.sample_rate,
            vis_header: self.encoder.vis_header,
            ..self.decoder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{EffectKind, EffectSpec};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.mode = ModeId::Robot36;
        config.sample_rate = 48000;
        config.chain.add(EffectSpec::new(EffectKind::Noise).with_param("amount", 0.3));
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"mode": "ScottieS1", "decoder": {"lock_window": 0.2}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.mode, ModeId::ScottieS1);
        assert_eq!(config.decoder.lock_window, 0.2);
        assert_eq!(config.decoder.relock_window, DecoderConfig::default().relock_window);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert!(config.chain.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(SstvError::FileNotFound { .. })));
    }

    #[test]
    fn test_rate_and_header_flow_into_decoder() {
        let mut config = AppConfig::default();
        config.sample_rate = 22050;
        config.encoder.vis_header = true;
        let decoder = config.decoder_config();
        assert_eq!(decoder.sample_rate, 22050);
        assert!(decoder.vis_header);
        assert_eq!(config.encoder_config().sample_rate, 22050);
    }
}
