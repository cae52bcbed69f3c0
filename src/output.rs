//! Saved transmission results
//!
//! Each transmission gets its own folder under the output root, named
//! `YYYY-mm-dd_HHMMSS_<id>_<mode>` so that sorting by name sorts by time.
//! A folder holds the clean and corrupted images, the corrupted audio and a
//! `metadata.json` describing how it was made.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::dsp::EffectChain;
use crate::engine::{export_audio, AudioBuffer, ExportFormat};
use crate::error::{Result, SstvError};
use crate::sstv::{DecodeStatus, RgbImage};

/// Images are saved at this multiple of the mode resolution
pub const UPSCALE_FACTOR: usize = 4;

/// Length of the random part of a folder name
const ID_LEN: usize = 6;

const METADATA_FILE: &str = "metadata.json";

/// Files a result folder may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFile {
    Clean,
    Corrupted,
    Audio,
    Metadata,
}

impl OutputFile {
    pub fn file_name(self) -> &'static str {
        match self {
            OutputFile::Clean => "clean.ppm",
            OutputFile::Corrupted => "corrupted.ppm",
            OutputFile::Audio => "corrupted.wav",
            OutputFile::Metadata => METADATA_FILE,
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMetadata {
    pub created_at: DateTime<Utc>,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    pub chain: EffectChain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_status: Option<DecodeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrupted_status: Option<DecodeStatus>,
    /// SHA-256 of the corrupted audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_fingerprint: Option<String>,
}

impl OutputMetadata {
    pub fn new(mode: &str, chain: &EffectChain) -> Self {
        Self {
            created_at: Utc::now(),
            mode: mode.to_string(),
            session_id: None,
            source_path: None,
            chain: chain.clone(),
            clean_status: None,
            corrupted_status: None,
            audio_fingerprint: None,
        }
    }
}

/// One result folder found on disk
#[derive(Debug, Clone)]
pub struct OutputEntry {
    pub folder: PathBuf,
    pub date: String,
    pub time: String,
    pub id: String,
    pub mode: String,
    pub metadata: Option<OutputMetadata>,
    pub has_clean: bool,
    pub has_corrupted: bool,
    pub has_audio: bool,
}

/// Creates, lists and deletes result folders under one root
#[derive(Debug, Clone)]
pub struct OutputManager {
    base_dir: PathBuf,
}

impl OutputManager {
    /// Manage results under `base_dir`, creating it if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create a new uniquely named folder for a `mode` transmission
    pub fn create_output_folder(&self, mode: &str) -> Result<PathBuf> {
        let timestamp = Local::now().format("%Y-%m-%d_%H%M%S");
        let id: String = Uuid::new_v4().simple().to_string().chars().take(ID_LEN).collect();
        let folder = self.base_dir.join(format!("{}_{}_{}", timestamp, id, mode));
        fs::create_dir_all(&folder)?;
        debug!("Created output folder {}", folder.display());
        Ok(folder)
    }

    /// Save `image` upscaled by [`UPSCALE_FACTOR`] with nearest neighbour
    pub fn save_image(&self, folder: &Path, file: OutputFile, image: &RgbImage) -> Result<PathBuf> {
        let upscaled =
            image.resize_nearest(image.width() * UPSCALE_FACTOR, image.height() * UPSCALE_FACTOR);
        let path = folder.join(file.file_name());
        upscaled.write_ppm(&path)?;
        Ok(path)
    }

    /// Save the corrupted audio as 16-bit WAV
    pub fn save_audio(&self, folder: &Path, buffer: &AudioBuffer) -> Result<PathBuf> {
        let path = folder.join(OutputFile::Audio.file_name());
        export_audio(buffer, &path, ExportFormat::default())?;
        Ok(path)
    }

    pub fn save_metadata(&self, folder: &Path, metadata: &OutputMetadata) -> Result<PathBuf> {
        let path = folder.join(METADATA_FILE);
        fs::write(&path, serde_json::to_string_pretty(metadata)?)?;
        Ok(path)
    }

    fn load_metadata(folder: &Path) -> Option<OutputMetadata> {
        let path = folder.join(METADATA_FILE);
        let file = File::open(&path).ok()?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                warn!("Ignoring unreadable {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Every result folder, newest first
    pub fn list_outputs(&self) -> Result<Vec<OutputEntry>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut outputs: Vec<OutputEntry> = WalkDir::new(&self.base_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| Self::describe(entry.path()))
            .collect();

        outputs.sort_by(|a, b| {
            let a_name = a.folder.file_name().unwrap_or_default();
            let b_name = b.folder.file_name().unwrap_or_default();
            b_name.cmp(a_name)
        });
        Ok(outputs)
    }

    fn describe(folder: &Path) -> OutputEntry {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // date_time_id_mode; mode names may hold underscores
        let parts: Vec<&str> = name.splitn(4, '_').collect();
        let (date, time, id, mode) = match parts.as_slice() {
            [date, time, id, mode] => (*date, *time, *id, *mode),
            _ => ("", "", "", name.as_str()),
        };

        OutputEntry {
            folder: folder.to_path_buf(),
            date: date.to_string(),
            time: time.to_string(),
            id: id.to_string(),
            mode: mode.to_string(),
            metadata: Self::load_metadata(folder),
            has_clean: folder.join(OutputFile::Clean.file_name()).exists(),
            has_corrupted: folder.join(OutputFile::Corrupted.file_name()).exists(),
            has_audio: folder.join(OutputFile::Audio.file_name()).exists(),
        }
    }

    /// Path of `file` inside `folder` if it exists
    pub fn output_path(&self, folder: &Path, file: OutputFile) -> Option<PathBuf> {
        let path = folder.join(file.file_name());
        path.exists().then_some(path)
    }

    /// Delete a result folder and everything in it
    ///
    /// # Errors
    /// * `FileNotFound` - If `folder` is not a folder under the output root
    pub fn delete_output(&self, folder: &Path) -> Result<()> {
        if !folder.is_dir() || folder.parent() != Some(self.base_dir.as_path()) {
            return Err(SstvError::FileNotFound {
                path: folder.display().to_string(),
                source: None,
            });
        }
        fs::remove_dir_all(folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstv::Completion;
    use tempfile::TempDir;

    #[test]
    fn test_folder_name_layout() {
        let dir = TempDir::new().unwrap();
        let manager = OutputManager::new(dir.path()).unwrap();
        let folder = manager.create_output_folder("MartinM1").unwrap();

        let entries = manager.list_outputs().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.folder, folder);
        assert_eq!(entry.mode, "MartinM1");
        assert_eq!(entry.id.len(), ID_LEN);
        assert_eq!(entry.date.len(), 10);
        assert_eq!(entry.time.len(), 6);
        assert!(!entry.has_clean);
    }

    #[test]
    fn test_saves_files_and_metadata() {
        let dir = TempDir::new().unwrap();
        let manager = OutputManager::new(dir.path().join("out")).unwrap();
        let folder = manager.create_output_folder("Robot36").unwrap();

        let image = RgbImage::filled(4, 3, [10, 20, 30]);
        let path = manager.save_image(&folder, OutputFile::Clean, &image).unwrap();
        let saved = RgbImage::read_ppm(&path).unwrap();
        assert_eq!(saved.width(), 16);
        assert_eq!(saved.height(), 12);
        assert_eq!(saved.pixel(15, 11), [10, 20, 30]);

        manager
            .save_audio(&folder, &AudioBuffer::from_samples(vec![0.1; 100], 44100))
            .unwrap();

        let mut metadata = OutputMetadata::new("Robot36", &EffectChain::new());
        metadata.corrupted_status = Some(DecodeStatus {
            rows_decoded: 216,
            expected_rows: 240,
            desync_events: 1,
            completion: Completion::Partial,
        });
        manager.save_metadata(&folder, &metadata).unwrap();

        let entry = &manager.list_outputs().unwrap()[0];
        assert!(entry.has_clean && entry.has_audio && !entry.has_corrupted);
        let loaded = entry.metadata.as_ref().unwrap();
        assert_eq!(loaded.corrupted_status.map(|s| s.rows_decoded), Some(216));
        assert!(manager.output_path(&folder, OutputFile::Metadata).is_some());
        assert!(manager.output_path(&folder, OutputFile::Corrupted).is_none());
    }

    #[test]
    fn test_delete_output() {
        let dir = TempDir::new().unwrap();
        let manager = OutputManager::new(dir.path()).unwrap();
        let folder = manager.create_output_folder("PD90").unwrap();

        assert!(manager.delete_output(dir.path()).is_err());
        manager.delete_output(&folder).unwrap();
        assert!(manager.list_outputs().unwrap().is_empty());
    }
}
