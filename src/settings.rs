use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::detection::DetectionConfig;
use crate::generation::GenerationConfig;
use crate::models::session::{CaptureSettings, CaptureSettingsPatch};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    capture: CaptureSettings,
    detection: DetectionConfig,
    generation: GenerationConfig,
}

/// JSON-file-backed user settings. Missing or unreadable files fall back to
/// defaults; every update is written through to disk.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn capture(&self) -> CaptureSettings {
        self.data.read().unwrap().capture.clone()
    }

    pub fn update_capture(&self, patch: &CaptureSettingsPatch) -> Result<CaptureSettings> {
        let mut guard = self.data.write().unwrap();
        guard.capture = guard.capture.merged(patch);
        self.persist(&guard)?;
        Ok(guard.capture.clone())
    }

    pub fn detection(&self) -> DetectionConfig {
        self.data.read().unwrap().detection.clone()
    }

    pub fn update_detection(&self, config: DetectionConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.detection = config;
        self.persist(&guard)
    }

    pub fn generation(&self) -> GenerationConfig {
        self.data.read().unwrap().generation.clone()
    }

    pub fn update_generation(&self, config: GenerationConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.generation = config;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}
