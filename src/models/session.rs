use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Screen,
    Camera,
    Upload,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Screen => "Screen",
            SourceKind::Camera => "Camera",
            SourceKind::Upload => "Upload",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Recording,
    Paused,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Recording => "Recording",
            SessionStatus::Paused => "Paused",
            SessionStatus::Completed => "Completed",
            SessionStatus::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Per-session capture parameters. Fixed for the life of a session except
/// through `RecordingController::adjust_settings`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    pub capture_interval_ms: u64,
    pub max_frames: usize,
    /// JPEG quality in [0, 1].
    pub jpeg_quality: f64,
    pub resolution: Resolution,
    /// Battery percent below which a recording session is auto-paused.
    pub battery_pause_threshold: f64,
    pub detect_inactivity: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            capture_interval_ms: 2_000,
            max_frames: 300,
            jpeg_quality: 0.8,
            resolution: Resolution::new(1280, 720),
            battery_pause_threshold: 15.0,
            detect_inactivity: false,
        }
    }
}

/// Sparse overlay for `CaptureSettings`; unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettingsPatch {
    pub capture_interval_ms: Option<u64>,
    pub max_frames: Option<usize>,
    pub jpeg_quality: Option<f64>,
    pub resolution: Option<Resolution>,
    pub battery_pause_threshold: Option<f64>,
    pub detect_inactivity: Option<bool>,
}

impl CaptureSettings {
    pub fn merged(&self, patch: &CaptureSettingsPatch) -> CaptureSettings {
        CaptureSettings {
            capture_interval_ms: patch.capture_interval_ms.unwrap_or(self.capture_interval_ms),
            max_frames: patch.max_frames.unwrap_or(self.max_frames),
            jpeg_quality: patch.jpeg_quality.unwrap_or(self.jpeg_quality),
            resolution: patch.resolution.unwrap_or(self.resolution),
            battery_pause_threshold: patch
                .battery_pause_threshold
                .unwrap_or(self.battery_pause_threshold),
            detect_inactivity: patch.detect_inactivity.unwrap_or(self.detect_inactivity),
        }
    }
}

/// A product hit localized within a single frame, attached by the detection
/// stage after the fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameDetection {
    pub product_id: String,
    pub bounding_box: crate::models::detection::BoundingBox,
    pub confidence: f64,
}

/// One encoded still image. Never mutated after capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapturedFrame {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Encoded JPEG payload.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub battery_level: Option<f64>,
    pub detections: Option<Vec<FrameDetection>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadMeta {
    pub file_name: String,
    pub duration_ms: u64,
    pub category_hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: String,
    pub source: SourceKind,
    pub source_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub settings: CaptureSettings,
    /// Frame payloads are persisted separately in chunks, never inside the
    /// session metadata blob.
    #[serde(skip)]
    pub frames: Vec<CapturedFrame>,
    pub status: SessionStatus,
    pub error_message: Option<String>,
    /// Set while the battery level is below the pause threshold; blocks resume.
    pub battery_warning: bool,
    pub storage_bytes: u64,
    pub upload: Option<UploadMeta>,
    /// 0-100, upload sessions only.
    pub processing_progress: Option<f64>,
}

impl RecordingSession {
    pub fn new(source: SourceKind, source_id: Option<String>, settings: CaptureSettings) -> Self {
        let status = match source {
            SourceKind::Upload => SessionStatus::Paused,
            _ => SessionStatus::Recording,
        };
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            source_id,
            started_at: Utc::now(),
            ended_at: None,
            settings,
            frames: Vec::new(),
            status,
            error_message: None,
            battery_warning: false,
            storage_bytes: 0,
            upload: None,
            processing_progress: None,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn at_frame_cap(&self) -> bool {
        self.frames.len() >= self.settings.max_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_keeps_unset_fields() {
        let base = CaptureSettings::default();
        let patch = CaptureSettingsPatch {
            capture_interval_ms: Some(500),
            jpeg_quality: Some(0.5),
            ..Default::default()
        };
        let merged = base.merged(&patch);
        assert_eq!(merged.capture_interval_ms, 500);
        assert_eq!(merged.jpeg_quality, 0.5);
        assert_eq!(merged.max_frames, base.max_frames);
        assert_eq!(merged.resolution, base.resolution);
    }

    #[test]
    fn upload_sessions_start_paused() {
        let session = RecordingSession::new(SourceKind::Upload, None, CaptureSettings::default());
        assert_eq!(session.status, SessionStatus::Paused);
        assert!(session.frames.is_empty());

        let live = RecordingSession::new(SourceKind::Screen, None, CaptureSettings::default());
        assert_eq!(live.status, SessionStatus::Recording);
    }

    #[test]
    fn frames_are_excluded_from_metadata_serialization() {
        let mut session =
            RecordingSession::new(SourceKind::Screen, None, CaptureSettings::default());
        session.frames.push(CapturedFrame {
            id: "f1".into(),
            timestamp: Utc::now(),
            data: vec![1, 2, 3],
            width: 2,
            height: 2,
            battery_level: None,
            detections: None,
        });

        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("\"frames\""));
    }
}
