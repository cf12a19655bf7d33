pub mod detection;
pub mod product;
pub mod result;
pub mod session;

pub use detection::{AttributeValue, BoundingBox, DetectedProduct, OcrPayload, PriceDetection};
pub use product::{
    CategoryField, Dimensions, PriceField, ProductInformation, Provenance, TextField, Variant,
};
pub use result::{DetectionResult, HistoryEntry, ProcessingSession, ProcessingStatus, ResultStatus};
pub use session::{
    CaptureSettings, CaptureSettingsPatch, CapturedFrame, RecordingSession, Resolution,
    SessionStatus, SourceKind, UploadMeta,
};
