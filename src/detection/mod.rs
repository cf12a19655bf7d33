pub mod candidates;
pub mod config;
pub mod engine;
pub mod tracking;

pub use candidates::{CandidateSource, RandomCandidates};
pub use config::DetectionConfig;
pub use engine::{DetectionEngine, DetectionOutcome, DetectionProgress, DetectionStats};
