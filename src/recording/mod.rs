pub mod controller;
pub mod events;

pub use controller::RecordingController;
pub use events::{EventBus, PauseReason, RecordingEvent};
