pub mod battery;
pub mod encoder;
pub mod source;

pub use battery::BatteryFeed;
pub use encoder::{encode_jpeg, SyntheticSource, SyntheticUpload};
pub use source::{EncodedFrame, FrameSource, MediaGateway, UploadSource};
