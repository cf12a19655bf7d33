use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::models::session::Resolution;

/// One encoded still grabbed from a visual source.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A live visual source (screen or camera stream). The controller only ever
/// asks it to render its current content at a target resolution and encode
/// the result, so session lifecycle logic stays testable without a real
/// rendering surface.
pub trait FrameSource: Send {
    /// Identifier of the underlying stream/display, when the backend has one.
    fn source_id(&self) -> Option<String> {
        None
    }

    /// Draw the current visual content at `target` and encode it at
    /// `quality` (0-1).
    fn grab(&mut self, target: Resolution, quality: f64) -> Result<EncodedFrame>;

    /// Cancelled when the underlying stream ends (user stops sharing,
    /// camera unplugged). The controller stops the session on this signal.
    fn ended(&self) -> CancellationToken;
}

/// A seekable uploaded video. Frames are pulled by driving a virtual
/// playhead across the duration.
pub trait UploadSource: Send {
    fn file_name(&self) -> String;

    fn duration_ms(&self) -> u64;

    /// Seek to `position_ms` and grab the frame there.
    fn grab_at(&mut self, position_ms: u64, target: Resolution, quality: f64)
        -> Result<EncodedFrame>;
}

/// Mediates access to capture hardware. Permission denial and device
/// unavailability are reported as `Ok(None)`; the caller must re-invoke if
/// it wants to retry.
pub trait MediaGateway: Send + Sync {
    fn open_screen(&self) -> Result<Option<Box<dyn FrameSource>>>;

    fn open_camera(&self) -> Result<Option<Box<dyn FrameSource>>>;
}
