use async_trait::async_trait;

use super::types::{CaptureError, CaptureInfo, Frame};

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Establish the capture (permission prompt, probe frame).
    async fn start(&self) -> Result<CaptureInfo, CaptureError>;

    /// Release the capture. Later frame requests return `None`.
    fn stop(&self);

    fn is_active(&self) -> bool;

    /// Grab the current frame. `None` means "skip this cycle", never an error.
    async fn capture_frame(&self) -> Option<Frame>;

    /// Human-readable name of what is being captured.
    fn label(&self) -> &str;
}
