use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::api::FrameSource;
use super::session::CaptureSession;
use super::types::{CaptureError, CaptureInfo, Frame};

/// Reads the image file an external recorder keeps overwriting
/// (OBS screenshot hotkey, a cron'd `scrot`, ...).
pub struct FileFrameSource {
    path: PathBuf,
    label: String,
    session: CaptureSession,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>, max_failures: u32) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            session: CaptureSession::new(max_failures),
        }
    }

    async fn read_frame(&self) -> Result<Frame, CaptureError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                CaptureError::Unsupported(format!("{} does not exist", self.path.display()))
            } else {
                CaptureError::Io(e)
            }
        })?;
        Frame::from_bytes(bytes).ok_or(CaptureError::InvalidFrame)
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn start(&self) -> Result<CaptureInfo, CaptureError> {
        info!("🖼️  Watching frame file {}", self.path.display());
        let frame = self.read_frame().await?;
        self.session.activate();
        Ok(frame.stats(&self.label))
    }

    fn stop(&self) {
        if self.session.deactivate() {
            info!("⏹️  Capture stopped: {}", self.label);
        }
    }

    fn is_active(&self) -> bool {
        self.session.is_active()
    }

    async fn capture_frame(&self) -> Option<Frame> {
        if !self.is_active() {
            return None;
        }

        match self.read_frame().await {
            Ok(frame) => {
                self.session.record_success();
                debug!("📸 Frame read ({} bytes)", frame.bytes.len());
                Some(frame)
            }
            Err(e) => {
                let (failures, ended) = self.session.record_failure();
                warn!("⚠️ Frame read failed ({}): {}", failures, e);
                if ended {
                    warn!("⏹️  Capture ended: {} unreadable", self.path.display());
                }
                None
            }
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}
