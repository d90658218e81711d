use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::api::FrameSource;
use super::session::CaptureSession;
use super::types::{CaptureError, CaptureInfo, Frame};
use crate::config::CaptureConfig;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Captures the screen by running an external screenshot tool that writes
/// the image to stdout (e.g. `grim -t jpeg -` or `screencapture -t jpg -`).
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
    label: String,
    session: CaptureSession,
}

impl CommandFrameSource {
    pub fn new(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let mut parts = config.command.split_whitespace().map(ToString::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CaptureError::Unsupported("empty capture command".to_string()))?;

        Ok(Self {
            program,
            args: parts.collect(),
            label: config.source_label.clone(),
            session: CaptureSession::new(config.max_consecutive_failures),
        })
    }

    async fn run_once(&self) -> Result<Frame, CaptureError> {
        let output = timeout(
            CAPTURE_TIMEOUT,
            Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| CaptureError::Timeout)?
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => CaptureError::Unsupported(format!(
                "capture program `{}` not found",
                self.program
            )),
            ErrorKind::PermissionDenied => CaptureError::Unsupported(format!(
                "not allowed to run `{}`",
                self.program
            )),
            _ => CaptureError::Io(e),
        })?;

        if !output.status.success() {
            return Err(CaptureError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Frame::from_bytes(output.stdout).ok_or(CaptureError::InvalidFrame)
    }
}

#[async_trait]
impl FrameSource for CommandFrameSource {
    async fn start(&self) -> Result<CaptureInfo, CaptureError> {
        info!("🖥️  Probing capture command: {} {}", self.program, self.args.join(" "));
        let frame = self.run_once().await?;
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

        match self.run_once().await {
            Ok(frame) => {
                self.session.record_success();
                debug!("📸 Frame captured ({} bytes)", frame.bytes.len());
                Some(frame)
            }
            Err(e) => {
                let (failures, ended) = self.session.record_failure();
                warn!(
                    "⚠️ Frame capture failed ({}/{}): {}",
                    failures,
                    self.session.max_failures(),
                    e
                );
                if ended {
                    warn!("⏹️  Capture ended after {} consecutive failures", failures);
                }
                None
            }
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}
