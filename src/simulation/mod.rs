use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Duration;
use tracing::info;

use crate::capture::{CaptureError, CaptureInfo, CaptureSession, Frame, FrameSource};
use crate::classifier::{ClassifierError, SignalClassifier};
use crate::signal::{AnalysisResult, Signal};

/// SOI, a 1280x720 baseline frame header and EOI.
const SYNTHETIC_JPEG: [u8; 23] = [
    0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x02, 0xD0, 0x05, 0x00, 0x03, 0x01, 0x22, 0x00,
    0x02, 0x11, 0x01, 0x03, 0x11, 0x01, 0xFF, 0xD9,
];

/// Frame source that needs no screen. Always produces the same synthetic frame.
pub struct SimulatedFrameSource {
    session: CaptureSession,
    frames_available: AtomicBool,
    frames_taken: AtomicUsize,
}

impl SimulatedFrameSource {
    pub fn new() -> Self {
        Self {
            session: CaptureSession::new(u32::MAX),
            frames_available: AtomicBool::new(true),
            frames_taken: AtomicUsize::new(0),
        }
    }

    /// Make `capture_frame` return `None` while still reporting active,
    /// like a capture whose frame could not be drawn.
    pub fn set_frames_available(&self, available: bool) {
        self.frames_available.store(available, Ordering::SeqCst);
    }

    pub fn frames_taken(&self) -> usize {
        self.frames_taken.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for SimulatedFrameSource {
    async fn start(&self) -> Result<CaptureInfo, CaptureError> {
        self.session.activate();
        info!("🎞️  Simulated capture started");
        let frame = Frame::from_bytes(SYNTHETIC_JPEG.to_vec()).ok_or(CaptureError::InvalidFrame)?;
        Ok(frame.stats(self.label()))
    }

    fn stop(&self) {
        if self.session.deactivate() {
            info!("🎞️  Simulated capture stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.session.is_active()
    }

    async fn capture_frame(&self) -> Option<Frame> {
        if !self.is_active() || !self.frames_available.load(Ordering::SeqCst) {
            return None;
        }
        self.frames_taken.fetch_add(1, Ordering::SeqCst);
        Frame::from_bytes(SYNTHETIC_JPEG.to_vec())
    }

    fn label(&self) -> &str {
        "Simulated chart"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Respond { signal: Signal, confidence: f64 },
    Fail(String),
}

/// Classifier that replays a fixed script, wrapping around at the end.
pub struct ScriptedClassifier {
    steps: Vec<ScriptStep>,
    cursor: AtomicUsize,
    latency: Duration,
}

impl ScriptedClassifier {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            cursor: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Script used by `SIMULATION_MODE`: a few quiet minutes, a buy, a failure.
    pub fn demo() -> Self {
        Self::new(vec![
            ScriptStep::Respond { signal: Signal::Wait, confidence: 35.0 },
            ScriptStep::Respond { signal: Signal::Wait, confidence: 52.0 },
            ScriptStep::Respond { signal: Signal::Buy, confidence: 88.0 },
            ScriptStep::Fail("simulated network error".to_string()),
        ])
        .with_latency(Duration::from_millis(800))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalClassifier for ScriptedClassifier {
    async fn classify(&self, frame: &Frame) -> Result<AnalysisResult, ClassifierError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let timestamp = frame.captured_at.timestamp_millis();
        if self.steps.is_empty() {
            return Ok(AnalysisResult::neutral(timestamp));
        }

        match &self.steps[index % self.steps.len()] {
            ScriptStep::Respond { signal, confidence } => {
                let mut result = AnalysisResult::neutral(timestamp).with_signal(*signal, *confidence);
                if signal.is_tradeable() {
                    result.momentum_crossing = true;
                    result.williams_crossing = true;
                    result.reasoning = format!("Simulated {} at {}", signal, Utc::now().format("%H:%M:%S"));
                }
                Ok(result)
            }
            ScriptStep::Fail(reason) => Err(ClassifierError::Http(reason.clone())),
        }
    }
}
