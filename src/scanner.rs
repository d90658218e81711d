use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alerts::AlertEmitter;
use crate::capture::{CaptureError, CaptureInfo, FrameSource};
use crate::classifier::SignalClassifier;
use crate::config::SchedulerConfig;
use crate::scheduler::{
    AnalysisGate, AnalysisOutcome, ClockSynchronizer, CycleState, GateRejection, InFlightPermit,
    WallClock,
};
use crate::signal::{AnalysisResult, LogEntry, SignalState};

/// Collaborators the scanner drives. Passed in explicitly so nothing lives in
/// process-wide globals.
#[derive(Clone)]
pub struct ScannerContext {
    pub frames: Arc<dyn FrameSource>,
    pub classifier: Arc<dyn SignalClassifier>,
    pub alerts: Arc<dyn AlertEmitter>,
    pub clock: Arc<dyn WallClock>,
}

/// Where the current candle cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    Idle,
    Analyzing,
    ActiveHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    StartCapture,
    StopCapture,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Started,
    Rejected(GateRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub cycle: CycleState,
    /// Set only on the tick that raised this minute's trigger.
    pub trigger: Option<TriggerDecision>,
}

/// Read-only view published after every state change.
#[derive(Debug, Clone, Serialize)]
pub struct ScannerSnapshot {
    pub cycle: CycleState,
    pub phase: CyclePhase,
    pub capture_active: bool,
    pub capture_source: String,
    pub latest: Option<AnalysisResult>,
    pub history: Vec<LogEntry>,
    pub banner: Option<String>,
    pub capture_error: Option<String>,
    pub alerts_fired: u64,
}

/// Result of a spawned `FrameSource::start`, tagged with the request it answers.
type CaptureStart = (u64, Result<CaptureInfo, CaptureError>);

pub struct Scanner {
    config: SchedulerConfig,
    ctx: ScannerContext,
    sync: ClockSynchronizer,
    gate: AnalysisGate,
    state: SignalState,
    outcome_rx: mpsc::UnboundedReceiver<AnalysisOutcome>,
    control_rx: Option<mpsc::Receiver<ControlCommand>>,
    capture_tx: mpsc::UnboundedSender<CaptureStart>,
    capture_rx: mpsc::UnboundedReceiver<CaptureStart>,
    /// Bumped by every start request and every stop; a start result from an
    /// older generation is stale.
    capture_generation: u64,
    capture_starting: bool,
    snapshot_tx: watch::Sender<ScannerSnapshot>,
    cycle: CycleState,
    phase: CyclePhase,
    banner: Option<String>,
    capture_error: Option<String>,
    alerts_fired: u64,
}

impl Scanner {
    pub fn new(config: SchedulerConfig, ctx: ScannerContext) -> Self {
        let (gate, outcome_rx) = AnalysisGate::new();
        let cycle = CycleState::at(ctx.clock.second_of_minute());
        let banner = ctx.classifier.configuration_warning();

        let snapshot = ScannerSnapshot {
            cycle,
            phase: CyclePhase::Idle,
            capture_active: ctx.frames.is_active(),
            capture_source: ctx.frames.label().to_string(),
            latest: None,
            history: Vec::new(),
            banner: banner.clone(),
            capture_error: None,
            alerts_fired: 0,
        };
        let (snapshot_tx, _) = watch::channel(snapshot);
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();

        Self {
            sync: ClockSynchronizer::new(config.trigger_offset_secs),
            state: SignalState::new(
                config.history_capacity,
                Duration::from_millis(config.signal_hold_ms),
            ),
            config,
            ctx,
            gate,
            outcome_rx,
            control_rx: None,
            capture_tx,
            capture_rx,
            capture_generation: 0,
            capture_starting: false,
            snapshot_tx,
            cycle,
            phase: CyclePhase::Idle,
            banner,
            capture_error: None,
            alerts_fired: 0,
        }
    }

    pub fn with_control(mut self, control_rx: mpsc::Receiver<ControlCommand>) -> Self {
        self.control_rx = Some(control_rx);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ScannerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Main loop. Returns on `Shutdown` or when the control channel closes.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "🚀 Starting candle scanner (trigger at :{:02}, hold {} ms)",
            self.config.trigger_offset_secs,
            self.state.hold().as_millis()
        );
        if let Some(banner) = &self.banner {
            warn!("🚩 {}", banner);
        }

        let mut tick_interval = interval(Duration::from_millis(self.config.tick_interval_ms));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut control_rx = self.control_rx.take();

        loop {
            let hold_deadline = self.state.active_until();

            tokio::select! {
                _ = tick_interval.tick() => {
                    self.handle_tick();
                }

                Some(outcome) = self.outcome_rx.recv() => {
                    self.handle_outcome(outcome);
                }

                Some((generation, result)) = self.capture_rx.recv() => {
                    self.handle_capture_started(generation, result);
                }

                _ = wait_for_deadline(hold_deadline) => {
                    self.handle_hold_elapsed(Instant::now());
                }

                command = next_command(&mut control_rx) => {
                    match command {
                        Some(ControlCommand::StartCapture) => {
                            self.request_capture_start();
                        }
                        Some(ControlCommand::StopCapture) => self.stop_capture(),
                        Some(ControlCommand::Shutdown) | None => {
                            info!("👋 Scanner shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.control_rx = control_rx;
        self.ctx.frames.stop();
        Ok(())
    }

    /// One clock tick: update the countdown and, on the trigger second,
    /// try to start an analysis.
    ///
    /// Must be called inside a tokio runtime: a trigger spawns the analysis task.
    pub fn handle_tick(&mut self) -> TickReport {
        let second = self.ctx.clock.second_of_minute();
        let tick = self.sync.tick(second);
        self.cycle = tick.cycle;

        let trigger = if tick.trigger {
            info!(
                "⏰ Trigger at :{:02}, candle opens in {}s",
                tick.cycle.second, tick.cycle.countdown
            );
            Some(self.try_trigger())
        } else {
            None
        };

        self.publish();
        TickReport {
            cycle: tick.cycle,
            trigger,
        }
    }

    /// Start an analysis if capture is active, none is in flight and no
    /// signal is being held. Spawns onto the current tokio runtime.
    pub fn try_trigger(&mut self) -> TriggerDecision {
        let permit = match self
            .gate
            .try_acquire(self.ctx.frames.is_active(), self.state.is_signal_active())
        {
            Ok(permit) => permit,
            Err(reason) => {
                debug!("⏭️  Analysis skipped: {:?}", reason);
                return TriggerDecision::Rejected(reason);
            }
        };

        tokio::spawn(run_analysis(
            permit,
            self.ctx.frames.clone(),
            self.ctx.classifier.clone(),
        ));
        self.publish();
        TriggerDecision::Started
    }

    /// Wait for the in-flight analysis to report and apply it.
    /// Returns false if no analysis can report any more.
    pub async fn process_next_outcome(&mut self) -> bool {
        match self.outcome_rx.recv().await {
            Some(outcome) => {
                self.handle_outcome(outcome);
                true
            }
            None => false,
        }
    }

    pub fn handle_outcome(&mut self, outcome: AnalysisOutcome) {
        self.gate.release();

        match outcome {
            AnalysisOutcome::Classified(result) => {
                info!(
                    "🧠 {} ({:.0}%) | {}",
                    result.signal, result.confidence, result.reasoning
                );
                let signal = result.signal;
                self.state.set_latest(result.clone());
                self.state.record_result(result);

                if signal.is_tradeable() && !self.state.is_signal_active() {
                    self.state.activate_signal(Instant::now());
                    self.alerts_fired += 1;
                    self.ctx.alerts.notify(signal);
                }
            }
            AnalysisOutcome::NoFrame => {
                debug!("📭 No frame available, skipping this candle");
            }
            AnalysisOutcome::Failed(reason) => {
                warn!("⚠️ Analysis failed, no signal this minute: {}", reason);
            }
            AnalysisOutcome::Abandoned => {
                error!("❌ Analysis task aborted, no signal this minute");
            }
        }

        self.publish();
    }

    /// Release the hold window once its deadline has passed.
    pub fn handle_hold_elapsed(&mut self, now: Instant) -> bool {
        let expired = self.state.expire_if_due(now);
        if expired {
            self.publish();
        }
        expired
    }

    /// Start capture and wait for the result. The run loop uses
    /// [`Scanner::request_capture_start`] instead so ticks keep flowing.
    pub async fn start_capture(&mut self) {
        if self.request_capture_start() {
            self.process_next_capture_result().await;
        }
    }

    /// Spawn `FrameSource::start`; the result comes back on the capture
    /// channel. Returns false if capture is already active or starting.
    pub fn request_capture_start(&mut self) -> bool {
        if self.ctx.frames.is_active() || self.capture_starting {
            debug!("Capture already active or starting");
            return false;
        }

        self.capture_generation += 1;
        self.capture_starting = true;
        let generation = self.capture_generation;
        let frames = self.ctx.frames.clone();
        let capture_tx = self.capture_tx.clone();
        tokio::spawn(async move {
            let result = frames.start().await;
            let _ = capture_tx.send((generation, result));
        });
        true
    }

    /// Wait for a pending capture start to report and apply it.
    pub async fn process_next_capture_result(&mut self) -> bool {
        match self.capture_rx.recv().await {
            Some((generation, result)) => {
                self.handle_capture_started(generation, result);
                true
            }
            None => false,
        }
    }

    fn handle_capture_started(
        &mut self,
        generation: u64,
        result: Result<CaptureInfo, CaptureError>,
    ) {
        if generation != self.capture_generation {
            debug!("Stale capture start (stopped while starting)");
            if result.is_ok() && !self.capture_starting {
                self.ctx.frames.stop();
            }
            self.publish();
            return;
        }
        self.capture_starting = false;

        match result {
            Ok(info) => {
                info!(
                    "✅ Capture authorised: {} ({}, HD: {})",
                    info.source, info.resolution, info.is_hd
                );
                self.capture_error = None;
            }
            Err(e) => {
                error!("❌ Could not start capture: {}", e);
                self.capture_error = Some(e.to_string());
            }
        }
        self.publish();
    }

    pub fn stop_capture(&mut self) {
        if self.capture_starting {
            self.capture_generation += 1;
            self.capture_starting = false;
        }
        self.ctx.frames.stop();
        self.publish();
    }

    pub fn phase(&self) -> CyclePhase {
        if self.gate.is_in_flight() {
            CyclePhase::Analyzing
        } else if self.state.is_signal_active() {
            CyclePhase::ActiveHold
        } else {
            CyclePhase::Idle
        }
    }

    pub fn state(&self) -> &SignalState {
        &self.state
    }

    pub fn synchronizer(&self) -> &ClockSynchronizer {
        &self.sync
    }

    pub fn is_analysis_in_flight(&self) -> bool {
        self.gate.is_in_flight()
    }

    pub fn alerts_fired(&self) -> u64 {
        self.alerts_fired
    }

    pub fn snapshot(&self) -> ScannerSnapshot {
        ScannerSnapshot {
            cycle: self.cycle,
            phase: self.phase(),
            capture_active: self.ctx.frames.is_active(),
            capture_source: self.ctx.frames.label().to_string(),
            latest: self.state.latest().cloned(),
            history: self.state.history().to_vec(),
            banner: self.banner.clone(),
            capture_error: self.capture_error.clone(),
            alerts_fired: self.alerts_fired,
        }
    }

    fn publish(&mut self) {
        let phase = self.phase();
        if phase != self.phase {
            debug!("🔁 Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Without a control channel the loop runs until the task is dropped.
async fn next_command(rx: &mut Option<mpsc::Receiver<ControlCommand>>) -> Option<ControlCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Body of one spawned analysis. The permit reports whatever happens,
/// including a panic inside the classifier.
async fn run_analysis(
    permit: InFlightPermit,
    frames: Arc<dyn FrameSource>,
    classifier: Arc<dyn SignalClassifier>,
) {
    let Some(frame) = frames.capture_frame().await else {
        permit.complete(AnalysisOutcome::NoFrame);
        return;
    };

    let outcome = match classifier.classify(&frame).await {
        Ok(result) => AnalysisOutcome::Classified(result),
        Err(e) => AnalysisOutcome::Failed(e.to_string()),
    };
    permit.complete(outcome);
}
