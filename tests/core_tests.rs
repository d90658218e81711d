use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use candle_signal_agent::alerts::AlertEmitter;
use candle_signal_agent::capture::{CaptureError, CaptureInfo, Frame, FrameSource};
use candle_signal_agent::classifier::{ClassifierError, SignalClassifier};
use candle_signal_agent::config::SchedulerConfig;
use candle_signal_agent::scanner::{
    ControlCommand, CyclePhase, Scanner, ScannerContext, TriggerDecision,
};
use candle_signal_agent::scheduler::{GateRejection, ManualClock};
use candle_signal_agent::signal::{AnalysisResult, Signal};
use candle_signal_agent::simulation::{ScriptStep, ScriptedClassifier, SimulatedFrameSource};

#[derive(Default)]
struct CountingAlert {
    fired: Mutex<Vec<Signal>>,
}

impl CountingAlert {
    fn fired(&self) -> Vec<Signal> {
        self.fired.lock().unwrap().clone()
    }
}

impl AlertEmitter for CountingAlert {
    fn notify(&self, signal: Signal) {
        self.fired.lock().unwrap().push(signal);
    }
}

struct PanickingClassifier;

#[async_trait]
impl SignalClassifier for PanickingClassifier {
    async fn classify(&self, _frame: &Frame) -> Result<AnalysisResult, ClassifierError> {
        panic!("classifier blew up");
    }
}

/// Simulated source whose `start` takes as long as a slow capture probe.
struct SlowStartSource {
    inner: SimulatedFrameSource,
    delay: Duration,
}

#[async_trait]
impl FrameSource for SlowStartSource {
    async fn start(&self) -> Result<CaptureInfo, CaptureError> {
        tokio::time::sleep(self.delay).await;
        self.inner.start().await
    }

    fn stop(&self) {
        self.inner.stop()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    async fn capture_frame(&self) -> Option<Frame> {
        self.inner.capture_frame().await
    }

    fn label(&self) -> &str {
        self.inner.label()
    }
}

fn slow_start_scanner(
    classifier: Arc<dyn SignalClassifier>,
    second: u32,
) -> (Scanner, Arc<SlowStartSource>) {
    let frames = Arc::new(SlowStartSource {
        inner: SimulatedFrameSource::new(),
        delay: Duration::from_secs(5),
    });
    let scanner = Scanner::new(
        SchedulerConfig::default(),
        ScannerContext {
            frames: frames.clone(),
            classifier,
            alerts: Arc::new(CountingAlert::default()),
            clock: Arc::new(ManualClock::new(second)),
        },
    );
    (scanner, frames)
}

struct Harness {
    clock: ManualClock,
    frames: Arc<SimulatedFrameSource>,
    alerts: Arc<CountingAlert>,
    scanner: Scanner,
}

fn harness_with(
    config: SchedulerConfig,
    classifier: Arc<dyn SignalClassifier>,
    second: u32,
) -> Harness {
    let clock = ManualClock::new(second);
    let frames = Arc::new(SimulatedFrameSource::new());
    let alerts = Arc::new(CountingAlert::default());
    let scanner = Scanner::new(
        config,
        ScannerContext {
            frames: frames.clone(),
            classifier,
            alerts: alerts.clone(),
            clock: Arc::new(clock.clone()),
        },
    );
    Harness {
        clock,
        frames,
        alerts,
        scanner,
    }
}

fn harness(classifier: Arc<dyn SignalClassifier>) -> Harness {
    harness_with(SchedulerConfig::default(), classifier, 0)
}

fn respond(signal: Signal, confidence: f64) -> ScriptStep {
    ScriptStep::Respond { signal, confidence }
}

impl Harness {
    /// Roll into the next minute and land on the trigger second.
    fn tick_to_trigger(&mut self) -> Option<TriggerDecision> {
        self.clock.set_second(0);
        assert!(self.scanner.handle_tick().trigger.is_none());
        self.clock.set_second(self.scanner.synchronizer().trigger_offset());
        self.scanner.handle_tick().trigger
    }
}

#[tokio::test(start_paused = true)]
async fn test_buy_signal_end_to_end() {
    let config = SchedulerConfig {
        trigger_offset_secs: 57,
        ..SchedulerConfig::default()
    };
    let classifier = Arc::new(ScriptedClassifier::new(vec![respond(Signal::Buy, 90.0)]));
    let mut h = harness_with(config, classifier.clone(), 0);
    h.scanner.start_capture().await;

    h.clock.set_second(56);
    let report = h.scanner.handle_tick();
    assert!(report.trigger.is_none());
    assert_eq!(report.cycle.countdown, 4);

    h.clock.set_second(57);
    let report = h.scanner.handle_tick();
    assert_eq!(report.trigger, Some(TriggerDecision::Started));
    assert_eq!(report.cycle.countdown, 3);
    assert_eq!(h.scanner.phase(), CyclePhase::Analyzing);

    assert!(h.scanner.process_next_outcome().await);
    assert_eq!(h.scanner.phase(), CyclePhase::ActiveHold);
    assert_eq!(h.alerts.fired(), vec![Signal::Buy]);

    let snapshot = h.scanner.snapshot();
    assert_eq!(snapshot.latest.as_ref().map(|r| r.signal), Some(Signal::Buy));
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.history[0].result.confidence, 90.0);
    assert_eq!(snapshot.alerts_fired, 1);
    assert_eq!(h.scanner.alerts_fired(), 1);

    // Still inside the 60 s hold when :57 comes around again.
    assert_eq!(
        h.tick_to_trigger(),
        Some(TriggerDecision::Rejected(GateRejection::SignalActive))
    );
    assert_eq!(classifier.calls(), 1);
    assert_eq!(h.alerts.fired().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_is_recorded_without_hold() {
    let mut h = harness(Arc::new(ScriptedClassifier::new(vec![respond(
        Signal::Wait,
        40.0,
    )])));
    h.scanner.start_capture().await;

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    h.scanner.process_next_outcome().await;

    assert_eq!(h.scanner.phase(), CyclePhase::Idle);
    assert_eq!(h.scanner.state().history().len(), 1);
    assert_eq!(h.scanner.state().latest().map(|r| r.signal), Some(Signal::Wait));
    assert!(h.alerts.fired().is_empty());

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
}

#[tokio::test(start_paused = true)]
async fn test_classifier_failure_leaves_state_untouched() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![
        ScriptStep::Fail("upstream 503".to_string()),
        respond(Signal::Wait, 20.0),
    ]));
    let mut h = harness(classifier.clone());
    h.scanner.start_capture().await;

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    h.scanner.process_next_outcome().await;

    assert!(!h.scanner.is_analysis_in_flight());
    assert!(h.scanner.state().latest().is_none());
    assert!(h.scanner.state().history().is_empty());
    assert!(h.alerts.fired().is_empty());

    // Gate is open again for the next candle.
    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    h.scanner.process_next_outcome().await;
    assert_eq!(h.scanner.state().history().len(), 1);
    assert_eq!(classifier.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_analysis_blocks_next_trigger() {
    let classifier = Arc::new(
        ScriptedClassifier::new(vec![respond(Signal::Wait, 30.0)])
            .with_latency(Duration::from_secs(90)),
    );
    let mut h = harness(classifier.clone());
    h.scanner.start_capture().await;

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    assert_eq!(
        h.tick_to_trigger(),
        Some(TriggerDecision::Rejected(GateRejection::InFlight))
    );

    h.scanner.process_next_outcome().await;
    assert!(!h.scanner.is_analysis_in_flight());
    assert_eq!(h.scanner.state().history().len(), 1);
    assert_eq!(classifier.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inactive_capture_skips_until_started() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![respond(Signal::Wait, 10.0)]));
    let mut h = harness(classifier.clone());

    assert_eq!(
        h.tick_to_trigger(),
        Some(TriggerDecision::Rejected(GateRejection::CaptureInactive))
    );
    assert!(h.scanner.synchronizer().has_fired_this_minute());
    assert_eq!(classifier.calls(), 0);

    h.scanner.start_capture().await;
    let snapshot = h.scanner.snapshot();
    assert!(snapshot.capture_active);
    assert_eq!(snapshot.capture_source, "Simulated chart");

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    h.scanner.process_next_outcome().await;
    assert_eq!(classifier.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_capture_disables_triggers() {
    let mut h = harness(Arc::new(ScriptedClassifier::new(vec![])));
    h.scanner.start_capture().await;
    h.scanner.stop_capture();

    assert!(!h.scanner.snapshot().capture_active);
    assert_eq!(
        h.tick_to_trigger(),
        Some(TriggerDecision::Rejected(GateRejection::CaptureInactive))
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_frame_skips_cycle() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![respond(Signal::Buy, 95.0)]));
    let mut h = harness(classifier.clone());
    h.scanner.start_capture().await;
    h.frames.set_frames_available(false);

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    h.scanner.process_next_outcome().await;

    assert_eq!(classifier.calls(), 0);
    assert!(h.scanner.state().history().is_empty());
    assert_eq!(h.scanner.phase(), CyclePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_classifier_releases_gate() {
    let mut h = harness(Arc::new(PanickingClassifier));
    h.scanner.start_capture().await;

    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
    assert!(h.scanner.process_next_outcome().await);

    assert!(!h.scanner.is_analysis_in_flight());
    assert!(h.scanner.state().history().is_empty());
    assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
}

#[tokio::test(start_paused = true)]
async fn test_history_keeps_newest_within_capacity() {
    let config = SchedulerConfig {
        history_capacity: 3,
        ..SchedulerConfig::default()
    };
    let steps = (1..=5).map(|i| respond(Signal::Wait, i as f64)).collect();
    let mut h = harness_with(config, Arc::new(ScriptedClassifier::new(steps)), 0);
    h.scanner.start_capture().await;

    for _ in 0..5 {
        assert_eq!(h.tick_to_trigger(), Some(TriggerDecision::Started));
        h.scanner.process_next_outcome().await;
    }

    let confidences: Vec<f64> = h
        .scanner
        .state()
        .history()
        .iter()
        .map(|e| e.result.confidence)
        .collect();
    assert_eq!(confidences, vec![5.0, 4.0, 3.0]);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_holds_signal_for_exactly_the_hold_window() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![respond(Signal::Buy, 88.0)]));
    let mut h = harness_with(SchedulerConfig::default(), classifier, 58);
    h.scanner.start_capture().await;

    let (control_tx, control_rx) = mpsc::channel(4);
    let mut scanner = h.scanner.with_control(control_rx);
    let mut snapshots = scanner.subscribe();
    let frames = h.frames.clone();

    let start = Instant::now();
    let handle = tokio::spawn(async move { scanner.run().await });

    while snapshots.borrow_and_update().phase != CyclePhase::ActiveHold {
        snapshots.changed().await.unwrap();
    }
    assert_eq!(h.alerts.fired(), vec![Signal::Buy]);

    tokio::time::sleep_until(start + Duration::from_millis(59_999)).await;
    assert_eq!(snapshots.borrow().phase, CyclePhase::ActiveHold);

    while snapshots.borrow_and_update().phase == CyclePhase::ActiveHold {
        snapshots.changed().await.unwrap();
    }
    assert_eq!(start.elapsed(), Duration::from_millis(60_000));
    assert!(snapshots.borrow().latest.is_none());
    assert_eq!(snapshots.borrow().history.len(), 1);

    control_tx.send(ControlCommand::Shutdown).await.unwrap();
    handle.await.unwrap().unwrap();
    assert!(!frames.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_slow_capture_start_does_not_delay_hold_release() {
    let classifier = Arc::new(ScriptedClassifier::new(vec![respond(Signal::Buy, 88.0)]));
    let (mut scanner, frames) = slow_start_scanner(classifier, 58);
    scanner.start_capture().await;
    assert!(frames.is_active());

    let (control_tx, control_rx) = mpsc::channel(4);
    let mut scanner = scanner.with_control(control_rx);
    let mut snapshots = scanner.subscribe();

    let start = Instant::now();
    let handle = tokio::spawn(async move { scanner.run().await });

    while snapshots.borrow_and_update().phase != CyclePhase::ActiveHold {
        snapshots.changed().await.unwrap();
    }

    // Restart capture one second before the hold ends; the probe takes 5 s.
    tokio::time::sleep_until(start + Duration::from_secs(59)).await;
    control_tx.send(ControlCommand::StopCapture).await.unwrap();
    control_tx.send(ControlCommand::StartCapture).await.unwrap();

    while snapshots.borrow_and_update().phase == CyclePhase::ActiveHold {
        snapshots.changed().await.unwrap();
    }
    assert_eq!(start.elapsed(), Duration::from_millis(60_000));
    assert!(!snapshots.borrow().capture_active);

    while !snapshots.borrow_and_update().capture_active {
        snapshots.changed().await.unwrap();
    }
    assert_eq!(start.elapsed(), Duration::from_secs(64));

    control_tx.send(ControlCommand::Shutdown).await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_starting_discards_start() {
    let (mut scanner, frames) =
        slow_start_scanner(Arc::new(ScriptedClassifier::new(vec![])), 0);

    assert!(scanner.request_capture_start());
    assert!(!scanner.request_capture_start());
    scanner.stop_capture();

    assert!(scanner.process_next_capture_result().await);
    assert!(!frames.is_active());
    assert!(!scanner.snapshot().capture_active);

    scanner.start_capture().await;
    assert!(frames.is_active());
}
