use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::signal::AnalysisResult;

/// How an analysis attempt ended. Every permit produces exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Classified(AnalysisResult),
    /// The frame source had nothing to hand over; the cycle is skipped.
    NoFrame,
    Failed(String),
    /// The task ended without reporting, e.g. it panicked.
    Abandoned,
}

/// Why a trigger did not start an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    CaptureInactive,
    InFlight,
    SignalActive,
}

/// Single-flight guard for the analysis pipeline.
///
/// The in-flight flag is set by [`AnalysisGate::try_acquire`] and cleared by
/// [`AnalysisGate::release`] when the owner consumes the outcome the permit
/// delivered.
pub struct AnalysisGate {
    in_flight: bool,
    outcome_tx: mpsc::UnboundedSender<AnalysisOutcome>,
}

impl AnalysisGate {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AnalysisOutcome>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        (
            Self {
                in_flight: false,
                outcome_tx,
            },
            outcome_rx,
        )
    }

    pub fn try_acquire(
        &mut self,
        capture_active: bool,
        signal_active: bool,
    ) -> Result<InFlightPermit, GateRejection> {
        if !capture_active {
            return Err(GateRejection::CaptureInactive);
        }
        if self.in_flight {
            return Err(GateRejection::InFlight);
        }
        if signal_active {
            return Err(GateRejection::SignalActive);
        }

        self.in_flight = true;
        debug!("🚦 Gate closed, analysis in flight");
        Ok(InFlightPermit {
            outcome_tx: Some(self.outcome_tx.clone()),
        })
    }

    pub fn release(&mut self) {
        self.in_flight = false;
        debug!("🚦 Gate open");
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Scoped token for one analysis. Dropping it without calling
/// [`InFlightPermit::complete`] reports [`AnalysisOutcome::Abandoned`], so the
/// gate is always released.
#[must_use = "dropping the permit reports the analysis as abandoned"]
pub struct InFlightPermit {
    outcome_tx: Option<mpsc::UnboundedSender<AnalysisOutcome>>,
}

impl InFlightPermit {
    pub fn complete(mut self, outcome: AnalysisOutcome) {
        if let Some(tx) = self.outcome_tx.take() {
            if tx.send(outcome).is_err() {
                debug!("Scanner gone, analysis outcome dropped");
            }
        }
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        if let Some(tx) = self.outcome_tx.take() {
            warn!("⚠️ Analysis task ended without an outcome, releasing gate");
            let _ = tx.send(AnalysisOutcome::Abandoned);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let (mut gate, mut rx) = AnalysisGate::new();

        let permit = gate.try_acquire(true, false).unwrap();
        assert!(gate.is_in_flight());
        assert_eq!(gate.try_acquire(true, false).err(), Some(GateRejection::InFlight));

        permit.complete(AnalysisOutcome::NoFrame);
        assert_eq!(rx.try_recv().unwrap(), AnalysisOutcome::NoFrame);
        gate.release();

        assert!(!gate.is_in_flight());
        assert!(gate.try_acquire(true, false).is_ok());
    }

    #[test]
    fn test_preconditions() {
        let (mut gate, _rx) = AnalysisGate::new();
        assert_eq!(gate.try_acquire(false, false).err(), Some(GateRejection::CaptureInactive));
        assert_eq!(gate.try_acquire(true, true).err(), Some(GateRejection::SignalActive));
        assert!(!gate.is_in_flight());
    }

    #[test]
    fn test_dropped_permit_reports_abandoned() {
        let (mut gate, mut rx) = AnalysisGate::new();
        let permit = gate.try_acquire(true, false).unwrap();
        drop(permit);
        assert_eq!(rx.try_recv().unwrap(), AnalysisOutcome::Abandoned);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_panicking_task_still_reports() {
        let (mut gate, mut rx) = AnalysisGate::new();
        let permit = gate.try_acquire(true, false).unwrap();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            panic!("classifier blew up");
        });
        assert!(handle.await.is_err());

        assert_eq!(rx.recv().await, Some(AnalysisOutcome::Abandoned));
    }
}
