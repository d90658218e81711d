pub mod clock;
pub mod gate;
pub mod sync;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use gate::{AnalysisGate, AnalysisOutcome, GateRejection, InFlightPermit};
pub use sync::{ClockSynchronizer, CycleState, CycleTick};
