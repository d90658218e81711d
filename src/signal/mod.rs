pub mod state;
pub mod types;

pub use state::{SignalHistory, SignalState};
pub use types::{AnalysisResult, CandleStrength, LogEntry, MarketCondition, Signal, Trend, Zone};
