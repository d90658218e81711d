use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional call returned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Wait,
}

impl Signal {
    /// Buy and Sell are tradeable; Wait never starts a hold.
    pub fn is_tradeable(&self) -> bool {
        matches!(self, Signal::Buy | Signal::Sell)
    }
}

impl From<String> for Signal {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "BUY" | "CALL" => Signal::Buy,
            "SELL" | "PUT" => Signal::Sell,
            _ => Signal::Wait,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Wait => write!(f, "WAIT"),
        }
    }
}

/// Chart pattern zone spotted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Zone {
    X,
    N,
    M,
    W,
    Z,
    None,
}

impl From<String> for Zone {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "X" => Zone::X,
            "N" => Zone::N,
            "M" => Zone::M,
            "W" => Zone::W,
            "Z" => Zone::Z,
            _ => Zone::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum MarketCondition {
    #[serde(rename = "Zona Zero")]
    ZeroZone,
    Normal,
    #[serde(rename = "Manipulação")]
    Manipulation,
}

impl From<String> for MarketCondition {
    fn from(raw: String) -> Self {
        let lowered = raw.trim().to_lowercase();
        if lowered.starts_with("zona") || lowered.starts_with("zero") {
            MarketCondition::ZeroZone
        } else if lowered.starts_with("manipula") {
            MarketCondition::Manipulation
        } else {
            MarketCondition::Normal
        }
    }
}

/// Trend line direction: LTA is an ascending trend line, LTB a descending one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Trend {
    #[serde(rename = "LTA")]
    Up,
    #[serde(rename = "LTB")]
    Down,
    Neutral,
}

impl From<String> for Trend {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "LTA" | "UP" | "BULLISH" => Trend::Up,
            "LTB" | "DOWN" | "BEARISH" => Trend::Down,
            _ => Trend::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum CandleStrength {
    Weak,
    Medium,
    Strong,
}

impl From<String> for CandleStrength {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "strong" => CandleStrength::Strong,
            "medium" => CandleStrength::Medium,
            _ => CandleStrength::Weak,
        }
    }
}

/// Structured interpretation of one chart frame.
///
/// Field names follow the JSON the vision model is asked to produce, so the
/// same type is used on the wire and in the scanner state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub signal: Signal,
    pub confidence: f64,
    pub reasoning: String,
    pub momentum_crossing: bool,
    pub williams_crossing: bool,
    pub rsi_value: f64,
    #[serde(rename = "zoneDetected")]
    pub zone: Zone,
    pub condition: MarketCondition,
    pub trend: Trend,
    pub multi_timeframe_confirmation: bool,
    pub candle_strength: CandleStrength,
    /// Capture time in epoch millis. The model never sends it; the classifier stamps it.
    #[serde(default)]
    pub timestamp: i64,
}

impl AnalysisResult {
    /// Neutral result used by the simulator and as a test baseline.
    pub fn neutral(timestamp: i64) -> Self {
        Self {
            signal: Signal::Wait,
            confidence: 0.0,
            reasoning: "Waiting for the M1 candle to open".to_string(),
            momentum_crossing: false,
            williams_crossing: false,
            rsi_value: 0.0,
            zone: Zone::None,
            condition: MarketCondition::Normal,
            trend: Trend::Neutral,
            multi_timeframe_confirmation: false,
            candle_strength: CandleStrength::Weak,
            timestamp,
        }
    }

    pub fn with_signal(mut self, signal: Signal, confidence: f64) -> Self {
        self.signal = signal;
        self.confidence = confidence;
        self
    }
}

/// History row: a result plus a unique id. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    #[serde(flatten)]
    pub result: AnalysisResult,
}
