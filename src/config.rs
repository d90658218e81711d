use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub classifier: ClassifierConfig,
    pub capture: CaptureConfig,
    pub alerts: AlertConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Second of the minute at which the analysis fires (58 = two seconds before the candle opens).
    pub trigger_offset_secs: u32,
    pub signal_hold_ms: u64,
    pub tick_interval_ms: u64,
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub allow_sell: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    pub command: String,
    /// When set, frames are read from this file instead of running `command`.
    pub file: Option<String>,
    pub source_label: String,
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    pub sound_command: Option<String>,
    pub speech_command: Option<String>,
    pub buy_message: String,
    pub sell_message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    pub simulation_mode: bool,
    pub auto_start_capture: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger_offset_secs: 58,
            signal_hold_ms: 60_000,
            tick_interval_ms: 1_000,
            history_capacity: 25,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            trigger_offset_secs: env::var("TRIGGER_OFFSET_SECS")
                .unwrap_or_else(|_| defaults.trigger_offset_secs.to_string())
                .parse()
                .unwrap_or(defaults.trigger_offset_secs),
            signal_hold_ms: env::var("SIGNAL_HOLD_MS")
                .unwrap_or_else(|_| defaults.signal_hold_ms.to_string())
                .parse()
                .unwrap_or(defaults.signal_hold_ms),
            tick_interval_ms: env::var("TICK_INTERVAL_MS")
                .unwrap_or_else(|_| defaults.tick_interval_ms.to_string())
                .parse()
                .unwrap_or(defaults.tick_interval_ms),
            history_capacity: env::var("HISTORY_CAPACITY")
                .unwrap_or_else(|_| defaults.history_capacity.to_string())
                .parse()
                .unwrap_or(defaults.history_capacity),
        };

        let classifier = ClassifierConfig {
            api_key: env::var("VISION_API_KEY")
                .or_else(|_| env::var("OPENROUTER_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            api_url: env::var("VISION_API_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1/chat/completions".to_string()),
            model: env::var("VISION_MODEL")
                .unwrap_or_else(|_| "google/gemini-2.5-pro".to_string()),
            temperature: env::var("VISION_TEMPERATURE")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .unwrap_or(0.1),
            timeout_secs: env::var("VISION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            allow_sell: env::var("ALLOW_SELL_SIGNALS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        };

        let capture = CaptureConfig {
            command: env::var("CAPTURE_COMMAND")
                .unwrap_or_else(|_| "grim -t jpeg -".to_string()),
            file: env::var("CAPTURE_FILE").ok().filter(|p| !p.trim().is_empty()),
            source_label: env::var("CAPTURE_SOURCE_LABEL")
                .unwrap_or_else(|_| "Selected chart".to_string()),
            max_consecutive_failures: env::var("CAPTURE_MAX_FAILURES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        };

        let alerts = AlertConfig {
            sound_command: env::var("ALERT_SOUND_COMMAND").ok(),
            speech_command: env::var("ALERT_SPEECH_COMMAND").ok(),
            buy_message: env::var("ALERT_BUY_MESSAGE")
                .unwrap_or_else(|_| "Sinal de compra identificado! Prepare a entrada.".to_string()),
            sell_message: env::var("ALERT_SELL_MESSAGE")
                .unwrap_or_else(|_| "Sinal de venda identificado! Prepare a entrada.".to_string()),
        };

        let agent = AgentConfig {
            simulation_mode: env::var("SIMULATION_MODE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            auto_start_capture: env::var("AUTO_START_CAPTURE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        };

        let config = Config {
            scheduler,
            classifier,
            capture,
            alerts,
            agent,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scheduler;
        if !(1..=59).contains(&s.trigger_offset_secs) {
            anyhow::bail!(
                "TRIGGER_OFFSET_SECS must be between 1 and 59, got {}",
                s.trigger_offset_secs
            );
        }
        if s.signal_hold_ms == 0 {
            anyhow::bail!("SIGNAL_HOLD_MS must be greater than zero");
        }
        if s.tick_interval_ms == 0 {
            anyhow::bail!("TICK_INTERVAL_MS must be greater than zero");
        }
        if s.history_capacity == 0 {
            anyhow::bail!("HISTORY_CAPACITY must be greater than zero");
        }
        Ok(())
    }
}
