use serde::Serialize;
use tracing::debug;

pub const SECONDS_PER_CANDLE: u32 = 60;

/// Position inside the current one-minute candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleState {
    pub second: u32,
    /// Seconds until the next candle opens. 60 at second 0.
    pub countdown: u32,
}

impl CycleState {
    pub fn at(second: u32) -> Self {
        let second = second % SECONDS_PER_CANDLE;
        Self {
            second,
            countdown: SECONDS_PER_CANDLE - second,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTick {
    pub cycle: CycleState,
    /// True on the single tick per minute that should attempt an analysis.
    pub trigger: bool,
}

/// Aligns the one-second tick to the candle boundary and raises one trigger
/// per minute at `trigger_offset`.
///
/// Missed ticks are not compensated: if the offset second is skipped, that
/// minute never triggers.
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    trigger_offset: u32,
    fired_this_minute: bool,
}

impl ClockSynchronizer {
    pub fn new(trigger_offset: u32) -> Self {
        Self {
            trigger_offset,
            fired_this_minute: false,
        }
    }

    pub fn tick(&mut self, second: u32) -> CycleTick {
        let cycle = CycleState::at(second);

        if cycle.second == 0 && self.fired_this_minute {
            debug!("🕐 Candle opened, trigger re-armed");
            self.fired_this_minute = false;
        }

        let trigger = cycle.second == self.trigger_offset && !self.fired_this_minute;
        if trigger {
            self.fired_this_minute = true;
        }

        CycleTick { cycle, trigger }
    }

    pub fn has_fired_this_minute(&self) -> bool {
        self.fired_this_minute
    }

    pub fn trigger_offset(&self) -> u32 {
        self.trigger_offset
    }
}
