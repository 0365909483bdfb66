use std::cmp::min;
use std::time::Duration;

use crate::config::RadioConfig;

/// The polling period of a peer, adapting to the peer's activity: While there was meaningful
///  traffic recently (i.e. fewer than `fast_window_ticks` idle ticks ago), the peer is polled at
///  `min_period`. After that, the period doubles with every tick up to `max_period`.
///
/// `last_update` counts idle ticks. It increases with every transaction that had no meaningful
///  result (failure, missing ack, 'nothing to report'), and it is reset to zero by meaningful
///  responses.
#[derive(Debug)]
pub struct AdaptivePeriod {
    last_update: u32,
    period: Duration,

    min_period: Duration,
    max_period: Duration,
    fast_window_ticks: u32,
}

impl AdaptivePeriod {
    pub fn new(config: &RadioConfig) -> AdaptivePeriod {
        AdaptivePeriod {
            last_update: 0,
            period: config.min_period,
            min_period: config.min_period,
            max_period: config.max_period,
            fast_window_ticks: config.fast_window_ticks(),
        }
    }

    /// Determine the period for the next tick. This is called exactly once per tick.
    pub fn next_period(&mut self) -> Duration {
        if self.last_update < self.fast_window_ticks {
            self.period = self.min_period;
        }
        else {
            self.period = min(self.period.saturating_mul(2), self.max_period);
        }
        self.period
    }

    pub fn on_idle(&mut self) {
        self.last_update = self.last_update.saturating_add(1);
    }

    pub fn on_meaningful(&mut self) {
        self.last_update = 0;
    }

    pub fn last_update(&self) -> u32 {
        self.last_update
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
