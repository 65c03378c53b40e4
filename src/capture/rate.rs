// SPDX-License-Identifier: MIT
const NANOSECONDS_IN_SECOND: f64 = 1_000_000_000.0;

/// Windowed events-per-second estimate.
///
/// The first tick only records a reference timestamp. Every `window`
/// further ticks the rate is recomputed from the time spent on that window;
/// between window boundaries [`rate`](Self::rate) holds the last value.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    window: u32,
    last_timestamp: Option<i64>,
    window_count: u32,
    current_rate: f64,
}

impl RateEstimator {
    /// A window of zero is treated as one.
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            last_timestamp: None,
            window_count: 0,
            current_rate: 0.0,
        }
    }

    /// Feeds one event timestamp (nanoseconds) and returns the current rate.
    pub fn tick(&mut self, timestamp_ns: i64) -> f64 {
        let Some(last) = self.last_timestamp else {
            self.last_timestamp = Some(timestamp_ns);
            self.current_rate = 0.0;
            return self.current_rate;
        };

        self.window_count += 1;
        if self.window_count == self.window {
            let elapsed = timestamp_ns.saturating_sub(last);
            self.current_rate = if elapsed > 0 {
                #[allow(clippy::cast_precision_loss)]
                let elapsed = elapsed as f64;
                f64::from(self.window) * NANOSECONDS_IN_SECOND / elapsed
            } else {
                0.0
            };
            self.window_count = 0;
            self.last_timestamp = Some(timestamp_ns);
        }
        self.current_rate
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.current_rate
    }

    #[must_use]
    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn reset(&mut self) {
        self.last_timestamp = None;
        self.window_count = 0;
        self.current_rate = 0.0;
    }
}
