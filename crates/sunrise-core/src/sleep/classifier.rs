//! Heart-rate based sleep-depth classification.
//!
//! The latest reading is compared against the resting baseline: at or below
//! resting counts as deep sleep, `AWAKE_MARGIN_BPM` above it as awake, and
//! the score falls linearly in between.

use serde::{Deserialize, Serialize};

use super::HeartRateSample;

/// Beats above resting at which the sleeper is treated as awake.
pub const AWAKE_MARGIN_BPM: f64 = 20.0;

/// Sleep depth in `[0.0, 1.0]`; 1.0 is deepest.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SleepDepth(f64);

impl SleepDepth {
    /// Used whenever telemetry is missing.
    pub const NEUTRAL: SleepDepth = SleepDepth(0.5);
    pub const DEEPEST: SleepDepth = SleepDepth(1.0);
    pub const LIGHTEST: SleepDepth = SleepDepth(0.0);

    /// Clamp any finite value into range; NaN becomes neutral.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NEUTRAL;
        }
        SleepDepth(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for SleepDepth {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Score the latest sample against the resting baseline.
pub fn classify(resting_rate: Option<u32>, samples: &[HeartRateSample]) -> SleepDepth {
    let (Some(resting), Some(latest)) = (resting_rate, samples.last()) else {
        return SleepDepth::NEUTRAL;
    };
    let awake_ratio = (f64::from(latest.bpm) - f64::from(resting)) / AWAKE_MARGIN_BPM;
    SleepDepth::new(1.0 - awake_ratio)
}
