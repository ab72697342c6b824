//! Sleep-domain types and the pure computations over them.
//!
//! - [`classifier`]: heart-rate based sleep-depth score used at alarm time
//! - [`cycle`]: sleep-cycle estimation and wake-time recommendations

pub mod classifier;
pub mod cycle;

pub use classifier::{classify, SleepDepth, AWAKE_MARGIN_BPM};
pub use cycle::{average_sleep_minutes, estimate_cycle_minutes, recommend_wake_times, WakeRecommendation};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::storage::SleepRecord;

/// One intraday heart-rate reading, in the deployment's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub timestamp: NaiveDateTime,
    pub bpm: u32,
}

/// Sleep stage as reported in the provider's stage timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStage {
    Wake,
    Light,
    Deep,
    Rem,
}

impl SleepStage {
    pub fn from_level(level: &str) -> Option<Self> {
        match level {
            "wake" | "awake" | "restless" => Some(SleepStage::Wake),
            "light" | "asleep" => Some(SleepStage::Light),
            "deep" => Some(SleepStage::Deep),
            "rem" => Some(SleepStage::Rem),
            _ => None,
        }
    }
}

/// A contiguous stretch of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpan {
    pub start: NaiveDateTime,
    pub stage: SleepStage,
    pub seconds: u32,
}

/// A night's main sleep log as fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepLog {
    pub date: NaiveDate,
    pub minutes_asleep: u32,
    pub deep_minutes: u32,
    pub light_minutes: u32,
    pub rem_minutes: u32,
    pub wake_minutes: u32,
    pub efficiency: Option<u32>,
    pub stages: Vec<StageSpan>,
}

impl SleepLog {
    pub fn to_record(&self) -> SleepRecord {
        SleepRecord {
            date: self.date,
            total_minutes: self.minutes_asleep,
            deep_minutes: self.deep_minutes,
            light_minutes: self.light_minutes,
            rem_minutes: self.rem_minutes,
            wake_minutes: self.wake_minutes,
            efficiency: self.efficiency,
        }
    }
}
