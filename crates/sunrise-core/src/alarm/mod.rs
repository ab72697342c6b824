//! Alarms and the adaptive alarm engine.
//!
//! ## Evaluation
//!
//! ```text
//! Idle -> Matched -> Rendering -> Fired
//!   \-> Idle (no alarm due, no linked account, already fired this minute)
//! ```
//!
//! Each call to [`AlarmEngine::evaluate`] is a fresh evaluation against the
//! wall clock; the caller polls it at most once per minute per user.

mod engine;
mod trigger;

pub use engine::{AlarmEngine, EngineOptions};
pub use trigger::{find_due, DueAlarm, FiredAlarm, TriggerDecision, TriggerPhase};

use serde::{Deserialize, Serialize};

/// A stored alarm. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i64,
    pub owner_id: i64,
    pub hour: u32,
    pub minute: u32,
    pub enabled: bool,
    pub sound_nonrem: Option<String>,
    pub sound_rem: Option<String>,
}

impl Alarm {
    pub fn is_well_formed(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }

    pub fn is_due_at(&self, hour: u32, minute: u32) -> bool {
        self.enabled && self.hour == hour && self.minute == minute
    }
}
