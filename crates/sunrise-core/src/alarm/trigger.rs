use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Alarm;
use crate::mixer::MixPlan;
use crate::sleep::SleepDepth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPhase {
    Idle,
    Matched,
    Rendering,
    Fired,
}

/// The alarm chosen for this minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueAlarm<'a> {
    pub alarm: &'a Alarm,
    /// Ids of other alarms due in the same minute, which are not fired.
    pub also_due: Vec<i64>,
}

/// Pick the enabled alarm due at `hour:minute`, lowest id first.
pub fn find_due(alarms: &[Alarm], hour: u32, minute: u32) -> Option<DueAlarm<'_>> {
    let mut due: Vec<&Alarm> = Vec::new();
    for alarm in alarms {
        if !alarm.is_well_formed() {
            tracing::warn!(
                alarm_id = alarm.id,
                hour = alarm.hour,
                minute = alarm.minute,
                "skipping alarm with out-of-range time"
            );
            continue;
        }
        if alarm.is_due_at(hour, minute) {
            due.push(alarm);
        }
    }
    due.sort_by_key(|a| a.id);

    let (first, rest) = due.split_first()?;
    Some(DueAlarm {
        alarm: first,
        also_due: rest.iter().map(|a| a.id).collect(),
    })
}

/// Details of an alarm that fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiredAlarm {
    pub alarm_id: i64,
    pub sleep_depth: SleepDepth,
    pub plan: MixPlan,
    pub sources: (PathBuf, PathBuf),
    pub rendered_path: PathBuf,
    /// Telemetry was unavailable and the neutral score was used.
    pub telemetry_fallback: bool,
    /// The user's refresh token was rejected; prompt them to reconnect.
    pub reauthorization_required: bool,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub should_fire: bool,
    pub fired: Option<FiredAlarm>,
}

impl TriggerDecision {
    pub fn idle() -> Self {
        Self {
            should_fire: false,
            fired: None,
        }
    }

    pub fn fire(fired: FiredAlarm) -> Self {
        Self {
            should_fire: true,
            fired: Some(fired),
        }
    }
}
