//! Sleep-cycle estimation and wake-time recommendations.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{SleepStage, StageSpan};
use crate::storage::SleepRecord;

pub const DEFAULT_CYCLE_MINUTES: u32 = 90;
const MIN_CYCLE_MINUTES: u32 = 60;
const MAX_CYCLE_MINUTES: u32 = 120;

/// Cycle counts offered as wake-up candidates.
pub const RECOMMENDED_CYCLES: [u32; 3] = [3, 4, 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeRecommendation {
    pub cycles: u32,
    pub wake_at: NaiveDateTime,
}

/// Mean spacing between REM episode onsets, clamped to a plausible range.
///
/// Returns `None` when the timeline holds fewer than two REM episodes.
pub fn estimate_cycle_minutes(stages: &[StageSpan]) -> Option<u32> {
    let mut onsets = Vec::new();
    let mut previous: Option<SleepStage> = None;
    for span in stages {
        if span.stage == SleepStage::Rem && previous != Some(SleepStage::Rem) {
            onsets.push(span.start);
        }
        previous = Some(span.stage);
    }
    if onsets.len() < 2 {
        return None;
    }

    let first = onsets.first()?;
    let last = onsets.last()?;
    let spacing = (*last - *first).num_minutes() / (onsets.len() as i64 - 1);
    let spacing = u32::try_from(spacing).ok()?;
    Some(spacing.clamp(MIN_CYCLE_MINUTES, MAX_CYCLE_MINUTES))
}

/// Wake times after 3, 4 and 5 cycles for a bedtime.
///
/// A bedtime earlier than `now` on the same day is taken to mean tomorrow.
pub fn recommend_wake_times(
    bedtime: NaiveTime,
    now: NaiveDateTime,
    cycle_minutes: Option<u32>,
) -> Vec<WakeRecommendation> {
    let cycle = cycle_minutes.unwrap_or(DEFAULT_CYCLE_MINUTES);
    let mut bed = now.date().and_time(bedtime);
    if bed < now {
        bed += Duration::days(1);
    }
    RECOMMENDED_CYCLES
        .iter()
        .map(|&cycles| WakeRecommendation {
            cycles,
            wake_at: bed + Duration::minutes(i64::from(cycle) * i64::from(cycles)),
        })
        .collect()
}

/// Mean total sleep over the given nights.
pub fn average_sleep_minutes(records: &[SleepRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let total: u64 = records.iter().map(|r| u64::from(r.total_minutes)).sum();
    Some(total as f64 / records.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn span(start: NaiveDateTime, stage: SleepStage, minutes: u32) -> StageSpan {
        StageSpan {
            start,
            stage,
            seconds: minutes * 60,
        }
    }

    #[test]
    fn cycle_from_rem_onsets() {
        let stages = vec![
            span(at(1, 23, 0), SleepStage::Light, 60),
            span(at(2, 0, 0), SleepStage::Rem, 10),
            span(at(2, 0, 10), SleepStage::Rem, 5),
            span(at(2, 0, 15), SleepStage::Deep, 70),
            span(at(2, 1, 40), SleepStage::Rem, 20),
            span(at(2, 2, 0), SleepStage::Light, 80),
            span(at(2, 3, 20), SleepStage::Rem, 20),
        ];
        // Onsets at 00:00, 01:40, 03:20 -> 100 minutes apart.
        assert_eq!(estimate_cycle_minutes(&stages), Some(100));
    }

    #[test]
    fn cycle_needs_two_rem_episodes_and_is_clamped() {
        let one = vec![span(at(2, 0, 0), SleepStage::Rem, 10)];
        assert_eq!(estimate_cycle_minutes(&one), None);

        let close = vec![
            span(at(2, 0, 0), SleepStage::Rem, 10),
            span(at(2, 0, 10), SleepStage::Light, 10),
            span(at(2, 0, 20), SleepStage::Rem, 10),
        ];
        assert_eq!(estimate_cycle_minutes(&close), Some(60));
    }

    #[test]
    fn past_bedtime_rolls_to_next_day() {
        let now = at(2, 23, 30);
        let bedtime = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let recs = recommend_wake_times(bedtime, now, None);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].cycles, 3);
        assert_eq!(recs[0].wake_at, at(4, 3, 30));
        assert_eq!(recs[2].wake_at, at(4, 6, 30));
    }

    #[test]
    fn custom_cycle_length_is_used() {
        let now = at(2, 21, 0);
        let bedtime = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let recs = recommend_wake_times(bedtime, now, Some(100));
        assert_eq!(recs[1].wake_at, at(3, 5, 40));
    }

    #[test]
    fn very_long_cycle_does_not_overflow() {
        let now = at(2, 21, 0);
        let bedtime = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let recs = recommend_wake_times(bedtime, now, Some(u32::MAX / 2));
        let expected = at(2, 23, 0) + Duration::minutes(i64::from(u32::MAX / 2) * 5);
        assert_eq!(recs[2].wake_at, expected);
    }

    #[test]
    fn average_of_recent_nights() {
        let record = |minutes| SleepRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            total_minutes: minutes,
            deep_minutes: 0,
            light_minutes: 0,
            rem_minutes: 0,
            wake_minutes: 0,
            efficiency: None,
        };
        assert_eq!(average_sleep_minutes(&[]), None);
        assert_eq!(average_sleep_minutes(&[record(400), record(440)]), Some(420.0));
    }
}
