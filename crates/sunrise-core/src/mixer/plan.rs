//! Declarative mix plan built from a sleep-depth score.
//!
//! The non-REM source is weighted by the score and the REM source by its
//! complement, so both are always present. With panning enabled the mixed
//! signal sweeps from full left to full right over [`PAN_SWEEP_SECS`] using
//! an equal-power curve and then stays right.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::sleep::SleepDepth;

pub const PAN_SWEEP_SECS: u32 = 30;

/// Stereo gains at one instant of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanPoint {
    pub offset_secs: f64,
    pub left: f64,
    pub right: f64,
}

/// Equal-power left-to-right sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanAutomation {
    pub sweep_secs: u32,
    /// One control point per second over the sweep, in time order.
    pub points: Vec<PanPoint>,
}

impl PanAutomation {
    pub fn sweep(sweep_secs: u32) -> Self {
        let sweep_secs = sweep_secs.max(1);
        let points = (0..=sweep_secs)
            .map(|s| Self::point_at(sweep_secs, f64::from(s)))
            .collect();
        Self { sweep_secs, points }
    }

    /// Gains at `t` seconds after mix start.
    pub fn gains_at(&self, t: f64) -> (f64, f64) {
        let p = Self::point_at(self.sweep_secs, t);
        (p.left, p.right)
    }

    fn point_at(sweep_secs: u32, t: f64) -> PanPoint {
        let progress = (t / f64::from(sweep_secs)).clamp(0.0, 1.0);
        let theta = progress * FRAC_PI_2;
        PanPoint {
            offset_secs: t,
            left: theta.cos(),
            right: theta.sin(),
        }
    }
}

/// What the render backend should do with the two sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixPlan {
    pub gain_nonrem: f64,
    pub gain_rem: f64,
    /// `None` means the gain-adjusted sources are simply summed.
    pub pan: Option<PanAutomation>,
}

impl MixPlan {
    /// The source that is louder in this plan.
    pub fn dominant(&self) -> Source {
        if self.gain_rem > self.gain_nonrem {
            Source::Rem
        } else {
            Source::NonRem
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    NonRem,
    Rem,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Build the plan for a score.
pub fn build_plan(score: SleepDepth, pan_enabled: bool) -> MixPlan {
    let s = score.value();
    MixPlan {
        gain_nonrem: round2(s),
        gain_rem: round2(1.0 - s),
        pan: pan_enabled.then(|| PanAutomation::sweep(PAN_SWEEP_SECS)),
    }
}
