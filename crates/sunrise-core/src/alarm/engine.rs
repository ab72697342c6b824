use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike, Utc};

use super::trigger::{find_due, FiredAlarm, TriggerDecision, TriggerPhase};
use super::Alarm;
use crate::error::{ConfigError, EngineError, RenderError, TelemetryError};
use crate::integrations::TelemetrySource;
use crate::mixer::{build_plan, RenderGateway, RenderRequest};
use crate::sleep::{classify, SleepDepth};
use crate::storage::{EngineSettings, EngineStore};

/// Engine settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub utc_offset: FixedOffset,
    pub pan_enabled: bool,
    pub sounds_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_extension: String,
    pub render_timeout: Duration,
}

impl EngineOptions {
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            utc_offset: settings.utc_offset()?,
            pan_enabled: settings.pan_enabled,
            sounds_dir: settings.sounds_dir.clone(),
            output_dir: settings.output_dir.clone(),
            output_extension: settings.output_extension.clone(),
            render_timeout: settings.render_timeout(),
        })
    }
}

/// Last minute each alarm fired, so repeated polls in one minute render once.
#[derive(Default)]
struct FireLedger {
    fired: Mutex<HashMap<i64, i64>>,
}

impl FireLedger {
    /// Returns `false` if the alarm already fired in `minute`.
    fn claim(&self, alarm_id: i64, minute: i64) -> bool {
        let mut fired = self.fired.lock().unwrap_or_else(|p| p.into_inner());
        if fired.get(&alarm_id) == Some(&minute) {
            return false;
        }
        fired.insert(alarm_id, minute);
        true
    }

    fn release(&self, alarm_id: i64, minute: i64) {
        let mut fired = self.fired.lock().unwrap_or_else(|p| p.into_inner());
        if fired.get(&alarm_id) == Some(&minute) {
            fired.remove(&alarm_id);
        }
    }
}

/// Decides, once per poll, whether a user's alarm fires and renders its sound.
///
/// Safe to share between tasks evaluating different users.
pub struct AlarmEngine<S, T, G> {
    store: Arc<S>,
    telemetry: T,
    gateway: G,
    options: EngineOptions,
    ledger: FireLedger,
}

impl<S, T, G> AlarmEngine<S, T, G> {
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<S, T, G> AlarmEngine<S, T, G>
where
    S: EngineStore,
    T: TelemetrySource,
    G: RenderGateway,
{
    pub fn new(store: Arc<S>, telemetry: T, gateway: G, options: EngineOptions) -> Self {
        Self {
            store,
            telemetry,
            gateway,
            options,
            ledger: FireLedger::default(),
        }
    }

    /// Wall-clock time in the deployment's zone.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.options.utc_offset).naive_local()
    }

    /// Evaluate the user's alarms at `now`.
    pub async fn evaluate(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TriggerDecision, EngineError> {
        let Some(subject_id) = self.store.linked_subject(user_id)? else {
            tracing::debug!(user_id, "no linked telemetry account, not firing");
            return Ok(TriggerDecision::idle());
        };

        let local = self.local_time(now);
        let alarms = self.store.list_enabled_alarms(user_id)?;
        let Some(due) = find_due(&alarms, local.hour(), local.minute()) else {
            return Ok(TriggerDecision::idle());
        };
        let alarm = due.alarm;
        if !due.also_due.is_empty() {
            tracing::warn!(
                user_id,
                alarm_id = alarm.id,
                skipped = ?due.also_due,
                "several alarms due in the same minute, firing the lowest id"
            );
        }

        let minute = now.timestamp().div_euclid(60);
        if !self.ledger.claim(alarm.id, minute) {
            tracing::debug!(user_id, alarm_id = alarm.id, "alarm already fired this minute");
            return Ok(TriggerDecision::idle());
        }
        tracing::debug!(user_id, alarm_id = alarm.id, phase = ?TriggerPhase::Matched);

        let result = self.fire(user_id, &subject_id, alarm, local).await;
        if result.is_err() {
            self.ledger.release(alarm.id, minute);
        }
        result
    }

    async fn fire(
        &self,
        user_id: i64,
        subject_id: &str,
        alarm: &Alarm,
        local: NaiveDateTime,
    ) -> Result<TriggerDecision, EngineError> {
        let sources = (
            self.resolve_sound(alarm, alarm.sound_nonrem.as_deref())?,
            self.resolve_sound(alarm, alarm.sound_rem.as_deref())?,
        );

        let (sleep_depth, telemetry_fallback, reauthorization_required) =
            match self.telemetry.heart_snapshot(user_id, subject_id, local).await {
                Ok(snapshot) => (classify(snapshot.resting_rate, &snapshot.samples), false, false),
                Err(err) => {
                    let reauth = matches!(err, TelemetryError::ReauthorizationRequired { .. });
                    tracing::warn!(
                        user_id,
                        alarm_id = alarm.id,
                        error = %err,
                        "telemetry unavailable, using neutral sleep depth"
                    );
                    (SleepDepth::NEUTRAL, true, reauth)
                }
            };

        let plan = build_plan(sleep_depth, self.options.pan_enabled);
        let dest = self.options.output_dir.join(format!(
            "alarm-{user_id}-{}-{}.{}",
            alarm.id,
            local.format("%Y%m%d%H%M"),
            self.options.output_extension
        ));
        tracing::info!(
            user_id,
            alarm_id = alarm.id,
            score = sleep_depth.value(),
            gain_nonrem = plan.gain_nonrem,
            gain_rem = plan.gain_rem,
            pan = plan.pan.is_some(),
            phase = ?TriggerPhase::Rendering,
            "rendering alarm sound"
        );

        let request = RenderRequest {
            source_nonrem: sources.0.clone(),
            source_rem: sources.1.clone(),
            plan: plan.clone(),
            dest,
        };
        let timeout = self.options.render_timeout;
        let rendered_path = match tokio::time::timeout(timeout, self.gateway.render(request)).await {
            Ok(Ok(path)) => path,
            Ok(Err(source)) => {
                return Err(EngineError::RenderFailed {
                    alarm_id: alarm.id,
                    source,
                })
            }
            Err(_) => {
                return Err(EngineError::RenderFailed {
                    alarm_id: alarm.id,
                    source: RenderError::TimedOut {
                        secs: timeout.as_secs(),
                    },
                })
            }
        };

        tracing::info!(
            user_id,
            alarm_id = alarm.id,
            path = %rendered_path.display(),
            phase = ?TriggerPhase::Fired,
            "alarm fired"
        );
        Ok(TriggerDecision::fire(FiredAlarm {
            alarm_id: alarm.id,
            sleep_depth,
            plan,
            sources,
            rendered_path,
            telemetry_fallback,
            reauthorization_required,
        }))
    }

    /// Map a sound identifier to a file inside the sounds directory.
    fn resolve_sound(&self, alarm: &Alarm, sound: Option<&str>) -> Result<PathBuf, EngineError> {
        let sound = sound.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            EngineError::Configuration(format!("alarm {} has no sound configured", alarm.id))
        })?;
        let is_plain_name = Path::new(sound)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            && !sound.contains(['/', '\\']);
        if !is_plain_name {
            return Err(EngineError::Configuration(format!(
                "alarm {} sound '{sound}' is not a plain file name",
                alarm.id
            )));
        }
        Ok(self.options.sounds_dir.join(sound))
    }
}
