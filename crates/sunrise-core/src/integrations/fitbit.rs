//! Fitbit Web API telemetry client.
//!
//! Every endpoint goes through [`AuthSession::fetch_with_auth`], so expired
//! access tokens are refreshed transparently. Responses are mapped onto the
//! crate's sleep types; provider-specific JSON shapes stay in this file.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::oauth::OAuthClient;
use super::session::AuthSession;
use crate::error::{ApiError, TelemetryError};
use crate::sleep::{HeartRateSample, SleepLog, SleepStage, StageSpan};
use crate::storage::{EngineStore, ProviderConfig};

/// Resting baseline plus the recent intraday readings for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartSnapshot {
    pub resting_rate: Option<u32>,
    pub samples: Vec<HeartRateSample>,
}

/// Source of the physiological signals the alarm engine classifies.
pub trait TelemetrySource: Send + Sync {
    /// Fetch the resting rate and recent samples ending at `now_local`.
    fn heart_snapshot(
        &self,
        user_id: i64,
        subject_id: &str,
        now_local: NaiveDateTime,
    ) -> impl Future<Output = Result<HeartSnapshot, TelemetryError>> + Send;
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SleepResponse {
    #[serde(default)]
    sleep: Vec<SleepEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepEntry {
    date_of_sleep: NaiveDate,
    #[serde(default)]
    is_main_sleep: bool,
    #[serde(default)]
    minutes_asleep: u32,
    #[serde(default)]
    efficiency: Option<u32>,
    #[serde(default)]
    levels: Option<Levels>,
}

#[derive(Debug, Default, Deserialize)]
struct Levels {
    #[serde(default)]
    summary: HashMap<String, LevelSummary>,
    #[serde(default)]
    data: Vec<LevelEntry>,
}

#[derive(Debug, Deserialize)]
struct LevelSummary {
    #[serde(default)]
    minutes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LevelEntry {
    date_time: NaiveDateTime,
    level: String,
    seconds: u32,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: ProfileUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUser {
    #[serde(default)]
    resting_heart_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IntradayResponse {
    #[serde(rename = "activities-heart-intraday")]
    intraday: IntradaySeries,
}

#[derive(Debug, Deserialize)]
struct IntradaySeries {
    #[serde(default)]
    dataset: Vec<IntradayPoint>,
}

#[derive(Debug, Deserialize)]
struct IntradayPoint {
    time: NaiveTime,
    value: u32,
}

impl SleepEntry {
    fn into_log(self) -> SleepLog {
        let levels = self.levels.unwrap_or_default();
        let minutes = |key: &str| levels.summary.get(key).map(|s| s.minutes).unwrap_or(0);
        let stages = levels
            .data
            .iter()
            .filter_map(|entry| {
                Some(StageSpan {
                    start: entry.date_time,
                    stage: SleepStage::from_level(&entry.level)?,
                    seconds: entry.seconds,
                })
            })
            .collect();
        SleepLog {
            date: self.date_of_sleep,
            minutes_asleep: self.minutes_asleep,
            deep_minutes: minutes("deep"),
            light_minutes: minutes("light"),
            rem_minutes: minutes("rem"),
            wake_minutes: minutes("wake"),
            efficiency: self.efficiency,
            stages,
        }
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────

/// Map an HTTP status onto the session's failure classes.
pub(crate) fn classify_status(status: StatusCode) -> Option<ApiError> {
    if status.is_success() {
        None
    } else if status == StatusCode::UNAUTHORIZED {
        Some(ApiError::Unauthorized)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(ApiError::Transient(format!("HTTP {status}")))
    } else {
        Some(ApiError::Permanent(format!("HTTP {status}")))
    }
}

async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    token: String,
) -> Result<T, ApiError> {
    let resp = http.get(url).bearer_auth(token).send().await.map_err(|e| {
        if e.is_decode() {
            ApiError::Permanent(e.to_string())
        } else {
            ApiError::Transient(e.to_string())
        }
    })?;
    if let Some(err) = classify_status(resp.status()) {
        return Err(err);
    }
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Permanent(format!("unexpected response body: {e}")))
}

/// Start of the intraday window, clamped to local midnight.
fn window_start(now_local: NaiveDateTime, window_minutes: u32) -> NaiveDateTime {
    let start = now_local - Duration::minutes(i64::from(window_minutes));
    if start.date() != now_local.date() {
        now_local.date().and_time(NaiveTime::MIN)
    } else {
        start
    }
}

// ── Client ───────────────────────────────────────────────────────────

pub struct FitbitClient<S> {
    session: AuthSession<S>,
    http: Client,
    api_base: String,
    window_minutes: u32,
}

impl<S: EngineStore> FitbitClient<S> {
    pub fn new(store: Arc<S>, config: &ProviderConfig, window_minutes: u32) -> Self {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            session: AuthSession::new(store, OAuthClient::new(config.clone())),
            http,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            window_minutes,
        }
    }

    pub fn session(&self) -> &AuthSession<S> {
        &self.session
    }

    /// Main sleep log for `date`, or the first log when none is flagged main.
    pub async fn sleep_log(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<SleepLog>, TelemetryError> {
        let url = format!("{}/1.2/user/-/sleep/date/{}.json", self.api_base, date.format("%Y-%m-%d"));
        let resp: SleepResponse = self
            .session
            .fetch_with_auth(user_id, |token| get_json(&self.http, &url, token))
            .await?;

        let mut entries = resp.sleep;
        let main = entries
            .iter()
            .position(|e| e.is_main_sleep)
            .unwrap_or(0);
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(entries.swap_remove(main).into_log()))
    }

    /// Resting heart rate from the user's profile, if the provider has one.
    pub async fn resting_heart_rate(&self, user_id: i64) -> Result<Option<u32>, TelemetryError> {
        let url = format!("{}/1/user/-/profile.json", self.api_base);
        let resp: ProfileResponse = self
            .session
            .fetch_with_auth(user_id, |token| get_json(&self.http, &url, token))
            .await?;
        Ok(resp.user.resting_heart_rate)
    }

    /// Per-minute heart rate over the configured window ending at `now_local`,
    /// oldest first.
    pub async fn recent_heart_rate(
        &self,
        user_id: i64,
        now_local: NaiveDateTime,
    ) -> Result<Vec<HeartRateSample>, TelemetryError> {
        let start = window_start(now_local, self.window_minutes);
        let date = now_local.date();
        let url = format!(
            "{}/1/user/-/activities/heart/date/{}/1d/1min/time/{}/{}.json",
            self.api_base,
            date.format("%Y-%m-%d"),
            start.format("%H:%M"),
            now_local.format("%H:%M"),
        );
        let resp: IntradayResponse = self
            .session
            .fetch_with_auth(user_id, |token| get_json(&self.http, &url, token))
            .await?;

        let mut samples: Vec<HeartRateSample> = resp
            .intraday
            .dataset
            .into_iter()
            .map(|p| HeartRateSample {
                timestamp: date.and_time(p.time),
                bpm: p.value,
            })
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }
}

impl<S: EngineStore> TelemetrySource for FitbitClient<S> {
    async fn heart_snapshot(
        &self,
        user_id: i64,
        subject_id: &str,
        now_local: NaiveDateTime,
    ) -> Result<HeartSnapshot, TelemetryError> {
        let store = self.session.store();
        let resting_rate = match store.get_resting_rate(subject_id)? {
            Some(rate) => Some(rate),
            None => {
                let fetched = self.resting_heart_rate(user_id).await?;
                if let Some(rate) = fetched {
                    store.save_resting_rate(subject_id, rate)?;
                    tracing::debug!(user_id, rate, "resting heart rate backfilled from profile");
                }
                fetched
            }
        };
        let samples = self.recent_heart_rate(user_id, now_local).await?;
        Ok(HeartSnapshot {
            resting_rate,
            samples,
        })
    }
}
