//! End-to-end alarm tests: account linking, telemetry, classification,
//! mix planning and rendering wired together against a mock provider.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{FixedOffset, TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use sunrise_core::alarm::{AlarmEngine, EngineOptions};
use sunrise_core::integrations::{AuthorizationFlow, FitbitClient, OAuthClient};
use sunrise_core::mixer::{RenderGateway, RenderRequest, Source};
use sunrise_core::storage::{Database, EngineStore, NewAlarm, ProviderConfig};
use sunrise_core::{OAuthError, RenderError, SleepDepth};

#[derive(Default)]
struct RecordingGateway {
    requests: Mutex<Vec<RenderRequest>>,
}

impl RenderGateway for RecordingGateway {
    async fn render(&self, request: RenderRequest) -> Result<PathBuf, RenderError> {
        let dest = request.dest.clone();
        self.requests.lock().unwrap().push(request);
        Ok(dest)
    }
}

fn provider(server: &ServerGuard) -> ProviderConfig {
    ProviderConfig {
        client_id: "23ABCD".into(),
        client_secret: "s3cret".into(),
        token_url: format!("{}/oauth2/token", server.url()),
        api_base_url: server.url(),
        ..ProviderConfig::default()
    }
}

fn options() -> EngineOptions {
    EngineOptions {
        utc_offset: FixedOffset::east_opt(9 * 3600).unwrap(),
        pan_enabled: true,
        sounds_dir: PathBuf::from("sounds"),
        output_dir: PathBuf::from("rendered"),
        output_extension: "mp3".into(),
        render_timeout: Duration::from_secs(5),
    }
}

async fn link_account(db: &Database, server: &mut ServerGuard, user: i64) {
    server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "authorization_code".into(),
        ))
        .with_status(200)
        .with_body(r#"{"access_token":"at-1","refresh_token":"rt-1","user_id":"SUBJ","expires_in":28800}"#)
        .expect(1)
        .create_async()
        .await;

    let oauth = OAuthClient::new(provider(server));
    let flow = AuthorizationFlow::new(db, &oauth, 10);
    let now = Utc::now();
    let request = flow.begin(user, now).unwrap();
    let (linked, credential) = flow.complete(&request.state, "code-1", now).await.unwrap();
    assert_eq!(linked, user);
    assert_eq!(credential.subject_id, "SUBJ");
}

#[tokio::test]
async fn test_awake_sleeper_gets_rem_sound_with_pan() {
    let mut server = Server::new_async().await;
    let db = Arc::new(Database::open_memory().unwrap());
    let user = db.create_user("sleeper@example.com").unwrap();
    link_account(&db, &mut server, user).await;
    let alarm = db
        .add_alarm(
            user,
            &NewAlarm {
                hour: 7,
                minute: 0,
                sound_nonrem: "birds.mp3".into(),
                sound_rem: "chime.mp3".into(),
            },
        )
        .unwrap();

    server
        .mock("GET", "/1/user/-/profile.json")
        .match_header("authorization", "Bearer at-1")
        .with_status(200)
        .with_body(r#"{"user":{"restingHeartRate":55}}"#)
        .create_async()
        .await;
    server
        .mock(
            "GET",
            "/1/user/-/activities/heart/date/2024-03-02/1d/1min/time/06:45/07:00.json",
        )
        .with_status(200)
        .with_body(
            r#"{"activities-heart-intraday":{"dataset":[
                {"time":"06:58:00","value":60},{"time":"06:59:00","value":75}
            ]}}"#,
        )
        .create_async()
        .await;

    let telemetry = FitbitClient::new(db.clone(), &provider(&server), 15);
    let engine = AlarmEngine::new(db.clone(), telemetry, RecordingGateway::default(), options());

    // 07:00 local in UTC+9.
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
    let decision = engine.evaluate(user, now).await.unwrap();

    assert!(decision.should_fire);
    let fired = decision.fired.unwrap();
    assert_eq!(fired.alarm_id, alarm.id);
    assert_eq!(fired.sleep_depth, SleepDepth::LIGHTEST);
    assert_eq!(fired.plan.gain_nonrem, 0.0);
    assert_eq!(fired.plan.gain_rem, 1.0);
    assert!(fired.plan.pan.is_some());
    assert_eq!(fired.plan.dominant(), Source::Rem);
    assert!(!fired.telemetry_fallback);
    assert_eq!(db.get_resting_rate("SUBJ").unwrap(), Some(55));

    let requests = engine_requests(&engine);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_rem, PathBuf::from("sounds/chime.mp3"));
    assert_eq!(
        requests[0].dest,
        PathBuf::from(format!("rendered/alarm-{user}-{}-202403020700.mp3", alarm.id))
    );

    // Polling again within the same minute does not render twice.
    let again = engine
        .evaluate(user, now + chrono::Duration::seconds(40))
        .await
        .unwrap();
    assert!(!again.should_fire);
}

#[tokio::test]
async fn test_revoked_account_still_wakes_the_user() {
    let mut server = Server::new_async().await;
    let db = Arc::new(Database::open_memory().unwrap());
    let user = db.create_user("sleeper@example.com").unwrap();
    link_account(&db, &mut server, user).await;
    db.add_alarm(
        user,
        &NewAlarm {
            hour: 7,
            minute: 0,
            sound_nonrem: "birds.mp3".into(),
            sound_rem: "chime.mp3".into(),
        },
    )
    .unwrap();

    server
        .mock("GET", Matcher::Regex(r"^/1/user/-/".into()))
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/oauth2/token")
        .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
        .with_status(401)
        .with_body(r#"{"errors":[{"errorType":"invalid_grant","message":"revoked"}]}"#)
        .create_async()
        .await;

    let telemetry = FitbitClient::new(db.clone(), &provider(&server), 15);
    let gateway = RecordingGateway::default();
    let engine = AlarmEngine::new(db, telemetry, gateway, options());
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
    let fired = engine.evaluate(user, now).await.unwrap().fired.unwrap();

    assert_eq!(fired.sleep_depth, SleepDepth::NEUTRAL);
    assert!(fired.telemetry_fallback);
    assert!(fired.reauthorization_required);
    assert_eq!(fired.plan.gain_nonrem, 0.5);
    assert_eq!(fired.plan.gain_rem, 0.5);
}

#[tokio::test]
async fn test_authorization_callback_is_single_use() {
    let mut server = Server::new_async().await;
    let db = Database::open_memory().unwrap();
    let user = db.create_user("sleeper@example.com").unwrap();
    link_account(&db, &mut server, user).await;

    let oauth = OAuthClient::new(provider(&server));
    let flow = AuthorizationFlow::new(&db, &oauth, 10);
    let now = Utc::now();
    let request = flow.begin(user, now).unwrap();
    assert!(request.url.as_str().contains("code_challenge_method=S256"));

    let late = now + chrono::Duration::minutes(11);
    assert!(matches!(
        flow.complete(&request.state, "code-2", late).await,
        Err(OAuthError::AuthorizationExpired)
    ));
    // The verifier was consumed by the expired attempt.
    assert!(matches!(
        flow.complete(&request.state, "code-2", now).await,
        Err(OAuthError::AuthorizationExpired)
    ));
}

fn engine_requests<S, T>(engine: &AlarmEngine<S, T, RecordingGateway>) -> Vec<RenderRequest> {
    engine.gateway().requests.lock().unwrap().clone()
}
