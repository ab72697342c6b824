//! SQLite-based storage for users, alarms, sleep logs and OAuth state.
//!
//! Provides persistent storage for:
//! - Users and their linked telemetry credential
//! - Alarms (owned by a user)
//! - Nightly sleep summaries
//! - PKCE verifiers of in-flight authorizations
//!
//! The connection sits behind a mutex so a single `Database` can be shared
//! by concurrent evaluations for different users.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, EngineStore};
use crate::alarm::Alarm;
use crate::error::{ConfigError, DatabaseError, EngineError};
use crate::integrations::oauth::Credential;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub subject_id: Option<String>,
    pub resting_heart_rate: Option<u32>,
}

/// Alarm fields supplied by the caller when creating an alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlarm {
    pub hour: u32,
    pub minute: u32,
    pub sound_nonrem: String,
    pub sound_rem: String,
}

impl NewAlarm {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.hour > 23 {
            return Err(EngineError::Configuration(format!(
                "hour must be 0-23, got {}",
                self.hour
            )));
        }
        if self.minute > 59 {
            return Err(EngineError::Configuration(format!(
                "minute must be 0-59, got {}",
                self.minute
            )));
        }
        if self.sound_nonrem.trim().is_empty() || self.sound_rem.trim().is_empty() {
            return Err(EngineError::Configuration(
                "both sounds must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// One night's sleep summary, keyed by (user, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub date: NaiveDate,
    pub total_minutes: u32,
    pub deep_minutes: u32,
    pub light_minutes: u32,
    pub rem_minutes: u32,
    pub wake_minutes: u32,
    pub efficiency: Option<u32>,
}

/// PKCE verifier waiting for its authorization callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub user_id: i64,
    pub verifier: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite database shared by the engine and the CLI.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/sunrise/sunrise.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e: ConfigError| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join("sunrise.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        Ok(self.conn.lock()?)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()?.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                email              TEXT NOT NULL UNIQUE,
                fitbit_user_id     TEXT UNIQUE,
                access_token       TEXT,
                refresh_token      TEXT,
                resting_heart_rate INTEGER
            );

            CREATE TABLE IF NOT EXISTS alarms (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER NOT NULL,
                hour         INTEGER NOT NULL,
                minute       INTEGER NOT NULL,
                is_on        INTEGER NOT NULL DEFAULT 1,
                sound_nonrem TEXT,
                sound_rem    TEXT,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS sleep_data (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       INTEGER NOT NULL,
                date          TEXT NOT NULL,
                total_minutes INTEGER NOT NULL,
                deep_minutes  INTEGER NOT NULL DEFAULT 0,
                light_minutes INTEGER NOT NULL DEFAULT 0,
                rem_minutes   INTEGER NOT NULL DEFAULT 0,
                wake_minutes  INTEGER NOT NULL DEFAULT 0,
                efficiency    INTEGER,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
                UNIQUE (user_id, date)
            );

            CREATE TABLE IF NOT EXISTS pending_authorizations (
                state      TEXT PRIMARY KEY,
                user_id    INTEGER NOT NULL,
                verifier   TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_alarms_user ON alarms(user_id);
            CREATE INDEX IF NOT EXISTS idx_sleep_data_user_date ON sleep_data(user_id, date);",
        )?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────

    pub fn create_user(&self, email: &str) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO users (email) VALUES (?1)", params![email])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, DatabaseError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, fitbit_user_id, resting_heart_rate FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(UserRecord {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        subject_id: row.get(2)?,
                        resting_heart_rate: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Remove the telemetry link and both tokens.
    pub fn clear_credential(&self, user_id: i64) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "UPDATE users SET access_token = NULL, refresh_token = NULL, fitbit_user_id = NULL
             WHERE id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    // ── Alarms ───────────────────────────────────────────────────────

    pub fn add_alarm(&self, user_id: i64, alarm: &NewAlarm) -> Result<Alarm, EngineError> {
        alarm.validate()?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO alarms (user_id, hour, minute, sound_nonrem, sound_rem)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                alarm.hour,
                alarm.minute,
                alarm.sound_nonrem,
                alarm.sound_rem
            ],
        )
        .map_err(DatabaseError::from)?;
        Ok(Alarm {
            id: conn.last_insert_rowid(),
            owner_id: user_id,
            hour: alarm.hour,
            minute: alarm.minute,
            enabled: true,
            sound_nonrem: Some(alarm.sound_nonrem.clone()),
            sound_rem: Some(alarm.sound_rem.clone()),
        })
    }

    /// All alarms of a user ordered by time of day.
    pub fn list_alarms(&self, user_id: i64) -> Result<Vec<Alarm>, DatabaseError> {
        self.query_alarms(
            "SELECT id, user_id, hour, minute, is_on, sound_nonrem, sound_rem
             FROM alarms WHERE user_id = ?1 ORDER BY hour, minute",
            user_id,
        )
    }

    /// Returns `true` if an alarm owned by `user_id` was deleted.
    pub fn delete_alarm(&self, user_id: i64, alarm_id: i64) -> Result<bool, DatabaseError> {
        let changes = self.conn()?.execute(
            "DELETE FROM alarms WHERE id = ?1 AND user_id = ?2",
            params![alarm_id, user_id],
        )?;
        Ok(changes > 0)
    }

    /// Returns `true` if an alarm owned by `user_id` was updated.
    pub fn set_alarm_enabled(
        &self,
        user_id: i64,
        alarm_id: i64,
        enabled: bool,
    ) -> Result<bool, DatabaseError> {
        let changes = self.conn()?.execute(
            "UPDATE alarms SET is_on = ?1 WHERE id = ?2 AND user_id = ?3",
            params![enabled, alarm_id, user_id],
        )?;
        Ok(changes > 0)
    }

    fn query_alarms(&self, sql: &str, user_id: i64) -> Result<Vec<Alarm>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Alarm {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                // Out-of-range rows surface as u32::MAX and never match.
                hour: u32::try_from(row.get::<_, i64>(2)?).unwrap_or(u32::MAX),
                minute: u32::try_from(row.get::<_, i64>(3)?).unwrap_or(u32::MAX),
                enabled: row.get::<_, i64>(4)? != 0,
                sound_nonrem: row.get(5)?,
                sound_rem: row.get(6)?,
            })
        })?;
        let mut alarms = Vec::new();
        for row in rows {
            alarms.push(row?);
        }
        Ok(alarms)
    }

    // ── Sleep data ───────────────────────────────────────────────────

    /// Store a night's summary. A second record for the same date is ignored.
    pub fn save_sleep_record(
        &self,
        user_id: i64,
        record: &SleepRecord,
    ) -> Result<bool, DatabaseError> {
        let changes = self.conn()?.execute(
            "INSERT OR IGNORE INTO sleep_data
                (user_id, date, total_minutes, deep_minutes, light_minutes,
                 rem_minutes, wake_minutes, efficiency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                record.date.format("%Y-%m-%d").to_string(),
                record.total_minutes,
                record.deep_minutes,
                record.light_minutes,
                record.rem_minutes,
                record.wake_minutes,
                record.efficiency,
            ],
        )?;
        Ok(changes > 0)
    }

    /// The `days` most recent records, oldest first.
    pub fn recent_sleep_records(
        &self,
        user_id: i64,
        days: u32,
    ) -> Result<Vec<SleepRecord>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date, total_minutes, deep_minutes, light_minutes, rem_minutes,
                    wake_minutes, efficiency
             FROM sleep_data WHERE user_id = ?1 ORDER BY date DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, days], |row| {
            let date: String = row.get(0)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;
            Ok(SleepRecord {
                date,
                total_minutes: row.get(1)?,
                deep_minutes: row.get(2)?,
                light_minutes: row.get(3)?,
                rem_minutes: row.get(4)?,
                wake_minutes: row.get(5)?,
                efficiency: row.get(6)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        records.reverse();
        Ok(records)
    }

    // ── Pending authorizations ───────────────────────────────────────

    /// Store the verifier for `state`, replacing any earlier attempt by the
    /// same user.
    pub fn put_pending_authorization(
        &self,
        state: &str,
        pending: &PendingAuthorization,
    ) -> Result<(), DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM pending_authorizations WHERE user_id = ?1",
            params![pending.user_id],
        )?;
        tx.execute(
            "INSERT INTO pending_authorizations (state, user_id, verifier, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                state,
                pending.user_id,
                pending.verifier,
                pending.created_at.to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove and return the verifier stored for `state`.
    pub fn take_pending_authorization(
        &self,
        state: &str,
    ) -> Result<Option<PendingAuthorization>, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT user_id, verifier, created_at FROM pending_authorizations WHERE state = ?1",
                params![state],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        tx.execute(
            "DELETE FROM pending_authorizations WHERE state = ?1",
            params![state],
        )?;
        tx.commit()?;

        let Some((user_id, verifier, created_at)) = row else {
            return Ok(None);
        };
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| DatabaseError::QueryFailed(format!("bad created_at: {e}")))?
            .with_timezone(&Utc);
        Ok(Some(PendingAuthorization {
            user_id,
            verifier,
            created_at,
        }))
    }

    /// Drop verifiers created before `cutoff`. Returns the number removed.
    pub fn purge_pending_authorizations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let removed = self.conn()?.execute(
            "DELETE FROM pending_authorizations WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }
}

impl EngineStore for Database {
    fn get_credential(&self, user_id: i64) -> Result<Option<Credential>, DatabaseError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT fitbit_user_id, access_token, refresh_token FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        Ok(match row {
            Some((Some(subject_id), Some(access_token), Some(refresh_token))) => Some(Credential {
                subject_id,
                access_token,
                refresh_token,
            }),
            _ => None,
        })
    }

    fn save_credential(&self, user_id: i64, credential: &Credential) -> Result<(), DatabaseError> {
        let changes = self.conn()?.execute(
            "UPDATE users SET access_token = ?1, refresh_token = ?2, fitbit_user_id = ?3
             WHERE id = ?4",
            params![
                credential.access_token,
                credential.refresh_token,
                credential.subject_id,
                user_id
            ],
        )?;
        if changes == 0 {
            return Err(DatabaseError::QueryFailed(format!("user {user_id} not found")));
        }
        Ok(())
    }

    fn replace_credential(
        &self,
        user_id: i64,
        expected_refresh: &str,
        credential: &Credential,
    ) -> Result<bool, DatabaseError> {
        let changes = self.conn()?.execute(
            "UPDATE users SET access_token = ?1, refresh_token = ?2, fitbit_user_id = ?3
             WHERE id = ?4 AND refresh_token = ?5",
            params![
                credential.access_token,
                credential.refresh_token,
                credential.subject_id,
                user_id,
                expected_refresh
            ],
        )?;
        Ok(changes == 1)
    }

    fn linked_subject(&self, user_id: i64) -> Result<Option<String>, DatabaseError> {
        let subject = self
            .conn()?
            .query_row(
                "SELECT fitbit_user_id FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(subject.flatten())
    }

    fn get_resting_rate(&self, subject_id: &str) -> Result<Option<u32>, DatabaseError> {
        let rate = self
            .conn()?
            .query_row(
                "SELECT resting_heart_rate FROM users WHERE fitbit_user_id = ?1",
                params![subject_id],
                |row| row.get::<_, Option<u32>>(0),
            )
            .optional()?;
        Ok(rate.flatten())
    }

    fn save_resting_rate(&self, subject_id: &str, rate: u32) -> Result<(), DatabaseError> {
        self.conn()?.execute(
            "UPDATE users SET resting_heart_rate = ?1 WHERE fitbit_user_id = ?2",
            params![rate, subject_id],
        )?;
        Ok(())
    }

    fn list_enabled_alarms(&self, user_id: i64) -> Result<Vec<Alarm>, DatabaseError> {
        self.query_alarms(
            "SELECT id, user_id, hour, minute, is_on, sound_nonrem, sound_rem
             FROM alarms WHERE user_id = ?1 AND is_on = 1 ORDER BY id",
            user_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential(access: &str, refresh: &str) -> Credential {
        Credential {
            subject_id: "ABC123".to_string(),
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    fn wake_alarm(hour: u32, minute: u32) -> NewAlarm {
        NewAlarm {
            hour,
            minute,
            sound_nonrem: "birds.mp3".to_string(),
            sound_rem: "chime.mp3".to_string(),
        }
    }

    #[test]
    fn credential_requires_all_fields() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user("a@example.com").unwrap();
        assert!(db.get_credential(user).unwrap().is_none());
        assert!(db.linked_subject(user).unwrap().is_none());

        db.save_credential(user, &credential("at-1", "rt-1")).unwrap();
        assert_eq!(db.get_credential(user).unwrap(), Some(credential("at-1", "rt-1")));
        assert_eq!(db.linked_subject(user).unwrap().as_deref(), Some("ABC123"));
    }

    #[test]
    fn replace_credential_is_compare_and_swap() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user("a@example.com").unwrap();
        db.save_credential(user, &credential("at-1", "rt-1")).unwrap();

        assert!(db
            .replace_credential(user, "rt-1", &credential("at-2", "rt-2"))
            .unwrap());
        // A second writer holding the stale refresh token loses.
        assert!(!db
            .replace_credential(user, "rt-1", &credential("at-3", "rt-3"))
            .unwrap());
        assert_eq!(db.get_credential(user).unwrap(), Some(credential("at-2", "rt-2")));
    }

    #[test]
    fn save_credential_for_missing_user_fails() {
        let db = Database::open_memory().unwrap();
        assert!(db.save_credential(42, &credential("a", "b")).is_err());
    }

    #[test]
    fn resting_rate_is_keyed_by_subject() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user("a@example.com").unwrap();
        db.save_credential(user, &credential("at", "rt")).unwrap();
        assert_eq!(db.get_resting_rate("ABC123").unwrap(), None);
        db.save_resting_rate("ABC123", 58).unwrap();
        assert_eq!(db.get_resting_rate("ABC123").unwrap(), Some(58));
        assert_eq!(db.get_resting_rate("OTHER").unwrap(), None);
    }

    #[test]
    fn alarms_crud_is_scoped_by_owner() {
        let db = Database::open_memory().unwrap();
        let alice = db.create_user("alice@example.com").unwrap();
        let bob = db.create_user("bob@example.com").unwrap();

        let late = db.add_alarm(alice, &wake_alarm(8, 30)).unwrap();
        let early = db.add_alarm(alice, &wake_alarm(6, 45)).unwrap();

        let listed = db.list_alarms(alice).unwrap();
        assert_eq!(listed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![early.id, late.id]);

        assert!(!db.set_alarm_enabled(bob, early.id, false).unwrap());
        assert!(db.set_alarm_enabled(alice, early.id, false).unwrap());
        let enabled = db.list_enabled_alarms(alice).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, late.id);

        assert!(!db.delete_alarm(bob, late.id).unwrap());
        assert!(db.delete_alarm(alice, late.id).unwrap());
        assert_eq!(db.list_alarms(alice).unwrap().len(), 1);
    }

    #[test]
    fn add_alarm_rejects_out_of_range_time() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user("a@example.com").unwrap();
        assert!(db.add_alarm(user, &wake_alarm(24, 0)).is_err());
        assert!(db.add_alarm(user, &wake_alarm(7, 60)).is_err());
    }

    #[test]
    fn sleep_records_insert_or_ignore_and_return_oldest_first() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user("a@example.com").unwrap();
        let base = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        for offset in 0..3 {
            let record = SleepRecord {
                date: base + Duration::days(offset),
                total_minutes: 400 + offset as u32,
                deep_minutes: 60,
                light_minutes: 250,
                rem_minutes: 80,
                wake_minutes: 10,
                efficiency: Some(92),
            };
            assert!(db.save_sleep_record(user, &record).unwrap());
        }
        let duplicate = SleepRecord {
            date: base,
            total_minutes: 1,
            deep_minutes: 0,
            light_minutes: 0,
            rem_minutes: 0,
            wake_minutes: 0,
            efficiency: None,
        };
        assert!(!db.save_sleep_record(user, &duplicate).unwrap());

        let recent = db.recent_sleep_records(user, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, base + Duration::days(1));
        assert_eq!(recent[1].total_minutes, 402);
    }

    #[test]
    fn pending_authorization_is_single_use() {
        let db = Database::open_memory().unwrap();
        let user = db.create_user("a@example.com").unwrap();
        let pending = PendingAuthorization {
            user_id: user,
            verifier: "verifier".to_string(),
            created_at: Utc::now(),
        };
        db.put_pending_authorization("state-1", &pending).unwrap();

        let taken = db.take_pending_authorization("state-1").unwrap().unwrap();
        assert_eq!(taken.verifier, "verifier");
        assert!(db.take_pending_authorization("state-1").unwrap().is_none());
    }

    #[test]
    fn new_attempt_replaces_earlier_verifier_of_same_user() {
        let db = Database::open_memory().unwrap();
        let alice = db.create_user("a@example.com").unwrap();
        let bob = db.create_user("b@example.com").unwrap();
        let pending = |user_id, verifier: &str| PendingAuthorization {
            user_id,
            verifier: verifier.to_string(),
            created_at: Utc::now(),
        };
        db.put_pending_authorization("alice-1", &pending(alice, "v1")).unwrap();
        db.put_pending_authorization("bob-1", &pending(bob, "vb")).unwrap();
        db.put_pending_authorization("alice-2", &pending(alice, "v2")).unwrap();

        assert!(db.take_pending_authorization("alice-1").unwrap().is_none());
        assert_eq!(db.take_pending_authorization("alice-2").unwrap().unwrap().verifier, "v2");
        assert!(db.take_pending_authorization("bob-1").unwrap().is_some());
    }

    #[test]
    fn purge_drops_only_stale_verifiers() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        for (state, age) in [("old", 30), ("fresh", 1)] {
            let user = db.create_user(&format!("{state}@example.com")).unwrap();
            db.put_pending_authorization(
                state,
                &PendingAuthorization {
                    user_id: user,
                    verifier: state.to_string(),
                    created_at: now - Duration::minutes(age),
                },
            )
            .unwrap();
        }
        assert_eq!(db.purge_pending_authorizations(now - Duration::minutes(10)).unwrap(), 1);
        assert!(db.take_pending_authorization("fresh").unwrap().is_some());
    }
}
