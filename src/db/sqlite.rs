// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite store with typed operations.
//!
//! Provides high-level operations for:
//! - Accounts (OAuth tokens and ingestion cursor)
//! - Activities (insert-if-absent, keyed on the Strava activity ID)
//! - Weather observations (one per activity)
//! - Report aggregates (activities joined with weather)
//!
//! Every public operation opens its own connection and closes it on return, so
//! no connection is ever held across an `.await` in the async handlers.

use crate::db::tables;
use crate::error::AppError;
use crate::models::{
    Account, Activity, ConditionAggregate, LatLng, ReportGrouping, ReportMetric, StackedCount,
    WeatherObservation,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::time::Duration;

const SCHEMA_VERSION: i64 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_ACTIVITY: &str = "SELECT a.activity_id, a.athlete_id, a.name, a.start_date_local,
        a.start_date, a.distance, a.moving_time, t.name, a.start_lat, a.start_long
     FROM activities AS a
     JOIN activity_types AS t ON a.type_id = t.id";

/// Handle on the SQLite database file.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring the schema
    /// up to date.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let db = Self { path: path.into() };
        db.init_schema()?;
        tracing::info!(path = %db.path.display(), "Database ready");
        Ok(db)
    }

    fn connect(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.path).map_err(|e| {
            AppError::Database(format!(
                "Failed to open database {}: {}",
                self.path.display(),
                e
            ))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<(), AppError> {
        let conn = self.connect()?;
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS accounts (
                    athlete_id INTEGER PRIMARY KEY,
                    access_token TEXT NOT NULL,
                    refresh_token TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    next_page INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS activity_types (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS activities (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    activity_id INTEGER NOT NULL UNIQUE,
                    athlete_id INTEGER NOT NULL,
                    name TEXT NOT NULL DEFAULT '',
                    start_date_local TEXT NOT NULL,
                    start_date TEXT,
                    distance REAL NOT NULL DEFAULT 0,
                    moving_time INTEGER NOT NULL DEFAULT 0,
                    type_id INTEGER NOT NULL REFERENCES activity_types(id),
                    start_lat REAL,
                    start_long REAL
                );

                CREATE TABLE IF NOT EXISTS weather_descriptions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    main TEXT NOT NULL,
                    description TEXT NOT NULL,
                    UNIQUE (main, description)
                );

                CREATE TABLE IF NOT EXISTS weather (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    activity_id INTEGER NOT NULL UNIQUE REFERENCES activities(activity_id),
                    temperature REAL NOT NULL,
                    humidity REAL,
                    wind_speed REAL,
                    description_id INTEGER NOT NULL REFERENCES weather_descriptions(id),
                    timezone TEXT,
                    timezone_offset INTEGER
                );

                CREATE INDEX IF NOT EXISTS idx_activities_athlete ON activities(athlete_id);

                PRAGMA user_version = 1;",
            )?;
            tracing::info!(version = SCHEMA_VERSION, "Database schema created");
        }

        Ok(())
    }

    /// Delete the database file and recreate an empty schema.
    ///
    /// Returns whether a file existed beforehand.
    pub fn reset(&self) -> Result<bool, AppError> {
        let existed = self.path.exists();
        if existed {
            std::fs::remove_file(&self.path).map_err(|e| {
                AppError::Database(format!(
                    "Failed to remove {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
        }
        self.init_schema()?;
        tracing::warn!(path = %self.path.display(), existed, "Database reset");
        Ok(existed)
    }

    /// Row count of one of the [`tables`].
    pub fn count(&self, table: &'static str) -> Result<i64, AppError> {
        let conn = self.connect()?;
        let n = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n)
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Create or replace an account (used on every successful authorization).
    pub fn upsert_account(&self, account: &Account) -> Result<(), AppError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO accounts
                (athlete_id, access_token, refresh_token, expires_at, next_page)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.athlete_id,
                account.access_token,
                account.refresh_token,
                account.expires_at,
                account.next_page,
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, athlete_id: u64) -> Result<Option<Account>, AppError> {
        let conn = self.connect()?;
        let account = conn
            .query_row(
                "SELECT athlete_id, access_token, refresh_token, expires_at, next_page
                 FROM accounts WHERE athlete_id = ?1",
                params![athlete_id],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT athlete_id, access_token, refresh_token, expires_at, next_page
             FROM accounts ORDER BY athlete_id",
        )?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Persist a refreshed token triple.
    pub fn update_tokens(&self, account: &Account) -> Result<(), AppError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE accounts SET access_token = ?1, refresh_token = ?2, expires_at = ?3
             WHERE athlete_id = ?4",
            params![
                account.access_token,
                account.refresh_token,
                account.expires_at,
                account.athlete_id,
            ],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!(
                "Account {}",
                account.athlete_id
            )));
        }
        Ok(())
    }

    /// Persist the ingestion cursor.
    pub fn set_next_page(&self, athlete_id: u64, next_page: u32) -> Result<(), AppError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE accounts SET next_page = ?1 WHERE athlete_id = ?2",
            params![next_page, athlete_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Account {}", athlete_id)));
        }
        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Insert activities that are not stored yet; returns how many were new.
    ///
    /// The batch is written in one transaction so a failed page leaves
    /// nothing behind.
    pub fn insert_activities(&self, activities: &[Activity]) -> Result<usize, AppError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for activity in activities {
            let type_id = lookup_id(
                &tx,
                "INSERT OR IGNORE INTO activity_types (name) VALUES (?1)",
                "SELECT id FROM activity_types WHERE name = ?1",
                &[&activity.activity_type],
            )?;
            let (lat, lng) = match activity.start_latlng {
                Some(ll) => (Some(ll.lat), Some(ll.lng)),
                None => (None, None),
            };
            inserted += tx.execute(
                "INSERT OR IGNORE INTO activities (
                    activity_id, athlete_id, name, start_date_local, start_date,
                    distance, moving_time, type_id, start_lat, start_long
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    activity.activity_id,
                    activity.athlete_id,
                    activity.name,
                    activity.start_date_local,
                    activity.start_date,
                    activity.distance_meters,
                    activity.moving_time_secs,
                    type_id,
                    lat,
                    lng,
                ],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    pub fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, AppError> {
        let conn = self.connect()?;
        let activity = conn
            .query_row(
                &format!("{} WHERE a.activity_id = ?1", SELECT_ACTIVITY),
                params![activity_id],
                activity_from_row,
            )
            .optional()?;
        Ok(activity)
    }

    /// Activities with no weather observation yet, oldest insert first.
    pub fn activities_without_weather(&self) -> Result<Vec<Activity>, AppError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{} LEFT JOIN weather AS w ON w.activity_id = a.activity_id
             WHERE w.activity_id IS NULL
             ORDER BY a.id",
            SELECT_ACTIVITY
        ))?;
        let activities = stmt
            .query_map([], activity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    // ─── Weather Operations ──────────────────────────────────────

    /// Insert an observation unless the activity already has one.
    ///
    /// Returns `true` if a row was written.
    pub fn insert_weather(&self, obs: &WeatherObservation) -> Result<bool, AppError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let description_id = lookup_id(
            &tx,
            "INSERT OR IGNORE INTO weather_descriptions (main, description) VALUES (?1, ?2)",
            "SELECT id FROM weather_descriptions WHERE main = ?1 AND description = ?2",
            &[&obs.condition, &obs.description],
        )?;
        let changed = tx.execute(
            "INSERT OR IGNORE INTO weather (
                activity_id, temperature, humidity, wind_speed,
                description_id, timezone, timezone_offset
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                obs.activity_id,
                obs.temperature,
                obs.humidity,
                obs.wind_speed,
                description_id,
                obs.timezone,
                obs.timezone_offset,
            ],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    pub fn get_weather(&self, activity_id: u64) -> Result<Option<WeatherObservation>, AppError> {
        let conn = self.connect()?;
        let obs = conn
            .query_row(
                "SELECT w.activity_id, w.temperature, w.humidity, w.wind_speed,
                        wd.main, wd.description, w.timezone, w.timezone_offset
                 FROM weather AS w
                 JOIN weather_descriptions AS wd ON w.description_id = wd.id
                 WHERE w.activity_id = ?1",
                params![activity_id],
                |row| {
                    Ok(WeatherObservation {
                        activity_id: row.get(0)?,
                        temperature: row.get(1)?,
                        humidity: row.get(2)?,
                        wind_speed: row.get(3)?,
                        condition: row.get(4)?,
                        description: row.get(5)?,
                        timezone: row.get(6)?,
                        timezone_offset: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(obs)
    }

    // ─── Report Queries ──────────────────────────────────────────

    /// One aggregate per weather label over activities that have weather,
    /// highest value first.
    pub fn aggregate_by_weather(
        &self,
        metric: ReportMetric,
        grouping: ReportGrouping,
    ) -> Result<Vec<ConditionAggregate>, AppError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {label} AS label, {value} AS value, COUNT(a.activity_id) AS activity_count
             FROM activities AS a
             JOIN weather AS w ON a.activity_id = w.activity_id
             JOIN weather_descriptions AS wd ON w.description_id = wd.id
             GROUP BY label
             ORDER BY value DESC, label ASC",
            label = grouping.column(),
            value = metric.sql_expr(),
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ConditionAggregate {
                    label: row.get(0)?,
                    value: row.get(1)?,
                    activity_count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Activity counts per (weather label, activity type).
    pub fn count_by_weather_and_type(
        &self,
        grouping: ReportGrouping,
    ) -> Result<Vec<StackedCount>, AppError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {label} AS label, t.name AS activity_type, COUNT(a.activity_id) AS n
             FROM activities AS a
             JOIN activity_types AS t ON a.type_id = t.id
             JOIN weather AS w ON a.activity_id = w.activity_id
             JOIN weather_descriptions AS wd ON w.description_id = wd.id
             GROUP BY label, activity_type
             ORDER BY label ASC, activity_type ASC",
            label = grouping.column(),
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StackedCount {
                    label: row.get(0)?,
                    activity_type: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_accounts(&self) -> Result<i64, AppError> {
        self.count(tables::ACCOUNTS)
    }
}

/// Insert-if-absent a lookup label, then return its row ID.
fn lookup_id(
    conn: &Connection,
    insert_sql: &str,
    select_sql: &str,
    values: &[&dyn rusqlite::ToSql],
) -> Result<i64, AppError> {
    conn.execute(insert_sql, values)?;
    let id = conn.query_row(select_sql, values, |row| row.get(0))?;
    Ok(id)
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        athlete_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        expires_at: row.get(3)?,
        next_page: row.get(4)?,
    })
}

// Expects the SELECT_ACTIVITY column order.
fn activity_from_row(row: &Row) -> rusqlite::Result<Activity> {
    let lat: Option<f64> = row.get(8)?;
    let lng: Option<f64> = row.get(9)?;
    Ok(Activity {
        activity_id: row.get(0)?,
        athlete_id: row.get(1)?,
        name: row.get(2)?,
        start_date_local: row.get(3)?,
        start_date: row.get(4)?,
        distance_meters: row.get(5)?,
        moving_time_secs: row.get(6)?,
        activity_type: row.get(7)?,
        start_latlng: lat.zip(lng).map(|(lat, lng)| LatLng { lat, lng }),
    })
}
