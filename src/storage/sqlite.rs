//! SQLite storage layer.
//!
//! Structured payloads (profiles, diagnosis results, vitals, analyses,
//! locations) are stored as JSON text next to the few columns that are
//! queried directly. Timestamps are Unix milliseconds.

use anyhow::{Context, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::model::{DiagnosisReport, EmergencyAlert, UserProfile};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:arogya.db?mode=rwc" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                uid TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS diagnosis_reports (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                symptoms TEXT NOT NULL,
                result TEXT NOT NULL,
                location TEXT NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Recent reports are always fetched per user, newest first
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_diagnosis_reports_user_ts
            ON diagnosis_reports(user_id, ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emergency_alerts (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                kind TEXT NOT NULL,
                vitals TEXT NOT NULL,
                analysis TEXT NOT NULL,
                location TEXT NOT NULL,
                status TEXT NOT NULL,
                response_requested INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the pool. Every later call fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert or replace the profile for `profile.uid`.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let data = serde_json::to_string(profile)?;

        sqlx::query(
            r#"
            INSERT INTO users (uid, data, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(uid) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.uid)
        .bind(data)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_profile(&self, uid: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT data FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> anyhow::Result<UserProfile> {
            let data: String = row.try_get("data")?;
            serde_json::from_str(&data).context("stored profile is not valid JSON")
        })
        .transpose()
    }

    pub async fn insert_report(&self, report: &DiagnosisReport) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO diagnosis_reports (id, user_id, symptoms, result, location, ts)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.user_id)
        .bind(&report.symptoms)
        .bind(serde_json::to_string(&report.result)?)
        .bind(&report.location)
        .bind(report.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent reports for a user, newest first.
    pub async fn recent_reports(&self, user_id: &str, limit: u32) -> anyhow::Result<Vec<DiagnosisReport>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, symptoms, result, location, ts
            FROM diagnosis_reports
            WHERE user_id = ?
            ORDER BY ts DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(report_from_row).collect()
    }

    pub async fn insert_emergency_alert(&self, alert: &EmergencyAlert) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO emergency_alerts
                (id, ts, kind, vitals, analysis, location, status, response_requested)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.id)
        .bind(alert.timestamp.timestamp_millis())
        .bind(json_label(&alert.kind)?)
        .bind(serde_json::to_string(&alert.vitals)?)
        .bind(serde_json::to_string(&alert.analysis)?)
        .bind(serde_json::to_string(&alert.location)?)
        .bind(json_label(&alert.status)?)
        .bind(alert.response_requested)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_emergency_alert(&self, id: &str) -> anyhow::Result<Option<EmergencyAlert>> {
        let row = sqlx::query(
            r#"
            SELECT id, ts, kind, vitals, analysis, location, status, response_requested
            FROM emergency_alerts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(alert_from_row).transpose()
    }
}

/// Unit enum variants serialize to a bare JSON string; store its contents.
fn json_label<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(label) => Ok(label),
        other => Err(anyhow!("expected a string label, got {other}")),
    }
}

fn from_millis(ts: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| anyhow!("invalid stored timestamp {ts}"))
}

fn report_from_row(row: &SqliteRow) -> anyhow::Result<DiagnosisReport> {
    let result: String = row.try_get("result")?;
    Ok(DiagnosisReport {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        symptoms: row.try_get("symptoms")?,
        result: serde_json::from_str(&result)?,
        timestamp: from_millis(row.try_get("ts")?)?,
        location: row.try_get("location")?,
    })
}

fn alert_from_row(row: &SqliteRow) -> anyhow::Result<EmergencyAlert> {
    let text = |column: &str| -> anyhow::Result<String> { Ok(row.try_get(column)?) };

    Ok(EmergencyAlert {
        id: text("id")?,
        timestamp: from_millis(row.try_get("ts")?)?,
        kind: serde_json::from_value(serde_json::Value::String(text("kind")?))?,
        vitals: serde_json::from_str(&text("vitals")?)?,
        analysis: serde_json::from_str(&text("analysis")?)?,
        location: serde_json::from_str(&text("location")?)?,
        status: serde_json::from_value(serde_json::Value::String(text("status")?))?,
        response_requested: row.try_get("response_requested")?,
    })
}
