//! Persistence for profiles, diagnosis reports and emergency alerts.
//!
//! [`ReportStore`] writes to SQLite ([`sqlite::Storage`]) and falls back to
//! JSON files ([`local::LocalStore`]) when the database is missing or a
//! write fails. Persistence is best effort: a save that neither store
//! accepts is logged and reported as `None`, never as a request failure.

pub mod local;
pub mod sqlite;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{DiagnosisReport, DiagnosisResult, EmergencyAlert, UserProfile};

pub use local::LocalStore;
pub use sqlite::Storage;

/// Collection names shared by both stores.
pub const USERS: &str = "users";
pub const DIAGNOSIS_REPORTS: &str = "diagnosis_reports";
pub const EMERGENCY_ALERTS: &str = "emergency_alerts";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local store data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Primary database with local-file fallback.
#[derive(Clone)]
pub struct ReportStore {
    primary: Option<Storage>,
    local: LocalStore,
}

impl ReportStore {
    pub fn new(primary: Option<Storage>, local: LocalStore) -> Self {
        Self { primary, local }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub async fn save_profile(&self, profile: &UserProfile) -> Option<UserProfile> {
        if let Some(primary) = &self.primary {
            match primary.upsert_profile(profile).await {
                Ok(()) => return Some(profile.clone()),
                Err(e) => warn!(error = %e, "Database unavailable, saving profile locally"),
            }
        }

        match self.local.upsert(USERS, "uid", profile).await {
            Ok(()) => Some(profile.clone()),
            Err(e) => {
                warn!(error = %e, "Profile could not be saved");
                None
            }
        }
    }

    pub async fn load_profile(&self, uid: &str) -> Option<UserProfile> {
        if let Some(primary) = &self.primary {
            match primary.get_profile(uid).await {
                Ok(profile) => return profile,
                Err(e) => warn!(error = %e, "Database unavailable, reading profile locally"),
            }
        }

        match self.local.load::<UserProfile>(USERS).await {
            Ok(profiles) => profiles.into_iter().find(|p| p.uid == uid),
            Err(e) => {
                warn!(error = %e, "Local profiles unreadable");
                None
            }
        }
    }

    // ========================================================================
    // Diagnosis reports
    // ========================================================================

    /// Persist a diagnosis for `user_id`.
    ///
    /// The database assigns a UUID; the local fallback a millisecond id.
    pub async fn save_report(
        &self,
        user_id: &str,
        symptoms: &str,
        result: &DiagnosisResult,
        location: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<DiagnosisReport> {
        let mut report = DiagnosisReport {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            symptoms: symptoms.to_string(),
            result: result.clone(),
            timestamp,
            location: location.to_string(),
        };

        if let Some(primary) = &self.primary {
            match primary.insert_report(&report).await {
                Ok(()) => {
                    info!(report_id = %report.id, "Diagnosis report saved");
                    return Some(report);
                }
                Err(e) => warn!(error = %e, "Database unavailable, saving report locally"),
            }
        }

        report.id = self.local.next_id();
        match self.local.append(DIAGNOSIS_REPORTS, &report).await {
            Ok(()) => {
                info!(report_id = %report.id, "Diagnosis report saved locally");
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Diagnosis report could not be saved");
                None
            }
        }
    }

    /// Newest reports first, at most `limit`.
    pub async fn recent_reports(&self, user_id: &str, limit: u32) -> Vec<DiagnosisReport> {
        if let Some(primary) = &self.primary {
            match primary.recent_reports(user_id, limit).await {
                Ok(reports) => return reports,
                Err(e) => warn!(error = %e, "Database unavailable, reading reports locally"),
            }
        }

        let mut reports = match self.local.load::<DiagnosisReport>(DIAGNOSIS_REPORTS).await {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, "Local reports unreadable");
                return Vec::new();
            }
        };
        reports.retain(|r| r.user_id == user_id);
        reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        reports.truncate(limit as usize);
        reports
    }

    // ========================================================================
    // Emergency alerts
    // ========================================================================

    /// Persist an alert and return the id it was stored under.
    pub async fn save_emergency_alert(&self, alert: &EmergencyAlert) -> Result<String, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.insert_emergency_alert(alert).await {
                Ok(()) => return Ok(alert.id.clone()),
                Err(e) => warn!(error = %e, "Database unavailable, saving emergency alert locally"),
            }
        }

        let mut local_alert = alert.clone();
        local_alert.id = self.local.next_id();
        self.local.append(EMERGENCY_ALERTS, &local_alert).await?;
        Ok(local_alert.id)
    }
}
