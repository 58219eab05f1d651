//! Data models for Arogya.
//!
//! Wire names are camelCase to match the portal's JSON. Anything that arrives
//! from a language model or a browser form goes through the lenient
//! deserializers in [`lenient`], so a malformed field degrades to "absent"
//! instead of rejecting the whole payload.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall classification of a vitals reading.
///
/// Ordered by severity so the worst of two statuses is simply `max`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VitalsStatus {
    /// All checked values inside their reference ranges.
    #[default]
    Normal,

    /// At least one value outside its reference range, none life-threatening.
    Concerning,

    /// At least one value past a critical threshold.
    Critical,
}

impl VitalsStatus {
    /// Parse a status label produced by a model or a client.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "normal" | "stable" | "good" => Some(VitalsStatus::Normal),
            "concerning" | "abnormal" | "warning" => Some(VitalsStatus::Concerning),
            "critical" | "emergency" => Some(VitalsStatus::Critical),
            _ => None,
        }
    }

    /// The worse of two statuses. Never returns a milder status than `self`.
    pub fn escalate(self, other: VitalsStatus) -> Self {
        self.max(other)
    }
}

/// Severity of a single alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    #[default]
    Medium,
    High,
}

impl AlertSeverity {
    /// Models sometimes answer "critical" or "severe"; both map to `High`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" | "mild" | "info" => AlertSeverity::Low,
            "high" | "critical" | "severe" => AlertSeverity::High,
            _ => AlertSeverity::Medium,
        }
    }
}

/// A finding attached to a vitals analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Short label such as "Severe Hypoxia".
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable description of the finding.
    pub message: String,

    pub severity: AlertSeverity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// One submission of vital signs.
///
/// Numeric fields accept numbers or numeric strings. Anything else is
/// treated as not measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsReading {
    /// Blood pressure as "SYS/DIA", e.g. "120/80".
    #[serde(default, deserialize_with = "lenient::string")]
    pub blood_pressure: Option<String>,

    /// Beats per minute.
    #[serde(default, deserialize_with = "lenient::number")]
    pub heart_rate: Option<f64>,

    /// Degrees Fahrenheit.
    #[serde(default, deserialize_with = "lenient::number")]
    pub temperature: Option<f64>,

    /// Percent.
    #[serde(default, deserialize_with = "lenient::number")]
    pub oxygen_saturation: Option<f64>,

    /// Breaths per minute.
    #[serde(default, deserialize_with = "lenient::number")]
    pub respiratory_rate: Option<f64>,
}

impl VitalsReading {
    /// Diastolic component of the blood pressure, if it can be read.
    ///
    /// A value without a `/` has no diastolic component.
    pub fn diastolic(&self) -> Option<f64> {
        let bp = self.blood_pressure.as_deref()?;
        let (_, diastolic) = bp.split_once('/')?;
        parse_leading_number(diastolic)
    }

    /// Systolic component of the blood pressure, if it can be read.
    pub fn systolic(&self) -> Option<f64> {
        let bp = self.blood_pressure.as_deref()?;
        let (systolic, _) = bp.split_once('/')?;
        parse_leading_number(systolic)
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.blood_pressure.is_none()
            && self.heart_rate.is_none()
            && self.temperature.is_none()
            && self.oxygen_saturation.is_none()
            && self.respiratory_rate.is_none()
    }

    /// Compact one-line summary used in prompts and call variables.
    pub fn summary(&self) -> String {
        fn field(label: &str, value: Option<String>) -> Option<String> {
            value.map(|v| format!("{label}: {v}"))
        }

        let parts: Vec<String> = [
            field("BP", self.blood_pressure.clone()),
            field("HR", self.heart_rate.map(|v| format!("{v} bpm"))),
            field("Temp", self.temperature.map(|v| format!("{v}°F"))),
            field("SpO2", self.oxygen_saturation.map(|v| format!("{v}%"))),
            field("RR", self.respiratory_rate.map(|v| format!("{v}/min"))),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            "no readings".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Reads the number at the start of `text`, ignoring surrounding whitespace
/// and trailing units ("55 mmHg" reads as 55).
fn parse_leading_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Final result of analysing a vitals reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsAnalysis {
    pub status: VitalsStatus,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
    pub emergency_triggered: bool,
}

/// Urgency tier of a diagnosis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Parse an urgency label, defaulting to `Medium` for anything unknown.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => Urgency::Low,
            "high" => Urgency::High,
            "critical" | "emergency" => Urgency::Critical,
            _ => Urgency::Medium,
        }
    }
}

/// Symptom breakdown returned with a detailed diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomBreakdown {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub reported: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub associated: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub red_flags: Vec<String>,
}

/// A suggested test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    #[serde(default)]
    pub test: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reason: Option<String>,
}

/// A medication suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub dosage: Option<String>,
}

/// Treatment plan returned with a detailed diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub immediate: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub medications: Vec<Medication>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub lifestyle: Vec<String>,
}

/// Structured answer to a symptom description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub primary_diagnosis: Option<String>,

    /// Model confidence, 0-100.
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, deserialize_with = "lenient::urgency")]
    pub urgency: Urgency,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub diseases: Vec<String>,

    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<SymptomBreakdown>,

    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Vec::is_empty")]
    pub investigations: Vec<Investigation>,

    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub treatment: Option<TreatmentPlan>,

    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub advice: String,
}

impl DiagnosisResult {
    /// A result with nothing a patient could act on.
    pub fn is_blank(&self) -> bool {
        self.primary_diagnosis.is_none() && self.diseases.is_empty() && self.advice.trim().is_empty()
    }
}

/// Optional structured context sent along with a symptom description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientContext {
    #[serde(default, deserialize_with = "lenient::string")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub duration: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub medical_history: Option<String>,
    /// Free text assembled by the symptom wizard; preferred over the raw text.
    #[serde(default, deserialize_with = "lenient::string")]
    pub compiled_symptoms: Option<String>,
}

/// A diagnosis saved for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisReport {
    pub id: String,
    pub user_id: String,
    pub symptoms: String,
    pub result: DiagnosisResult,
    pub timestamp: DateTime<Utc>,
    pub location: String,
}

/// Where a patient was when an emergency fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Coordinates {
        latitude: f64,
        longitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accuracy: Option<f64>,
    },
    Unavailable {
        error: String,
    },
    Described(String),
}

/// Marker used when the position lookup was denied or timed out.
pub const LOCATION_NOT_AVAILABLE: &str = "Location not available";

/// Marker used when no position source exists at all.
pub const GEOLOCATION_NOT_SUPPORTED: &str = "Geolocation not supported";

impl Location {
    pub fn not_available() -> Self {
        Location::Unavailable {
            error: LOCATION_NOT_AVAILABLE.to_string(),
        }
    }

    pub fn not_supported() -> Self {
        Location::Unavailable {
            error: GEOLOCATION_NOT_SUPPORTED.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Location::Unavailable { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Coordinates {
                latitude,
                longitude,
                ..
            } => write!(f, "{latitude:.5}, {longitude:.5}"),
            Location::Unavailable { error } => f.write_str(error),
            Location::Described(text) => f.write_str(text),
        }
    }
}

/// Kind of emergency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    CriticalVitals,
}

/// Lifecycle of an emergency record. Records are only ever created active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyStatus {
    Active,
}

/// Append-only record of a critical vitals event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EmergencyKind,
    pub vitals: VitalsReading,
    pub analysis: VitalsAnalysis,
    pub location: Location,
    pub status: EmergencyStatus,
    pub response_requested: bool,
}

impl EmergencyAlert {
    /// Build a fresh active alert for a critical classification.
    pub fn critical_vitals(
        vitals: VitalsReading,
        analysis: VitalsAnalysis,
        location: Location,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            kind: EmergencyKind::CriticalVitals,
            vitals,
            analysis,
            location,
            status: EmergencyStatus::Active,
            response_requested: true,
        }
    }
}

/// A person to notify in an emergency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub relation: String,
}

/// Profile captured by the setup wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub medical_history: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub allergies: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub medications: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    #[serde(default)]
    pub selected_hospitals: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub insurance_info: Option<String>,
    #[serde(default)]
    pub profile_complete: bool,
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat turn, in the completion API's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

/// Request body for POST /diagnosis.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisRequest {
    pub symptoms: String,
    #[serde(default)]
    pub patient: Option<PatientContext>,
    #[serde(default = "default_report_location")]
    pub location: String,
}

fn default_report_location() -> String {
    "Unknown".to_string()
}

/// Request body for POST /vitals.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsRequest {
    #[serde(flatten)]
    pub vitals: VitalsReading,
    /// Position reported by the client, if it already has one.
    #[serde(default)]
    pub location: Option<Location>,
}

/// Request body for POST /chat.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

/// Query parameters for GET /reports/recent.
#[derive(Debug, Deserialize)]
pub struct RecentReportsQuery {
    #[serde(default = "default_report_limit")]
    pub limit: u32,
}

fn default_report_limit() -> u32 {
    10
}

/// Permissive deserializers for payloads from models and browser forms.
///
/// Every function here accepts any JSON value and never fails on shape;
/// values that cannot be used become `None` or the type's default.
pub mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Urgency;

    /// Number or numeric string. Non-finite values are dropped.
    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(number_from_value))
    }

    pub fn number_from_value(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        n.filter(|v| v.is_finite())
    }

    /// Non-blank string; numbers and booleans are rendered as text.
    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(string_from_value))
    }

    pub fn string_from_value(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string(deserializer)?.unwrap_or_default())
    }

    /// Array of strings; a single string becomes a one-element list.
    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().map(string_list_from_value).unwrap_or_default())
    }

    pub fn string_list_from_value(value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items.iter().filter_map(string_from_value).collect(),
            other => string_from_value(other).into_iter().collect(),
        }
    }

    pub fn urgency<'de, D>(deserializer: D) -> Result<Urgency, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string(deserializer)?
            .map(|s| Urgency::parse(&s))
            .unwrap_or_default())
    }

    /// Any type, falling back to its default when the shape does not fit.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_ordering() {
        assert!(VitalsStatus::Normal < VitalsStatus::Concerning);
        assert!(VitalsStatus::Concerning < VitalsStatus::Critical);
        assert_eq!(
            VitalsStatus::Critical.escalate(VitalsStatus::Normal),
            VitalsStatus::Critical
        );
        assert_eq!(
            VitalsStatus::Normal.escalate(VitalsStatus::Concerning),
            VitalsStatus::Concerning
        );
    }

    #[test]
    fn test_vitals_accept_strings_and_numbers() {
        let reading: VitalsReading = serde_json::from_value(json!({
            "bloodPressure": "120/80",
            "heartRate": "72",
            "temperature": 98.6,
            "oxygenSaturation": "",
            "respiratoryRate": "fast"
        }))
        .unwrap();

        assert_eq!(reading.blood_pressure.as_deref(), Some("120/80"));
        assert_eq!(reading.heart_rate, Some(72.0));
        assert_eq!(reading.temperature, Some(98.6));
        assert_eq!(reading.oxygen_saturation, None);
        assert_eq!(reading.respiratory_rate, None);
    }

    #[test]
    fn test_diastolic_parsing() {
        let mut reading = VitalsReading {
            blood_pressure: Some("110/55".to_string()),
            ..Default::default()
        };
        assert_eq!(reading.diastolic(), Some(55.0));
        assert_eq!(reading.systolic(), Some(110.0));

        reading.blood_pressure = Some(" 120 / 70 mmHg".to_string());
        assert_eq!(reading.diastolic(), Some(70.0));

        reading.blood_pressure = Some("12080".to_string());
        assert_eq!(reading.diastolic(), None);

        reading.blood_pressure = Some("120/".to_string());
        assert_eq!(reading.diastolic(), None);
    }

    #[test]
    fn test_diagnosis_lenient_fields() {
        let result: DiagnosisResult = serde_json::from_value(json!({
            "primaryDiagnosis": "Migraine",
            "confidence": "85",
            "urgency": "HIGH",
            "diseases": "Migraine",
            "investigations": "none needed",
            "advice": "Rest"
        }))
        .unwrap();

        assert_eq!(result.primary_diagnosis.as_deref(), Some("Migraine"));
        assert_eq!(result.confidence, Some(85.0));
        assert_eq!(result.urgency, Urgency::High);
        assert_eq!(result.diseases, vec!["Migraine".to_string()]);
        assert!(result.investigations.is_empty());
        assert!(!result.is_blank());
    }

    #[test]
    fn test_diagnosis_blank() {
        let result: DiagnosisResult = serde_json::from_value(json!({"foo": 1})).unwrap();
        assert!(result.is_blank());
        assert_eq!(result.urgency, Urgency::Medium);
    }

    #[test]
    fn test_location_untagged_shapes() {
        let coords: Location =
            serde_json::from_value(json!({"latitude": 12.97, "longitude": 77.59})).unwrap();
        assert!(coords.is_available());

        let missing: Location =
            serde_json::from_value(json!({"error": "Location not available"})).unwrap();
        assert_eq!(missing, Location::not_available());
        assert!(!missing.is_available());

        let text: Location = serde_json::from_value(json!("Bengaluru")).unwrap();
        assert_eq!(text.to_string(), "Bengaluru");
    }

    #[test]
    fn test_alert_wire_shape() {
        let alert = Alert {
            kind: "Severe Hypoxia".to_string(),
            message: "Oxygen saturation is 88%".to_string(),
            severity: AlertSeverity::High,
            explanation: None,
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "Severe Hypoxia");
        assert_eq!(value["severity"], "high");
        assert!(value.get("explanation").is_none());
    }
}
