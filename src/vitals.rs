//! Rule engine for vital-sign readings.
//!
//! The engine takes a [`VitalsReading`] and whatever analysis a model
//! suggested for it, and produces the final [`VitalsAnalysis`]. Hard-coded
//! safety thresholds always apply on top of the suggestion: rule findings can
//! escalate the status but never lower it.
//!
//! # Thresholds
//!
//! | Check                  | Critical        | Concerning          |
//! |------------------------|-----------------|---------------------|
//! | Oxygen saturation (%)  | < 90            | < 95                |
//! | Diastolic BP (mmHg)    | < 60 [1]        | -                   |
//! | Heart rate (bpm)       | < 50 or > 120   | outside [60, 100]   |
//! | Temperature (°F)       | < 96            | outside [97, 99.5]  |
//!
//! The concerning tier is only consulted when no critical check fired.
//!
//! [1] Only when the systolic value is at most 100 mmHg or cannot be read.
//! A low diastolic with a normal systolic ("110/55") is a wide pulse
//! pressure, not shock.

use serde_json::Value;

use crate::model::{
    Alert, AlertSeverity, VitalsAnalysis, VitalsReading, VitalsStatus, lenient,
};

/// Recommendations used when the suggestion supplies none.
pub const DEFAULT_RECOMMENDATIONS: [&str; 3] = [
    "Continue monitoring your vital signs regularly",
    "Stay hydrated and get adequate rest",
    "Consult a healthcare provider if readings stay outside normal ranges",
];

/// Threshold table for the rule engine.
///
/// Critical bounds are exclusive (`value < critical_low` fires); concerning
/// ranges are inclusive on both ends (`value` inside `[low, high]` is fine).
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsThresholds {
    pub spo2_critical_below: f64,
    pub spo2_concerning_below: f64,
    pub diastolic_critical_below: f64,
    pub hypotension_systolic_max: f64,
    pub heart_rate_critical_below: f64,
    pub heart_rate_critical_above: f64,
    pub heart_rate_normal: (f64, f64),
    pub temperature_critical_below: f64,
    pub temperature_normal: (f64, f64),
}

impl Default for VitalsThresholds {
    fn default() -> Self {
        Self {
            spo2_critical_below: 90.0,
            spo2_concerning_below: 95.0,
            diastolic_critical_below: 60.0,
            hypotension_systolic_max: 100.0,
            heart_rate_critical_below: 50.0,
            heart_rate_critical_above: 120.0,
            heart_rate_normal: (60.0, 100.0),
            temperature_critical_below: 96.0,
            temperature_normal: (97.0, 99.5),
        }
    }
}

/// Analysis proposed by a model before the rules run.
///
/// Every field is optional. Use [`SuggestedAnalysis::from_value`] for model
/// output; malformed parts are dropped rather than rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestedAnalysis {
    pub status: Option<VitalsStatus>,
    pub alerts: Option<Vec<Alert>>,
    pub recommendations: Option<Vec<String>>,
}

impl SuggestedAnalysis {
    /// Read a suggestion out of an arbitrary JSON value.
    ///
    /// Non-objects yield an empty suggestion. Alerts missing both a type and
    /// a message are skipped.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let status = object
            .get("status")
            .and_then(Value::as_str)
            .and_then(VitalsStatus::parse);

        let alerts = object.get("alerts").and_then(Value::as_array).map(|items| {
            items.iter().filter_map(alert_from_value).collect::<Vec<_>>()
        });

        let recommendations = object
            .get("recommendations")
            .filter(|v| !v.is_null())
            .map(lenient::string_list_from_value)
            .filter(|list| !list.is_empty());

        Self {
            status,
            alerts,
            recommendations,
        }
    }
}

fn alert_from_value(value: &Value) -> Option<Alert> {
    let object = value.as_object()?;
    let text = |key: &str| object.get(key).and_then(lenient::string_from_value);

    let kind = text("type").or_else(|| text("title"));
    let message = text("message").or_else(|| text("description"));
    if kind.is_none() && message.is_none() {
        return None;
    }

    Some(Alert {
        kind: kind.clone().unwrap_or_else(|| "Alert".to_string()),
        message: message.or(kind).unwrap_or_default(),
        severity: text("severity")
            .map(|s| AlertSeverity::parse(&s))
            .unwrap_or_default(),
        explanation: text("explanation"),
    })
}

/// Applies [`VitalsThresholds`] to readings.
#[derive(Debug, Clone, Default)]
pub struct VitalsRuleEngine {
    thresholds: VitalsThresholds,
}

impl VitalsRuleEngine {
    pub fn new(thresholds: VitalsThresholds) -> Self {
        Self { thresholds }
    }

    /// Produce the final analysis for `vitals`.
    ///
    /// Pure: same inputs, same output. Never fails; unreadable fields are
    /// skipped.
    pub fn evaluate(&self, vitals: &VitalsReading, suggested: SuggestedAnalysis) -> VitalsAnalysis {
        let mut status = suggested.status.unwrap_or_default();
        let mut alerts = suggested.alerts.unwrap_or_default();
        let recommendations = suggested.recommendations.unwrap_or_else(|| {
            DEFAULT_RECOMMENDATIONS
                .iter()
                .map(|r| r.to_string())
                .collect()
        });

        let critical = self.critical_alerts(vitals);
        let emergency_triggered = !critical.is_empty();

        if emergency_triggered {
            status = status.escalate(VitalsStatus::Critical);
        } else if self.is_concerning(vitals) {
            status = status.escalate(VitalsStatus::Concerning);
        }

        alerts.extend(critical);

        VitalsAnalysis {
            status,
            alerts,
            recommendations,
            emergency_triggered,
        }
    }

    /// Rule-generated high-severity alerts, in fixed check order.
    pub fn critical_alerts(&self, vitals: &VitalsReading) -> Vec<Alert> {
        let t = &self.thresholds;
        let mut alerts = Vec::new();

        if let Some(spo2) = vitals.oxygen_saturation {
            if spo2 < t.spo2_critical_below {
                alerts.push(critical_alert(
                    "Severe Hypoxia",
                    format!(
                        "Oxygen saturation is critically low at {spo2}% (below {}%)",
                        t.spo2_critical_below
                    ),
                ));
            }
        }

        if let Some(diastolic) = vitals.diastolic() {
            let systolic_low = vitals
                .systolic()
                .is_none_or(|s| s <= t.hypotension_systolic_max);
            if diastolic < t.diastolic_critical_below && systolic_low {
                alerts.push(critical_alert(
                    "Severe Hypotension",
                    format!(
                        "Diastolic blood pressure is critically low at {diastolic} mmHg (below {})",
                        t.diastolic_critical_below
                    ),
                ));
            }
        }

        if let Some(hr) = vitals.heart_rate {
            if hr < t.heart_rate_critical_below {
                alerts.push(critical_alert(
                    "Severe Bradycardia",
                    format!(
                        "Heart rate is critically low at {hr} bpm (below {})",
                        t.heart_rate_critical_below
                    ),
                ));
            } else if hr > t.heart_rate_critical_above {
                alerts.push(critical_alert(
                    "Severe Tachycardia",
                    format!(
                        "Heart rate is critically high at {hr} bpm (above {})",
                        t.heart_rate_critical_above
                    ),
                ));
            }
        }

        if let Some(temp) = vitals.temperature {
            if temp < t.temperature_critical_below {
                alerts.push(critical_alert(
                    "Hypothermia",
                    format!(
                        "Body temperature is critically low at {temp}°F (below {}°F)",
                        t.temperature_critical_below
                    ),
                ));
            }
        }

        alerts
    }

    /// True when any value sits outside its normal range.
    pub fn is_concerning(&self, vitals: &VitalsReading) -> bool {
        let t = &self.thresholds;
        let outside = |value: f64, (low, high): (f64, f64)| value < low || value > high;

        vitals
            .oxygen_saturation
            .is_some_and(|spo2| spo2 < t.spo2_concerning_below)
            || vitals
                .heart_rate
                .is_some_and(|hr| outside(hr, t.heart_rate_normal))
            || vitals
                .temperature
                .is_some_and(|temp| outside(temp, t.temperature_normal))
    }
}

fn critical_alert(kind: &str, message: String) -> Alert {
    Alert {
        kind: kind.to_string(),
        message,
        severity: AlertSeverity::High,
        explanation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(bp: Option<&str>, hr: Option<f64>, temp: Option<f64>, spo2: Option<f64>) -> VitalsReading {
        VitalsReading {
            blood_pressure: bp.map(str::to_string),
            heart_rate: hr,
            temperature: temp,
            oxygen_saturation: spo2,
            respiratory_rate: None,
        }
    }

    fn ai_alert(kind: &str) -> Alert {
        Alert {
            kind: kind.to_string(),
            message: format!("{kind} noted"),
            severity: AlertSeverity::Low,
            explanation: None,
        }
    }

    fn rule_alert_count(analysis: &VitalsAnalysis) -> usize {
        analysis
            .alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::High)
            .count()
    }

    #[test]
    fn test_normal_reading() {
        let engine = VitalsRuleEngine::default();
        let analysis = engine.evaluate(
            &reading(Some("110/55"), Some(72.0), Some(98.2), Some(97.0)),
            SuggestedAnalysis::default(),
        );

        assert_eq!(analysis.status, VitalsStatus::Normal);
        assert!(analysis.alerts.is_empty());
        assert!(!analysis.emergency_triggered);
    }

    #[test]
    fn test_hypotension_needs_low_systolic() {
        let engine = VitalsRuleEngine::default();
        let low = engine.critical_alerts(&reading(Some("100/59"), None, None, None));
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].kind, "Severe Hypotension");

        let wide = engine.critical_alerts(&reading(Some("130/50"), None, None, None));
        assert!(wide.is_empty());

        let no_systolic = engine.critical_alerts(&reading(Some("/50"), None, None, None));
        assert_eq!(no_systolic.len(), 1);
    }

    #[test]
    fn test_all_values_in_range() {
        let engine = VitalsRuleEngine::default();
        let analysis = engine.evaluate(
            &reading(Some("118/76"), Some(72.0), Some(98.2), Some(97.0)),
            SuggestedAnalysis::default(),
        );

        assert_eq!(analysis.status, VitalsStatus::Normal);
        assert!(analysis.alerts.is_empty());
        assert!(!analysis.emergency_triggered);
        assert_eq!(analysis.recommendations.len(), DEFAULT_RECOMMENDATIONS.len());
    }

    #[test]
    fn test_multiple_critical_findings() {
        let engine = VitalsRuleEngine::default();
        let analysis = engine.evaluate(
            &reading(Some("90/50"), Some(45.0), Some(95.5), Some(88.0)),
            SuggestedAnalysis::default(),
        );

        assert_eq!(analysis.status, VitalsStatus::Critical);
        assert!(analysis.emergency_triggered);
        let kinds: Vec<&str> = analysis.alerts.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "Severe Hypoxia",
                "Severe Hypotension",
                "Severe Bradycardia",
                "Hypothermia"
            ]
        );
    }

    #[test]
    fn test_tachycardia_only() {
        let engine = VitalsRuleEngine::default();
        let analysis = engine.evaluate(&reading(None, Some(130.0), None, None), SuggestedAnalysis::default());

        assert_eq!(analysis.status, VitalsStatus::Critical);
        assert_eq!(analysis.alerts[0].kind, "Severe Tachycardia");
    }

    #[test]
    fn test_elevated_heart_rate_is_concerning() {
        let engine = VitalsRuleEngine::default();
        let analysis = engine.evaluate(
            &reading(Some("120/80"), Some(110.0), Some(98.6), Some(98.0)),
            SuggestedAnalysis::default(),
        );

        assert_eq!(analysis.status, VitalsStatus::Concerning);
        assert_eq!(rule_alert_count(&analysis), 0);
        assert!(!analysis.emergency_triggered);
    }

    #[test]
    fn test_concerning_boundaries_inclusive() {
        let engine = VitalsRuleEngine::default();
        assert!(!engine.is_concerning(&reading(None, Some(60.0), Some(97.0), Some(95.0))));
        assert!(!engine.is_concerning(&reading(None, Some(100.0), Some(99.5), None)));
        assert!(engine.is_concerning(&reading(None, None, Some(99.6), None)));
        assert!(engine.is_concerning(&reading(None, None, None, Some(94.0))));
    }

    #[test]
    fn test_hypoxia_overrides_ai_status() {
        let engine = VitalsRuleEngine::default();
        for status in [None, Some(VitalsStatus::Normal), Some(VitalsStatus::Concerning)] {
            let suggested = SuggestedAnalysis {
                status,
                ..Default::default()
            };
            let analysis = engine.evaluate(&reading(None, None, None, Some(85.0)), suggested);
            assert_eq!(analysis.status, VitalsStatus::Critical);
            assert!(analysis.emergency_triggered);
        }
    }

    #[test]
    fn test_empty_reading_keeps_ai_status() {
        let engine = VitalsRuleEngine::default();
        let suggested = SuggestedAnalysis {
            status: Some(VitalsStatus::Concerning),
            alerts: Some(vec![ai_alert("Irregular rhythm")]),
            recommendations: Some(vec!["See a cardiologist".to_string()]),
        };

        let analysis = engine.evaluate(&VitalsReading::default(), suggested);

        assert_eq!(analysis.status, VitalsStatus::Concerning);
        assert_eq!(analysis.alerts, vec![ai_alert("Irregular rhythm")]);
        assert_eq!(analysis.recommendations, vec!["See a cardiologist".to_string()]);
        assert!(!analysis.emergency_triggered);

        let bare = engine.evaluate(&VitalsReading::default(), SuggestedAnalysis::default());
        assert_eq!(bare.status, VitalsStatus::Normal);
        assert!(bare.alerts.is_empty());
    }

    #[test]
    fn test_rule_alerts_follow_ai_alerts() {
        let engine = VitalsRuleEngine::default();
        let suggested = SuggestedAnalysis {
            status: Some(VitalsStatus::Critical),
            alerts: Some(vec![ai_alert("First"), ai_alert("Second")]),
            recommendations: None,
        };

        let analysis = engine.evaluate(&reading(Some("80/40"), None, None, Some(80.0)), suggested);

        let kinds: Vec<&str> = analysis.alerts.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["First", "Second", "Severe Hypoxia", "Severe Hypotension"]);
    }

    #[test]
    fn test_ai_critical_is_never_downgraded() {
        let engine = VitalsRuleEngine::default();
        let suggested = SuggestedAnalysis {
            status: Some(VitalsStatus::Critical),
            ..Default::default()
        };

        let analysis = engine.evaluate(&reading(Some("120/80"), Some(72.0), Some(98.6), Some(99.0)), suggested);

        assert_eq!(analysis.status, VitalsStatus::Critical);
        // No rule fired, so no emergency from the rules.
        assert!(!analysis.emergency_triggered);
    }

    #[test]
    fn test_malformed_blood_pressure_is_skipped() {
        let engine = VitalsRuleEngine::default();
        let analysis = engine.evaluate(&reading(Some("12050"), None, None, None), SuggestedAnalysis::default());

        assert_eq!(analysis.status, VitalsStatus::Normal);
        assert!(analysis.alerts.is_empty());
    }

    #[test]
    fn test_custom_thresholds() {
        let engine = VitalsRuleEngine::new(VitalsThresholds {
            spo2_critical_below: 92.0,
            ..Default::default()
        });
        let analysis = engine.evaluate(&reading(None, None, None, Some(91.0)), SuggestedAnalysis::default());
        assert!(analysis.emergency_triggered);
    }

    #[test]
    fn test_suggestion_from_model_json() {
        let suggested = SuggestedAnalysis::from_value(&json!({
            "status": "Concerning",
            "alerts": [
                {"type": "Fever", "message": "Mild fever", "severity": "medium"},
                {"severity": "high"},
                "not an alert",
                {"title": "Tachypnea", "description": "Fast breathing", "severity": "critical"}
            ],
            "recommendations": "Drink water"
        }));

        assert_eq!(suggested.status, Some(VitalsStatus::Concerning));
        let alerts = suggested.alerts.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[1].kind, "Tachypnea");
        assert_eq!(alerts[1].severity, AlertSeverity::High);
        assert_eq!(suggested.recommendations, Some(vec!["Drink water".to_string()]));
    }

    #[test]
    fn test_suggestion_from_garbage() {
        assert_eq!(SuggestedAnalysis::from_value(&json!(null)), SuggestedAnalysis::default());
        assert_eq!(SuggestedAnalysis::from_value(&json!([1, 2])), SuggestedAnalysis::default());

        let odd = SuggestedAnalysis::from_value(&json!({"status": "purple", "alerts": "none"}));
        assert_eq!(odd.status, None);
        assert_eq!(odd.alerts, None);
    }
}
