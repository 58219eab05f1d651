//! Health outcome predictions and trend analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{Analyzed, Gateway};
use crate::fallback;
use crate::model::{VitalsReading, lenient};

const PREDICTION_PROMPT: &str = r#"You are a health prediction AI. Return ONLY valid JSON:
{
  "riskAssessment": {
    "diabetes": {"risk": "low|medium|high", "factors": ["factors"], "timeline": "timeframe"},
    "hypertension": {"risk": "low|medium|high", "factors": ["factors"], "timeline": "timeframe"}
  },
  "healthTrajectory": {
    "shortTerm": "1-3 month outlook",
    "mediumTerm": "6-12 month outlook",
    "longTerm": "1-5 year outlook"
  },
  "interventions": {
    "preventive": ["prevention measures"],
    "lifestyle": ["lifestyle changes"]
  }
}"#;

const TREND_PROMPT: &str = r#"Analyze health trends and return ONLY valid JSON:
{
  "trendAnalysis": {
    "vitals": {"direction": "improving|stable|declining", "confidence": "high|medium|low"},
    "symptoms": {"progression": "better|same|worse"},
    "overall": {"health": "good|fair|poor"}
  },
  "predictions": {
    "nextWeek": "prediction",
    "nextMonth": "prediction"
  }
}"#;

/// Request body for POST /predictions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    #[serde(default, deserialize_with = "lenient::string")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub medical_history: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub symptoms: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lifestyle: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub family_history: Option<String>,
    #[serde(default)]
    pub vitals_history: Vec<VitalsReading>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskEntry {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub risk: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub factors: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub timeline: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthTrajectory {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub short_term: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub medium_term: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub long_term: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interventions {
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub preventive: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub lifestyle: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOutlook {
    /// Keyed by condition, e.g. "diabetes".
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub risk_assessment: BTreeMap<String, RiskEntry>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub health_trajectory: HealthTrajectory,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub interventions: Interventions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsTrend {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub direction: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub confidence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomTrend {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub progression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallTrend {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub health: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub vitals: Option<VitalsTrend>,
    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<SymptomTrend>,
    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallTrend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPredictions {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub next_week: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub next_month: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub trend_analysis: TrendAnalysis,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub predictions: TrendPredictions,
}

#[derive(Debug, Clone, Default)]
pub struct HealthPredictor {
    gateway: Gateway,
}

impl HealthPredictor {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all, fields(readings = request.vitals_history.len()))]
    pub async fn predict(&self, request: &PredictionRequest) -> Analyzed<HealthOutlook> {
        let answer = self
            .gateway
            .ask_json::<HealthOutlook>("prediction", PREDICTION_PROMPT, &prediction_prompt(request))
            .await
            .filter(|outlook| {
                !outlook.risk_assessment.is_empty() || !outlook.health_trajectory.short_term.is_empty()
            });

        let outcome = Analyzed::or_fallback(answer, fallback::health_outlook);
        info!(source = ?outcome.source, risks = outcome.result.risk_assessment.len(), "Outlook ready");
        outcome
    }

    #[instrument(skip_all)]
    pub async fn analyze_trends(&self, request: &PredictionRequest) -> Analyzed<TrendReport> {
        let health_data = serde_json::to_string(request).unwrap_or_default();
        let prompt = format!("Analyze health trends: {health_data}");
        let answer = self
            .gateway
            .ask_json::<TrendReport>("trends", TREND_PROMPT, &prompt)
            .await
            .filter(|report| {
                report.trend_analysis.overall.is_some() || !report.predictions.next_week.is_empty()
            });

        Analyzed::or_fallback(answer, fallback::trend_report)
    }
}

fn prediction_prompt(request: &PredictionRequest) -> String {
    let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| "unknown".to_string());
    let vitals_history = serde_json::to_string(&request.vitals_history).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Predict health outcomes for: Age {}, Gender {}, Medical History: {}, Symptoms: {}, \
         Lifestyle: {}, Family History: {}, Vitals History: {}",
        or_unknown(&request.age),
        or_unknown(&request.gender),
        or_unknown(&request.medical_history),
        or_unknown(&request.symptoms),
        or_unknown(&request.lifestyle),
        or_unknown(&request.family_history),
        vitals_history,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::ScriptedGateway;

    #[test]
    fn test_prediction_prompt() {
        let request = PredictionRequest {
            age: Some("52".to_string()),
            lifestyle: Some("sedentary".to_string()),
            vitals_history: vec![VitalsReading {
                heart_rate: Some(88.0),
                ..Default::default()
            }],
            ..Default::default()
        };
        let prompt = prediction_prompt(&request);
        assert!(prompt.starts_with("Predict health outcomes for: Age 52, Gender unknown"));
        assert!(prompt.contains("Lifestyle: sedentary"));
        assert!(prompt.contains("\"heartRate\":88.0"));
    }

    #[tokio::test]
    async fn test_outlook_from_model() {
        let gateway = Gateway::new(ScriptedGateway::replying(
            r#"{"riskAssessment": {"diabetes": {"risk": "high", "factors": "family history", "timeline": "5 years"}},
                "healthTrajectory": {"shortTerm": "Stable"}}"#,
        ));
        let outcome = HealthPredictor::new(gateway)
            .predict(&PredictionRequest::default())
            .await;
        assert!(!outcome.used_fallback());
        let diabetes = &outcome.result.risk_assessment["diabetes"];
        assert_eq!(diabetes.risk, "high");
        assert_eq!(diabetes.factors, vec!["family history".to_string()]);
        assert_eq!(outcome.result.health_trajectory.short_term, "Stable");
    }

    #[tokio::test]
    async fn test_fallbacks() {
        let predictor = HealthPredictor::default();
        let outlook = predictor.predict(&PredictionRequest::default()).await;
        assert!(outlook.used_fallback());
        assert_eq!(outlook.result.risk_assessment["general"].risk, "medium");
        assert_eq!(outlook.result.health_trajectory.short_term, "Monitor symptoms");

        let trends = predictor.analyze_trends(&PredictionRequest::default()).await;
        assert!(trends.used_fallback());
        assert_eq!(
            trends.result.trend_analysis.overall.map(|o| o.health),
            Some("fair".to_string())
        );
        assert_eq!(trends.result.predictions.next_week, "Continue monitoring");
    }

    #[tokio::test]
    async fn test_trends_from_model() {
        let gateway = Gateway::new(ScriptedGateway::replying(
            r#"{"trendAnalysis": {"vitals": {"direction": "improving", "confidence": "high"},
                "overall": {"health": "good"}},
                "predictions": {"nextWeek": "Keep going", "nextMonth": "Better"}}"#,
        ));
        let trends = HealthPredictor::new(gateway)
            .analyze_trends(&PredictionRequest::default())
            .await;
        assert!(!trends.used_fallback());
        assert_eq!(
            trends.result.trend_analysis.vitals.map(|v| v.direction),
            Some("improving".to_string())
        );
    }
}
