//! Symptom analysis.

use tracing::{info, instrument};

use super::{Analyzed, Gateway};
use crate::fallback;
use crate::model::{DiagnosisResult, PatientContext};

const SYSTEM_PROMPT: &str = r#"You are an advanced medical AI. Return ONLY valid JSON:
{
  "primaryDiagnosis": "most likely condition",
  "confidence": 85,
  "urgency": "low|medium|high|critical",
  "diseases": ["condition1", "condition2"],
  "symptoms": {
    "reported": ["patient symptoms"],
    "associated": ["related symptoms"],
    "redFlags": ["warning signs"]
  },
  "investigations": [{"test": "name", "priority": "high|medium|low", "reason": "why needed"}],
  "treatment": {
    "immediate": ["urgent actions"],
    "medications": [{"name": "drug", "dosage": "amount"}],
    "lifestyle": ["recommendations"]
  },
  "advice": "comprehensive medical advice"
}"#;

/// Turns a symptom description into a [`DiagnosisResult`].
#[derive(Debug, Clone, Default)]
pub struct SymptomAnalyzer {
    gateway: Gateway,
}

impl SymptomAnalyzer {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all, fields(with_context = patient.is_some()))]
    pub async fn analyze(&self, symptoms: &str, patient: Option<&PatientContext>) -> Analyzed<DiagnosisResult> {
        let prompt = build_prompt(symptoms, patient);
        let answer = self
            .gateway
            .ask_json::<DiagnosisResult>("diagnosis", SYSTEM_PROMPT, &prompt)
            .await
            .filter(|result| !result.is_blank());

        let outcome = Analyzed::or_fallback(answer, || fallback::diagnosis(symptoms));
        info!(
            source = ?outcome.source,
            urgency = ?outcome.result.urgency,
            "Symptom analysis complete"
        );
        outcome
    }
}

/// Single-line patient summary sent as the user turn.
///
/// Compiled wizard text replaces the raw description when present.
pub fn build_prompt(symptoms: &str, patient: Option<&PatientContext>) -> String {
    let empty = PatientContext::default();
    let patient = patient.unwrap_or(&empty);
    let or = |value: &Option<String>, default: &'static str| -> String {
        value.clone().unwrap_or_else(|| default.to_string())
    };

    let described = patient
        .compiled_symptoms
        .as_deref()
        .unwrap_or(symptoms);

    format!(
        "Patient Analysis: Age {}, Gender {}, Symptoms: {}, Duration: {}, Medical History: {}",
        or(&patient.age, "unknown"),
        or(&patient.gender, "unknown"),
        described,
        or(&patient.duration, "unknown"),
        or(&patient.medical_history, "none"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisSource;
    use crate::analysis::testing::ScriptedGateway;
    use crate::clients::GatewayError;
    use crate::model::{ChatRole, Urgency};
    use std::sync::Arc;

    #[test]
    fn test_prompt_defaults() {
        assert_eq!(
            build_prompt("headache", None),
            "Patient Analysis: Age unknown, Gender unknown, Symptoms: headache, \
             Duration: unknown, Medical History: none"
        );
    }

    #[test]
    fn test_prompt_prefers_compiled_symptoms() {
        let patient = PatientContext {
            age: Some("34".to_string()),
            gender: Some("female".to_string()),
            duration: Some("2 days".to_string()),
            medical_history: Some("asthma".to_string()),
            compiled_symptoms: Some("headache, nausea, light sensitivity".to_string()),
        };
        let prompt = build_prompt("headache", Some(&patient));
        assert!(prompt.contains("Age 34"));
        assert!(prompt.contains("Symptoms: headache, nausea, light sensitivity"));
        assert!(prompt.contains("Duration: 2 days"));
        assert!(prompt.contains("Medical History: asthma"));
    }

    #[tokio::test]
    async fn test_parsed_answer() {
        let scripted = Arc::new(ScriptedGateway::replying(
            "```json\n{\"primaryDiagnosis\": \"Migraine\", \"confidence\": 80, \
             \"urgency\": \"low\", \"diseases\": [\"Migraine\"], \"advice\": \"Rest\"}\n```",
        ));
        let analyzer = SymptomAnalyzer::new(Gateway::from_arc(scripted.clone()));

        let outcome = analyzer.analyze("throbbing headache", None).await;
        assert_eq!(outcome.source, AnalysisSource::Ai);
        assert_eq!(outcome.result.primary_diagnosis.as_deref(), Some("Migraine"));
        assert_eq!(outcome.result.urgency, Urgency::Low);

        let requests = scripted.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].role, ChatRole::System);
        assert!(requests[0][1].content.contains("throbbing headache"));
    }

    #[tokio::test]
    async fn test_no_credential_uses_fallback() {
        let analyzer = SymptomAnalyzer::new(Gateway::unavailable());
        let outcome = analyzer.analyze("I have a fever", None).await;
        assert!(outcome.used_fallback());
        assert_eq!(outcome.result.diseases[0], "Common Cold");
        assert_eq!(outcome.result.urgency, Urgency::Medium);
    }

    #[tokio::test]
    async fn test_gateway_failure_uses_fallback() {
        let gateway = Gateway::new(ScriptedGateway::failing(GatewayError::Status(503)));
        let outcome = SymptomAnalyzer::new(gateway).analyze("sore throat", None).await;
        assert!(outcome.used_fallback());
        assert_eq!(outcome.result.urgency, Urgency::Low);
    }

    #[tokio::test]
    async fn test_prose_answer_uses_fallback() {
        let gateway = Gateway::new(ScriptedGateway::replying("Please drink water and rest."));
        let outcome = SymptomAnalyzer::new(gateway).analyze("headache", None).await;
        assert!(outcome.used_fallback());
        assert!(outcome.result.diseases.contains(&"Migraine".to_string()));
    }

    #[tokio::test]
    async fn test_blank_object_uses_fallback() {
        let gateway = Gateway::new(ScriptedGateway::replying("{\"status\": \"done\"}"));
        let outcome = SymptomAnalyzer::new(gateway).analyze("tired", None).await;
        assert!(outcome.used_fallback());
        assert_eq!(
            outcome.result.diseases,
            vec!["Symptoms require professional evaluation".to_string()]
        );
    }
}
