//! Vitals analysis: a model suggestion, always checked by the rule engine.

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{Analyzed, Gateway};
use crate::model::{VitalsAnalysis, VitalsReading};
use crate::vitals::{SuggestedAnalysis, VitalsRuleEngine};

const SYSTEM_PROMPT: &str = r#"You are a clinical vitals assistant. Assess the readings and return ONLY valid JSON:
{
  "status": "normal|concerning|critical",
  "alerts": [{"type": "short label", "message": "what is wrong", "severity": "low|medium|high", "explanation": "why it matters"}],
  "recommendations": ["recommendation1", "recommendation2"]
}"#;

#[derive(Debug, Clone, Default)]
pub struct VitalsAnalyzer {
    gateway: Gateway,
    engine: VitalsRuleEngine,
}

impl VitalsAnalyzer {
    pub fn new(gateway: Gateway, engine: VitalsRuleEngine) -> Self {
        Self { gateway, engine }
    }

    /// Ask for a suggestion, then apply the rules on top of it.
    ///
    /// Without a usable suggestion the rules run alone, so the safety checks
    /// hold whichever path is taken.
    #[instrument(skip_all)]
    pub async fn analyze(&self, vitals: &VitalsReading) -> Analyzed<VitalsAnalysis> {
        let prompt = format!("Analyze these vital signs: {}", vitals.summary());
        let suggestion = self
            .gateway
            .ask_object("vitals", SYSTEM_PROMPT, &prompt)
            .await
            .map(|object| SuggestedAnalysis::from_value(&Value::Object(object)));

        let outcome = match suggestion {
            Some(suggested) => Analyzed::ai(self.engine.evaluate(vitals, suggested)),
            None => Analyzed::fallback(self.engine.evaluate(vitals, SuggestedAnalysis::default())),
        };

        if outcome.result.emergency_triggered {
            warn!(
                status = ?outcome.result.status,
                alerts = outcome.result.alerts.len(),
                "Critical vitals detected"
            );
        } else {
            info!(status = ?outcome.result.status, source = ?outcome.source, "Vitals analysed");
        }
        outcome
    }
}
