//! Medical report summaries.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{Analyzed, Gateway};
use crate::fallback;
use crate::model::{Urgency, lenient};

const SYSTEM_PROMPT: &str = r#"You are a medical report analyzer. Analyze the medical report and return ONLY valid JSON:
{
  "summary": "brief summary of the report",
  "keyFindings": ["finding1", "finding2"],
  "abnormalValues": [{"parameter": "name", "value": "result", "normalRange": "range"}],
  "recommendations": ["recommendation1", "recommendation2"],
  "followUp": "follow-up actions needed",
  "urgency": "low|medium|high"
}"#;

/// A lab value outside its reference range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbnormalValue {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub parameter: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub normal_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub key_findings: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub abnormal_values: Vec<AbnormalValue>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default", skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

impl DocumentAnalysis {
    fn is_blank(&self) -> bool {
        self.summary.is_empty() && self.key_findings.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentAnalyzer {
    gateway: Gateway,
}

impl DocumentAnalyzer {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[instrument(skip_all, fields(length = document_text.len()))]
    pub async fn analyze(&self, document_text: &str) -> Analyzed<DocumentAnalysis> {
        let prompt = format!("Analyze this medical report: {document_text}");
        let answer = self
            .gateway
            .ask_json::<DocumentAnalysis>("document", SYSTEM_PROMPT, &prompt)
            .await
            .filter(|analysis| !analysis.is_blank());

        let outcome = Analyzed::or_fallback(answer, fallback::document_analysis);
        info!(source = ?outcome.source, findings = outcome.result.key_findings.len(), "Document analysed");
        outcome
    }
}
