//! AI-backed analyzers.
//!
//! Every analyzer follows one policy: build a prompt, ask the completion
//! gateway, recover a JSON object from the answer, and substitute a
//! deterministic fallback when the gateway is missing, fails, or answers
//! with something unusable. There are no retries, and the caller always gets
//! a result together with the [`AnalysisSource`] that produced it.
//!
//! - [`symptoms`]: diagnosis from a symptom description
//! - [`chat`]: first-aid chat replies
//! - [`vitals`]: model suggestion plus the vitals rule engine
//! - [`documents`]: medical report summaries
//! - [`hospitals`]: nearby hospitals, named-hospital lookup, reverse geocoding
//! - [`outlook`]: health outcome predictions and trend analysis

pub mod chat;
pub mod documents;
pub mod hospitals;
pub mod outlook;
pub mod symptoms;
pub mod vitals;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::clients::{CompletionGateway, GatewayError};
use crate::extract;
use crate::model::ChatMessage;

pub use chat::ChatAssistant;
pub use documents::{DocumentAnalysis, DocumentAnalyzer};
pub use hospitals::{Hospital, HospitalFinder, HospitalList, HospitalLookup};
pub use outlook::{HealthOutlook, HealthPredictor, PredictionRequest, TrendReport};
pub use symptoms::SymptomAnalyzer;
pub use vitals::VitalsAnalyzer;

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    /// Parsed from the model's answer.
    Ai,
    /// Deterministic substitute.
    Fallback,
}

/// A result tagged with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analyzed<T> {
    pub result: T,
    pub source: AnalysisSource,
}

impl<T> Analyzed<T> {
    pub fn ai(result: T) -> Self {
        Self {
            result,
            source: AnalysisSource::Ai,
        }
    }

    pub fn fallback(result: T) -> Self {
        Self {
            result,
            source: AnalysisSource::Fallback,
        }
    }

    pub fn used_fallback(&self) -> bool {
        self.source == AnalysisSource::Fallback
    }

    /// Use the model's answer when present, otherwise compute the fallback.
    pub fn or_fallback(answer: Option<T>, fallback: impl FnOnce() -> T) -> Self {
        match answer {
            Some(result) => Self::ai(result),
            None => Self::fallback(fallback()),
        }
    }
}

/// Shared, possibly absent, handle to the completion gateway.
///
/// An absent gateway means no usable credential was configured; every
/// request then goes straight to the fallback.
#[derive(Clone, Default)]
pub struct Gateway(Option<Arc<dyn CompletionGateway>>);

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gateway")
            .field(&if self.is_configured() { "configured" } else { "unavailable" })
            .finish()
    }
}

impl Gateway {
    pub fn new(gateway: impl CompletionGateway + 'static) -> Self {
        Self(Some(Arc::new(gateway)))
    }

    pub fn from_arc(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self(Some(gateway))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    /// Run a conversation and return the raw answer, or `None` when the
    /// fallback should be used.
    pub async fn complete_text(&self, task: &'static str, messages: Vec<ChatMessage>) -> Option<String> {
        let gateway = self.configured(task)?;
        answered(task, gateway.complete(messages).await)
    }

    /// Single-turn variant of [`Gateway::complete_text`].
    pub async fn ask_text(&self, task: &'static str, system: &str, prompt: &str) -> Option<String> {
        let gateway = self.configured(task)?;
        answered(task, gateway.ask(system, prompt).await)
    }

    /// Ask with a system instruction and recover the JSON object in the answer.
    pub async fn ask_object(&self, task: &'static str, system: &str, prompt: &str) -> Option<Map<String, Value>> {
        let text = self.ask_text(task, system, prompt).await?;
        let object = extract::extract_object(&text);
        if object.is_none() {
            warn!(task, length = text.len(), "Model answer had no JSON object, using fallback");
        }
        object
    }

    /// Like [`Gateway::ask_object`] but deserialized into `T`.
    pub async fn ask_json<T: DeserializeOwned>(&self, task: &'static str, system: &str, prompt: &str) -> Option<T> {
        let text = self.ask_text(task, system, prompt).await?;
        let value = extract::extract_as(&text);
        if value.is_none() {
            warn!(task, length = text.len(), "Model answer had no usable JSON, using fallback");
        }
        value
    }

    fn configured(&self, task: &'static str) -> Option<&Arc<dyn CompletionGateway>> {
        if self.0.is_none() {
            warn!(task, "Completion gateway not configured, using fallback");
        }
        self.0.as_ref()
    }
}

fn answered(task: &'static str, answer: Result<String, GatewayError>) -> Option<String> {
    match answer {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(task, error = %e, "Completion failed, using fallback");
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedGateway;
    use super::*;
    use crate::clients::GatewayError;
    use serde_json::json;

    #[tokio::test]
    async fn test_unavailable_gateway_returns_none() {
        let gateway = Gateway::unavailable();
        assert!(!gateway.is_configured());
        assert_eq!(gateway.ask_object("test", "sys", "prompt").await, None);
    }

    #[tokio::test]
    async fn test_ask_object_extracts_from_prose() {
        let gateway = Gateway::new(ScriptedGateway::replying("Sure! {\"ok\": true}"));
        let object = gateway.ask_object("test", "sys", "prompt").await.unwrap();
        assert_eq!(Value::Object(object), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_ask_json_sends_single_turn_and_checks_shape() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Answer {
            ok: bool,
        }

        let scripted = Arc::new(ScriptedGateway::answering(vec![
            Ok("```json\n{\"ok\": true}\n```".to_string()),
            Ok("{\"other\": 1}".to_string()),
        ]));
        let gateway = Gateway::from_arc(scripted.clone());

        assert_eq!(gateway.ask_json::<Answer>("test", "sys", "prompt").await, Some(Answer { ok: true }));
        assert_eq!(gateway.ask_json::<Answer>("test", "sys", "prompt").await, None);

        let requests = scripted.requests.lock().unwrap();
        assert_eq!(requests[0], vec![ChatMessage::system("sys"), ChatMessage::user("prompt")]);
    }

    #[tokio::test]
    async fn test_gateway_error_becomes_none() {
        let gateway = Gateway::new(ScriptedGateway::failing(GatewayError::Timeout));
        assert_eq!(gateway.complete_text("test", vec![]).await, None);
    }

    #[test]
    fn test_or_fallback() {
        let ai = Analyzed::or_fallback(Some(1), || 2);
        assert_eq!(ai.result, 1);
        assert_eq!(ai.source, AnalysisSource::Ai);

        let fallback = Analyzed::or_fallback(None, || 2);
        assert_eq!(fallback.result, 2);
        assert!(fallback.used_fallback());

        let wire = serde_json::to_value(&fallback).unwrap();
        assert_eq!(wire, json!({"result": 2, "source": "fallback"}));
    }
}
