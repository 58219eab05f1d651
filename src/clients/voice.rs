//! Voice-agent client used to place an emergency call session.
//!
//! The agent is a hosted conversational voice bot. Starting a conversation
//! hands it a set of dynamic variables (where the patient is, what the
//! readings were) that it reads out to the responder.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Base URL for the voice-agent API.
pub const VOICE_AGENT_API_BASE: &str = "https://api.elevenlabs.io/v1";

/// Longest wait for the agent to accept a call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum VoiceAgentError {
    #[error("voice agent not configured")]
    NotConfigured,

    #[error("voice agent request timed out")]
    Timeout,

    #[error("voice agent request failed: {0}")]
    Transport(String),

    #[error("voice agent returned status {0}")]
    Status(u16),

    #[error("voice agent response had no conversation id")]
    MissingConversation,
}

impl From<reqwest::Error> for VoiceAgentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VoiceAgentError::Timeout
        } else {
            VoiceAgentError::Transport(e.to_string())
        }
    }
}

/// Variables the agent reads out during the call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallVariables {
    pub emergency_id: String,
    pub location: String,
    pub vitals: String,
    pub alerts: String,
    pub timestamp: String,
}

/// A started call session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceCall {
    pub conversation_id: String,
}

/// Places emergency calls.
#[async_trait]
pub trait VoiceCaller: Send + Sync {
    async fn start_call(&self, variables: &CallVariables) -> Result<VoiceCall, VoiceAgentError>;
}

#[derive(Debug, Serialize)]
struct StartConversation<'a> {
    agent_id: &'a str,
    variables: &'a CallVariables,
}

#[derive(Debug, Deserialize)]
struct StartConversationResponse {
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Client for the conversational voice-agent API.
#[derive(Clone)]
pub struct VoiceAgentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    agent_id: String,
    timeout: Duration,
}

impl VoiceAgentClient {
    pub fn new(api_key: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self::with_base_url(VOICE_AGENT_API_BASE, api_key, agent_id)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            agent_id: agent_id.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl VoiceCaller for VoiceAgentClient {
    async fn start_call(&self, variables: &CallVariables) -> Result<VoiceCall, VoiceAgentError> {
        if self.api_key.trim().is_empty() || self.agent_id.trim().is_empty() {
            return Err(VoiceAgentError::NotConfigured);
        }

        let url = format!("{}/convai/conversations", self.base_url);
        debug!(agent_id = %self.agent_id, emergency_id = %variables.emergency_id, "Starting voice call");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("xi-api-key", &self.api_key)
            .json(&StartConversation {
                agent_id: &self.agent_id,
                variables,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceAgentError::Status(status.as_u16()));
        }

        let data = response.json::<StartConversationResponse>().await?;
        data.conversation_id
            .filter(|id| !id.is_empty())
            .map(|conversation_id| VoiceCall { conversation_id })
            .ok_or(VoiceAgentError::MissingConversation)
    }
}
