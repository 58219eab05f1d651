//! Outbound HTTP clients.
//!
//! - [`completion`]: OpenAI-compatible chat-completion endpoint (OpenRouter)
//! - [`voice`]: voice-agent calling API used for emergency escalation
//!
//! Each client follows the same shape: a cloneable `reqwest::Client`, a base
//! URL that tests point at a local mock server, and a typed error enum so
//! callers can decide between retrying, falling back and reporting.

pub mod completion;
pub mod voice;

pub use completion::{CompletionGateway, GatewayError, OpenRouterClient};
pub use voice::{CallVariables, VoiceAgentClient, VoiceAgentError, VoiceCall, VoiceCaller};
