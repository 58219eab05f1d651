//! Arogya - decision core of a community health portal.
//!
//! # Overview
//!
//! Arogya turns symptom descriptions, vital signs and medical documents into
//! structured health guidance. Free-form analysis is delegated to a
//! chat-completion model; everything the model returns is treated as
//! untrusted text, parsed leniently, and replaced by a deterministic
//! fallback when unusable.
//!
//! # Safety Guarantees
//!
//! - Critical vitals are detected by fixed rules ([`vitals::VitalsRuleEngine`])
//!   whatever the model says, and always escalate.
//! - A missing credential or a failing model never fails a request; the
//!   response carries the fallback and says so.
//! - Persistence is best effort: SQLite first, local JSON files second.
//!
//! # Modules
//!
//! - [`model`]: Data types for vitals, diagnoses, profiles and alerts
//! - [`vitals`]: Rule engine for critical vital signs
//! - [`extract`]: Recovering a JSON object from model output
//! - [`fallback`]: Deterministic answers used when the model is unavailable
//! - [`clients`]: Completion gateway and voice-agent clients
//! - [`analysis`]: AI-backed analyzers with fallbacks
//! - [`emergency`]: Escalation of critical vitals
//! - [`storage`]: SQLite storage with local-file fallback
//! - [`session`]: Sessions and submission sequencing
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP API handlers

pub mod analysis;
pub mod api;
pub mod clients;
pub mod config;
pub mod emergency;
pub mod extract;
pub mod fallback;
pub mod model;
pub mod session;
pub mod storage;
pub mod vitals;
