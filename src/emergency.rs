//! Emergency escalation for critical vitals.
//!
//! When a vitals analysis comes back with `emergency_triggered`, the
//! dispatcher resolves a location, persists an [`EmergencyAlert`] and asks
//! the voice agent to start a call. Failures are reported in the returned
//! [`DispatchOutcome`]; nothing here returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::clients::voice::{CallVariables, VoiceAgentError, VoiceCaller};
use crate::model::{AlertSeverity, EmergencyAlert, Location, VitalsAnalysis, VitalsReading};
use crate::storage::ReportStore;

/// Longest wait for a position fix.
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the patient's position when the request did not carry one.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// A position or an explicit unavailable marker.
    async fn locate(&self) -> Location;
}

/// For deployments with no position source at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocationProvider;

#[async_trait]
impl LocationProvider for NoLocationProvider {
    async fn locate(&self) -> Location {
        Location::not_supported()
    }
}

/// Result of one escalation attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    fn failed(emergency_id: Option<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            emergency_id,
            conversation_id: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct EmergencyDispatcher {
    store: ReportStore,
    caller: Option<Arc<dyn VoiceCaller>>,
    locator: Arc<dyn LocationProvider>,
    location_timeout: Duration,
}

impl EmergencyDispatcher {
    pub fn new(
        store: ReportStore,
        caller: Option<Arc<dyn VoiceCaller>>,
        locator: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            store,
            caller,
            locator,
            location_timeout: LOCATION_TIMEOUT,
        }
    }

    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    /// Persist an alert and request a call. Meant to be called once per
    /// analysis that triggered an emergency.
    #[instrument(skip_all, fields(location_supplied = location.is_some()))]
    pub async fn dispatch(
        &self,
        vitals: &VitalsReading,
        analysis: &VitalsAnalysis,
        location: Option<Location>,
    ) -> DispatchOutcome {
        let location = match location {
            Some(location) => location,
            None => self.resolve_location().await,
        };

        let alert = EmergencyAlert::critical_vitals(
            vitals.clone(),
            analysis.clone(),
            location,
            Utc::now(),
        );

        let emergency_id = match self.store.save_emergency_alert(&alert).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Emergency alert could not be persisted");
                return DispatchOutcome::failed(None, e);
            }
        };

        let variables = call_variables(&emergency_id, &alert);
        let call = match &self.caller {
            Some(caller) => caller.start_call(&variables).await,
            None => Err(VoiceAgentError::NotConfigured),
        };

        match call {
            Ok(call) => {
                info!(%emergency_id, conversation_id = %call.conversation_id, "Emergency response initiated");
                DispatchOutcome {
                    success: true,
                    emergency_id: Some(emergency_id),
                    conversation_id: Some(call.conversation_id),
                    error: None,
                }
            }
            Err(e) => {
                error!(%emergency_id, error = %e, "Emergency call could not be started");
                DispatchOutcome::failed(Some(emergency_id), e)
            }
        }
    }

    async fn resolve_location(&self) -> Location {
        match tokio::time::timeout(self.location_timeout, self.locator.locate()).await {
            Ok(location) => location,
            Err(_) => {
                warn!(timeout_secs = self.location_timeout.as_secs_f64(), "Location lookup timed out");
                Location::not_available()
            }
        }
    }
}

fn call_variables(emergency_id: &str, alert: &EmergencyAlert) -> CallVariables {
    let critical: Vec<&str> = alert
        .analysis
        .alerts
        .iter()
        .filter(|a| a.severity == AlertSeverity::High)
        .map(|a| a.kind.as_str())
        .collect();

    CallVariables {
        emergency_id: emergency_id.to_string(),
        location: alert.location.to_string(),
        vitals: alert.vitals.summary(),
        alerts: if critical.is_empty() {
            "Critical vitals".to_string()
        } else {
            critical.join("; ")
        },
        timestamp: alert.timestamp.to_rfc3339(),
    }
}
