//! HTTP API handlers for Arogya.
//!
//! Every analysis endpoint answers with a result even when the completion
//! gateway is down; the `source` field says whether the model or the
//! fallback produced it. Only malformed requests are rejected with 4xx.
//!
//! Requests that carry an `x-session-token` header are tied to that
//! session: diagnoses are saved under the user, and a submission that has
//! been superseded by a newer one from the same session is answered with
//! `409 Conflict` instead of its result.
//!
//! Symptom text, vitals values and document contents are never logged.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::analysis::{
    Analyzed, AnalysisSource, ChatAssistant, DocumentAnalysis, DocumentAnalyzer, Gateway, HealthOutlook,
    HealthPredictor, HospitalFinder, HospitalList, HospitalLookup, PredictionRequest, SymptomAnalyzer, TrendReport,
    VitalsAnalyzer,
};
use crate::emergency::{DispatchOutcome, EmergencyDispatcher};
use crate::model::{
    ChatRequest, DiagnosisReport, DiagnosisRequest, DiagnosisResult, RecentReportsQuery, UserProfile,
    VitalsAnalysis, VitalsRequest,
};
use crate::session::{AuthSession, SESSION_HEADER, SessionError, SessionManager, SubmissionTracker};
use crate::storage::ReportStore;
use crate::vitals::VitalsRuleEngine;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub tracker: SubmissionTracker,
    pub store: ReportStore,
    pub symptoms: SymptomAnalyzer,
    pub chat: ChatAssistant,
    pub vitals: VitalsAnalyzer,
    pub documents: DocumentAnalyzer,
    pub hospitals: HospitalFinder,
    pub predictor: HealthPredictor,
    pub dispatcher: EmergencyDispatcher,
}

impl AppState {
    /// Wire every analyzer to the same gateway.
    pub fn new(
        gateway: Gateway,
        engine: VitalsRuleEngine,
        store: ReportStore,
        dispatcher: EmergencyDispatcher,
        sessions: SessionManager,
    ) -> Self {
        Self {
            sessions,
            tracker: SubmissionTracker::new(),
            store,
            symptoms: SymptomAnalyzer::new(gateway.clone()),
            chat: ChatAssistant::new(gateway.clone()),
            vitals: VitalsAnalyzer::new(gateway.clone(), engine),
            documents: DocumentAnalyzer::new(gateway.clone()),
            hospitals: HospitalFinder::new(gateway.clone()),
            predictor: HealthPredictor::new(gateway),
            dispatcher,
        }
    }
}

/// All routes, with `state` attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/session", get(get_session))
        .route("/session/login", post(post_login))
        .route("/session/signup", post(post_signup))
        .route("/session/logout", post(post_logout))
        .route("/profile", put(put_profile))
        .route("/profile/:uid", get(get_profile))
        .route("/diagnosis", post(post_diagnosis))
        .route("/reports/recent", get(get_recent_reports))
        .route("/chat", post(post_chat))
        .route("/vitals", post(post_vitals))
        .route("/documents/analyze", post(post_document))
        .route("/hospitals/nearby", post(post_nearby_hospitals))
        .route("/hospitals/lookup", post(post_hospital_lookup))
        .route("/predictions", post(post_predictions))
        .with_state(state)
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<(String, AuthSession)> {
    let token = session_token(headers)?;
    let session = state.sessions.current(token).await?;
    Some((token.to_string(), session))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    /// Accepted and ignored in demo mode.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub session: AuthSession,
}

fn session_response(result: Result<(String, AuthSession), SessionError>) -> Result<Json<SessionResponse>, StatusCode> {
    match result {
        Ok((token, session)) => Ok(Json(SessionResponse { token, session })),
        Err(SessionError::MissingEmail) => Err(StatusCode::BAD_REQUEST),
        Err(e) => {
            warn!(error = %e, "Failed to start session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /session/login - Demo sign-in; any email is accepted.
#[instrument(skip_all)]
pub async fn post_login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    session_response(state.sessions.login(&request.email).await)
}

/// POST /session/signup - Demo account creation with a fresh uid.
#[instrument(skip_all)]
pub async fn post_signup(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    session_response(state.sessions.signup(&request.email).await)
}

/// POST /session/logout
#[instrument(skip_all)]
pub async fn post_logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(token) = session_token(&headers) else {
        return StatusCode::NO_CONTENT;
    };

    match state.sessions.logout(token).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(SessionError::InvalidToken) => StatusCode::NO_CONTENT,
        Err(e) => {
            warn!(error = %e, "Failed to end session");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /session - The session behind the request's token.
#[instrument(skip_all)]
pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<AuthSession>, StatusCode> {
    current_session(&state, &headers)
        .await
        .map(|(_, session)| Json(session))
        .ok_or(StatusCode::UNAUTHORIZED)
}

// ============================================================================
// Profiles and reports
// ============================================================================

/// PUT /profile - Save the signed-in user's profile and mark it complete.
#[instrument(skip_all)]
pub async fn put_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, StatusCode> {
    let (_, session) = current_session(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    profile.uid = session.uid;
    profile.profile_complete = true;

    match state.store.save_profile(&profile).await {
        Some(saved) => {
            info!(uid = %saved.uid, "Profile saved");
            Ok(Json(saved))
        }
        None => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /profile/:uid
#[instrument(skip(state))]
pub async fn get_profile(State(state): State<AppState>, Path(uid): Path<String>) -> Result<Json<UserProfile>, StatusCode> {
    state.store.load_profile(&uid).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /reports/recent - The signed-in user's latest diagnoses, newest first.
#[instrument(skip_all, fields(limit = query.limit))]
pub async fn get_recent_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecentReportsQuery>,
) -> Result<Json<Vec<DiagnosisReport>>, StatusCode> {
    let (_, session) = current_session(&state, &headers)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let reports = state.store.recent_reports(&session.uid, query.limit).await;
    info!(count = reports.len(), "Recent reports queried");
    Ok(Json(reports))
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub result: DiagnosisResult,
    pub source: AnalysisSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

/// POST /diagnosis - Analyze a symptom description.
///
/// With a session the result is saved as a report; `reportId` is absent
/// when neither store accepted it.
#[instrument(skip_all)]
pub async fn post_diagnosis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DiagnosisRequest>,
) -> Result<Json<DiagnosisResponse>, StatusCode> {
    if request.symptoms.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let session = current_session(&state, &headers).await;
    let submission = match &session {
        Some((token, _)) => {
            let key = format!("diagnosis:{token}");
            let id = state.tracker.begin(&key).await;
            Some((key, id))
        }
        None => None,
    };

    let analyzed = state.symptoms.analyze(&request.symptoms, request.patient.as_ref()).await;

    if let Some((key, id)) = &submission {
        if !state.tracker.is_current(key, *id).await {
            info!(submission = id, "Discarding superseded diagnosis");
            return Err(StatusCode::CONFLICT);
        }
    }

    let report_id = match &session {
        Some((_, session)) => state
            .store
            .save_report(&session.uid, &request.symptoms, &analyzed.result, &request.location, Utc::now())
            .await
            .map(|report| report.id),
        None => None,
    };

    info!(
        source = ?analyzed.source,
        urgency = ?analyzed.result.urgency,
        saved = report_id.is_some(),
        "Diagnosis produced"
    );

    Ok(Json(DiagnosisResponse {
        result: analyzed.result,
        source: analyzed.source,
        report_id,
    }))
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub source: AnalysisSource,
}

/// POST /chat - First-aid assistant reply.
#[instrument(skip_all, fields(history = request.history.len()))]
pub async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    if request.message.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let Analyzed { result, source } = state.chat.reply(&request.message, &request.history).await;
    Ok(Json(ChatResponse { reply: result, source }))
}

#[derive(Debug, Serialize)]
pub struct VitalsResponse {
    pub analysis: VitalsAnalysis,
    pub source: AnalysisSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency: Option<DispatchOutcome>,
}

/// POST /vitals - Analyze vitals and escalate when they are critical.
///
/// An emergency is dispatched even when the submission turns out to be
/// superseded; only the response is withheld.
#[instrument(skip_all, fields(location_supplied = request.location.is_some()))]
pub async fn post_vitals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VitalsRequest>,
) -> Result<Json<VitalsResponse>, StatusCode> {
    let submission = match current_session(&state, &headers).await {
        Some((token, _)) => {
            let key = format!("vitals:{token}");
            let id = state.tracker.begin(&key).await;
            Some((key, id))
        }
        None => None,
    };

    let Analyzed { result: analysis, source } = state.vitals.analyze(&request.vitals).await;

    let emergency = if analysis.emergency_triggered {
        Some(
            state
                .dispatcher
                .dispatch(&request.vitals, &analysis, request.location.clone())
                .await,
        )
    } else {
        None
    };

    if let Some((key, id)) = &submission {
        if !state.tracker.is_current(key, *id).await {
            info!(submission = id, "Discarding superseded vitals analysis");
            return Err(StatusCode::CONFLICT);
        }
    }

    Ok(Json(VitalsResponse {
        analysis,
        source,
        emergency,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    #[serde(default)]
    pub text: String,
}

/// POST /documents/analyze - Summarize the text of a medical report.
#[instrument(skip_all)]
pub async fn post_document(
    State(state): State<AppState>,
    Json(request): Json<DocumentRequest>,
) -> Result<Json<Analyzed<DocumentAnalysis>>, StatusCode> {
    if request.text.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(state.documents.analyze(&request.text).await))
}

// ============================================================================
// Hospitals
// ============================================================================

/// Either a place name or a coordinate pair.
#[derive(Debug, Deserialize)]
pub struct NearbyRequest {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    /// The place name the search ran against.
    pub location: String,
    pub result: HospitalList,
    pub source: AnalysisSource,
}

/// POST /hospitals/nearby
///
/// Coordinates without a place name are first turned into one.
#[instrument(skip_all)]
pub async fn post_nearby_hospitals(
    State(state): State<AppState>,
    Json(request): Json<NearbyRequest>,
) -> Result<Json<NearbyResponse>, StatusCode> {
    let named = request
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let location = match (named, request.latitude, request.longitude) {
        (Some(location), _, _) => location,
        (None, Some(latitude), Some(longitude)) => {
            state.hospitals.identify_location(latitude, longitude).await.result
        }
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    let Analyzed { result, source } = state.hospitals.find_nearby(&location).await;
    info!(count = result.hospitals.len(), source = ?source, "Nearby hospitals listed");
    Ok(Json(NearbyResponse {
        location,
        result,
        source,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}

/// POST /hospitals/lookup - Find one named hospital near a place.
#[instrument(skip_all)]
pub async fn post_hospital_lookup(
    State(state): State<AppState>,
    Json(request): Json<LookupRequest>,
) -> Result<Json<Analyzed<HospitalLookup>>, StatusCode> {
    if request.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(
        state.hospitals.find_specific(&request.name, &request.location).await,
    ))
}

// ============================================================================
// Predictions
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub outlook: Analyzed<HealthOutlook>,
    pub trends: Analyzed<TrendReport>,
}

/// POST /predictions - Outcome prediction and trend analysis, run together.
#[instrument(skip_all, fields(readings = request.vitals_history.len()))]
pub async fn post_predictions(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Json<PredictionsResponse> {
    let (outlook, trends) = tokio::join!(
        state.predictor.predict(&request),
        state.predictor.analyze_trends(&request)
    );
    Json(PredictionsResponse { outlook, trends })
}
