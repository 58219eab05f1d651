//! Arogya - decision core and HTTP service for a community health portal.
//!
//! # API Endpoints
//!
//! - `POST /session/login`, `POST /session/signup`, `POST /session/logout`, `GET /session`
//! - `PUT /profile`, `GET /profile/:uid`
//! - `POST /diagnosis`, `GET /reports/recent`
//! - `POST /chat`
//! - `POST /vitals`
//! - `POST /documents/analyze`
//! - `POST /hospitals/nearby`, `POST /hospitals/lookup`
//! - `POST /predictions`
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use arogya::analysis::Gateway;
use arogya::api::{AppState, router};
use arogya::clients::{OpenRouterClient, VoiceAgentClient, VoiceCaller};
use arogya::config::Config;
use arogya::emergency::{EmergencyDispatcher, NoLocationProvider};
use arogya::session::{FileSessionBackend, SessionManager};
use arogya::storage::{LocalStore, ReportStore, Storage};
use arogya::vitals::VitalsRuleEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Symptom text and vitals are only logged at debug level and below
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("arogya=info".parse()?))
        .init();

    let config = Config::from_env();
    info!(
        port = config.port,
        db_url = %config.database_url,
        ai = config.ai_configured(),
        voice_agent = config.voice_agent_configured(),
        "Starting Arogya server"
    );

    // The local store carries everything when the database cannot be opened
    let primary = match Storage::new(&config.database_url).await {
        Ok(storage) => {
            info!("Database initialized");
            Some(storage)
        }
        Err(e) => {
            warn!(error = %e, fallback_dir = %config.fallback_dir.display(), "Database unavailable, using local store only");
            None
        }
    };
    let store = ReportStore::new(primary, LocalStore::new(&config.fallback_dir));

    let gateway = match &config.openrouter_api_key {
        Some(key) => {
            let mut client = OpenRouterClient::with_base_url(&config.openrouter_base_url, key.clone())
                .with_timeout(config.ai_timeout);
            if let Some(model) = &config.openrouter_model {
                client = client.with_model(model.clone());
            }
            info!(model = %client.model(), "Completion gateway configured");
            Gateway::new(client)
        }
        None => {
            warn!("OPENROUTER_API_KEY not set, all analyses will use fallbacks");
            Gateway::unavailable()
        }
    };

    let caller: Option<Arc<dyn VoiceCaller>> = match (&config.voice_agent_api_key, &config.voice_agent_id) {
        (Some(key), Some(agent_id)) => Some(Arc::new(
            VoiceAgentClient::with_base_url(&config.voice_agent_base_url, key.clone(), agent_id.clone())
                .with_timeout(config.voice_call_timeout),
        )),
        _ => {
            warn!("Voice agent not configured, emergencies will be recorded without a call");
            None
        }
    };
    let dispatcher = EmergencyDispatcher::new(store.clone(), caller, Arc::new(NoLocationProvider));

    let sessions = SessionManager::new(Arc::new(FileSessionBackend::new(config.fallback_dir.join("sessions"))));

    let state = AppState::new(gateway, VitalsRuleEngine::default(), store, dispatcher, sessions);
    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Arogya is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
