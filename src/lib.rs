pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use crate::config::Config;
use crate::services::{
    ai_service::{AIService, GenerationSettings, ModelGateway},
    conversation::ScreeningSettings,
    session_service::{SessionPolicy, SessionService},
};
use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(config: &Config) -> error::Result<Self> {
        let http_client = Client::builder()
            .timeout(config.model_timeout())
            .build()
            .map_err(|e| error::Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let ai_service = AIService::new(
            config.gemini_api_key.clone(),
            http_client,
            GenerationSettings {
                model: config.gemini_model.clone(),
                base_url: config.gemini_base_url.clone(),
                safety_threshold: config.safety_threshold.clone(),
                google_search: config.google_search,
                thinking_budget: config.thinking_budget,
                timeout: config.model_timeout(),
            },
        );

        let settings = ScreeningSettings {
            exit_keywords: config.exit_keywords.clone(),
            record_feedback: config.record_feedback,
            model_timeout: config.model_timeout(),
        };

        Ok(Self::with_gateway(
            Arc::new(ai_service),
            settings,
            SessionPolicy {
                max_sessions: config.max_sessions,
                expose_diagnostics: config.expose_diagnostics,
            },
        ))
    }

    pub fn with_gateway(
        gateway: Arc<dyn ModelGateway>,
        settings: ScreeningSettings,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions: SessionService::new(gateway, settings, policy),
        }
    }
}

pub fn app(state: AppState, session_rps: u32) -> Router {
    let session_api = Router::new()
        .route("/api/sessions", post(routes::session::create_session))
        .route(
            "/api/sessions/:id",
            get(routes::session::get_session).delete(routes::session::end_session),
        )
        .route(
            "/api/sessions/:id/messages",
            post(routes::session::send_message),
        )
        .route(
            "/api/sessions/:id/answer",
            post(routes::session::submit_answer),
        )
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::RequestBudget::new(session_rps),
            middleware::rate_limit::budget_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(session_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
