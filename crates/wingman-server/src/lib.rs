//! Wingman server library logic.
//!
//! Hosts the voice interview pipeline behind an axum router: a health check
//! and the `/ws/voice` duplex endpoint. Each WebSocket connection owns one
//! [`wingman_pipeline::Session`].

pub mod api_ws;
pub mod config;
pub mod store;

use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wingman_db::DbPool;
use wingman_pipeline::{Services, SessionOptions};
use wingman_voice::{FalSynthesizer, FalTranscriber, OpenRouterCompleter, VoiceConfig, VoiceError};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Remote voice clients and the session store.
    pub services: Services,
    /// Defaults applied to every new session.
    pub options: SessionOptions,
}

/// Builds the production services: fal for speech, OpenRouter for
/// completions, SQLite for persistence.
///
/// # Errors
///
/// Returns `VoiceError` if the HTTP client cannot be built.
pub fn build_services(pool: DbPool, voice: &VoiceConfig) -> Result<Services, VoiceError> {
    let http = wingman_voice::http_client()?;
    Ok(Services {
        transcriber: Arc::new(FalTranscriber::new(http.clone(), voice)),
        completer: Arc::new(OpenRouterCompleter::new(http.clone(), voice)),
        synthesizer: Arc::new(FalSynthesizer::new(http, voice)),
        store: Arc::new(store::SqliteSessionStore::new(pool)),
    })
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/voice", get(api_ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let pool = wingman_db::create_pool(":memory:", wingman_db::DbRuntimeSettings::default())
            .unwrap();
        AppState {
            services: build_services(pool, &VoiceConfig::default()).unwrap(),
            options: SessionOptions::default(),
        }
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let response = app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn voice_route_requires_upgrade() {
        let response = app(test_state())
            .oneshot(
                Request::builder()
                    .uri("/ws/voice?interviewId=iv-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
