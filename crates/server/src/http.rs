//! HTTP Endpoints
//!
//! REST API for translation and language detection.

use std::convert::Infallible;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use nllb_core::{LanguageCode, Prediction};
use nllb_detection::Thresholds;
use nllb_translation::{PoolStatus, TranslationRequest};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route(
            "/v4/translator",
            get(translate_get)
                .post(translate_post)
                .put(load_model)
                .delete(unload_model),
        )
        .route("/v4/translator/stream", get(translate_stream))
        .route("/v4/translator/tokens", post(count_tokens))
        .route("/v4/language", get(detect_language))
        .route("/v4/languages", get(list_languages));

    let root_path = state.settings.server.root_path.trim_end_matches('/').to_string();
    let router = if root_path.is_empty() {
        api
    } else {
        Router::new().nest(&root_path, api)
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Shields.io endpoint badge
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    schema_version: u8,
    label: String,
    message: &'static str,
    pool: PoolStatus,
}

async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        schema_version: 1,
        label: state.settings.server.app_name.clone(),
        message: "online",
        pool: state.translation.pool().status(),
    })
}

fn default_source() -> String {
    LanguageCode::EngLatn.as_str().to_string()
}

fn default_target() -> String {
    LanguageCode::SpaLatn.as_str().to_string()
}

#[derive(Debug, Deserialize)]
struct TranslateQuery {
    text: String,
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_target")]
    target: String,
}

#[derive(Debug, Deserialize)]
struct TranslateBody {
    text: String,
    source: String,
    target: String,
}

#[derive(Debug, Serialize)]
struct Translated {
    result: String,
}

async fn translate_get(
    State(state): State<AppState>,
    Query(query): Query<TranslateQuery>,
) -> Result<Json<Translated>, ServerError> {
    let request = TranslationRequest::parse(query.text, &query.source, &query.target)?;
    let result = state.translation.translate(request).await?;
    Ok(Json(Translated { result }))
}

async fn translate_post(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Result<Json<Translated>, ServerError> {
    let request = TranslationRequest::parse(body.text, &body.source, &body.target)?;
    let result = state.translation.translate(request).await?;
    Ok(Json(Translated { result }))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    text: String,
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_target")]
    target: String,
    /// Event name the client listens for; unnamed `message` events otherwise
    event_type: Option<String>,
}

/// Server-Sent Events stream of translation fragments
async fn translate_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    if let Some(name) = &query.event_type {
        if name.is_empty() || name.contains(['\n', '\r']) {
            return Err(ServerError::InvalidRequest(
                "event_type must be a non-empty single line".to_string(),
            ));
        }
    }

    let request = TranslationRequest::parse(query.text, &query.source, &query.target)?;
    let fragments = state.translation.translate_stream(request).await?;
    let event_type = query.event_type;

    let events = fragments.map(move |fragment| {
        Ok(match fragment {
            Ok(text) => {
                let event = Event::default().data(text);
                match &event_type {
                    Some(name) => event.event(name),
                    None => event,
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Streaming translation failed");
                Event::default().event("error").data(e.to_string())
            },
        })
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
struct TokensBody {
    text: String,
}

#[derive(Debug, Serialize)]
struct Tokens {
    length: usize,
}

async fn count_tokens(
    State(state): State<AppState>,
    Json(body): Json<TokensBody>,
) -> Result<Json<Tokens>, ServerError> {
    if body.text.is_empty() {
        return Err(ServerError::InvalidRequest("text must not be empty".to_string()));
    }
    let length = state.translation.count_tokens(&body.text)?;
    Ok(Json(Tokens { length }))
}

#[derive(Debug, Default, Deserialize)]
struct LoadQuery {
    #[serde(default)]
    keep_cache: bool,
}

#[derive(Debug, Default, Deserialize)]
struct UnloadQuery {
    #[serde(default)]
    to_cpu: bool,
}

fn transition_status(changed: bool) -> StatusCode {
    if changed {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_MODIFIED
    }
}

/// Load the model back onto its device
async fn load_model(
    State(state): State<AppState>,
    Query(query): Query<LoadQuery>,
) -> Result<StatusCode, ServerError> {
    let changed = state.lifecycle.load_model(query.keep_cache).await?;
    Ok(transition_status(changed))
}

/// Unload the model from its device
async fn unload_model(
    State(state): State<AppState>,
    Query(query): Query<UnloadQuery>,
) -> Result<StatusCode, ServerError> {
    let changed = state.lifecycle.unload_model(query.to_cpu).await?;
    Ok(transition_status(changed))
}

#[derive(Debug, Deserialize)]
struct LanguageQuery {
    text: String,
    fast_model_confidence_threshold: Option<f64>,
    accurate_model_confidence_threshold: Option<f64>,
}

async fn detect_language(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
) -> Result<Json<Prediction>, ServerError> {
    let defaults = state.detector.default_thresholds();
    let thresholds = Thresholds {
        fast: query.fast_model_confidence_threshold.unwrap_or(defaults.fast),
        accurate: query
            .accurate_model_confidence_threshold
            .unwrap_or(defaults.accurate),
    };

    let prediction = state.detector.detect(query.text, thresholds).await?;
    Ok(Json(prediction))
}

#[derive(Debug, Serialize)]
struct SupportedLanguage {
    code: LanguageCode,
    /// ISO 639-3
    language: &'static str,
    /// ISO 15924
    script: &'static str,
}

async fn list_languages() -> Json<Vec<SupportedLanguage>> {
    Json(
        LanguageCode::ALL
            .iter()
            .map(|&code| SupportedLanguage {
                code,
                language: code.language(),
                script: code.script(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nllb_config::Settings;

    fn stub_settings() -> Settings {
        let mut settings = Settings::default();
        settings.translator.stub = true;
        settings.detector.stub = true;
        settings
    }

    #[test]
    fn test_router_creation() {
        let state = AppState::from_settings(stub_settings()).unwrap();
        let _ = create_router(state);
    }

    #[test]
    fn test_router_without_root_path() {
        let mut settings = stub_settings();
        settings.server.root_path = "/".to_string();
        let state = AppState::from_settings(settings).unwrap();
        let _ = create_router(state);
    }

    #[test]
    fn test_transition_status() {
        assert_eq!(transition_status(true), StatusCode::NO_CONTENT);
        assert_eq!(transition_status(false), StatusCode::NOT_MODIFIED);
    }
}
