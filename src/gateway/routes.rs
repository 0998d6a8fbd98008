//! HTTP routes: the paid generation endpoint and its service description.

use crate::backend::GenerativeBackend;
use crate::event::{GateEvent, GateEventsSender};
use crate::gateway::response::{decision_response, PriceTag};
use crate::payment::{extract_proof, Decision, PaymentRequirement, PaymentVerifier};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Path of the paid generation endpoint.
pub const AI_ENDPOINT: &str = "/api/ai";

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Payment verifier.
    pub verifier: Arc<PaymentVerifier>,
    /// What each generation costs.
    pub requirement: Arc<PaymentRequirement>,
    /// The metered backend.
    pub backend: Arc<dyn GenerativeBackend>,
    /// Event publisher.
    pub events: GateEventsSender,
    /// Human readable price details.
    pub price: Arc<PriceTag>,
    /// Model used when a request names none.
    pub default_model: Arc<str>,
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Prompt text.
    pub prompt: String,
    /// Model to use.
    pub model: String,
}

/// Validate a request body.
///
/// # Errors
///
/// Returns a message for the caller if the body is not JSON or lacks a
/// non-empty string `prompt`.
pub fn parse_generate_request(body: &[u8], default_model: &str) -> Result<GenerateRequest, String> {
    const PROMPT_REQUIRED: &str = "Invalid request: 'prompt' is required and must be a string";

    let value: Value = serde_json::from_slice(body).map_err(|_| PROMPT_REQUIRED.to_string())?;
    let prompt = value
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PROMPT_REQUIRED.to_string())?;
    let model = match value.get("model") {
        None | Some(Value::Null) => default_model,
        Some(Value::String(m)) if !m.is_empty() => m.as_str(),
        Some(_) => return Err("Invalid request: 'model' must be a string".to_string()),
    };

    Ok(GenerateRequest {
        prompt: prompt.to_string(),
        model: model.to_string(),
    })
}

/// Build the router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(AI_ENDPOINT, get(describe).post(generate))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn missing_api_key() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Server Configuration Error: Missing API Key" })),
    )
        .into_response()
}

fn publish(events: &GateEventsSender, credential: Option<&str>, decision: &Decision) {
    let event = match decision {
        Decision::Admit(admission) => GateEvent::PaymentAdmitted {
            proof: admission.proof.to_string(),
            amount: admission.paid.to_string(),
        },
        Decision::Reject(rejection) => GateEvent::PaymentRejected {
            proof: credential.map(str::to_string),
            reason: rejection.code().to_string(),
        },
        Decision::Error(e) => GateEvent::VerificationFailed {
            proof: credential.map(str::to_string),
            message: e.to_string(),
        },
    };
    let _ = events.send(event);
}

async fn describe(State(state): State<GatewayState>) -> Json<Value> {
    let instructions = state.requirement.instructions(state.verifier.network());
    Json(json!({
        "message": "AI API Gateway is running",
        "endpoint": AI_ENDPOINT,
        "method": "POST",
        "paymentRequired": true,
        "cost": format!("{} Token", state.price.display_price),
        "network": state.price.network_name,
        "payment": instructions,
    }))
}

async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "verifier": state.verifier.stats(),
        "store": state.verifier.store_stats(),
    }))
}

async fn generate(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    let credential = extract_proof(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()));
    let parsed = parse_generate_request(&body, &state.default_model);

    // A request that cannot be served must not spend the caller's payment.
    if credential.is_some() {
        if let Err(message) = &parsed {
            return bad_request(message.clone());
        }
        if !state.backend.is_configured() {
            warn!("Refusing paid request: backend API key is missing");
            return missing_api_key();
        }
    }

    let decision = state.verifier.verify(credential, &state.requirement).await;
    publish(&state.events, credential, &decision);

    let instructions = state.requirement.instructions(state.verifier.network());
    if let Some(response) = decision_response(&decision, &instructions, &state.price) {
        return response;
    }

    let request = match parsed {
        Ok(request) => request,
        Err(message) => return bad_request(message),
    };

    match state.backend.generate(&request.prompt, &request.model).await {
        Ok(text) => Json(json!({
            "success": true,
            "data": {
                "text": text,
                "model": request.model,
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }))
        .into_response(),
        Err(e) => {
            warn!("Generation failed after admitted payment: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate AI response",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
