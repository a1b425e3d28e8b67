//! HTTP API for the Launchpad license server.
//!
//! Routes:
//! - `POST /api/v1/validate` checks a machine against a license key
//! - `POST /api/v1/register` issues a new license
//! - `GET /health` liveness probe
//!
//! Business-rule rejections (unknown key, no seats left) are ordinary 200
//! responses with `valid: false`. Only malformed requests (400) and store
//! failures (500) use error statuses, and store errors are never echoed to
//! the client.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{MatchedPath, Request, State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use launchpad_license::{ActivationService, LicenseError, LicenseStore};
use serde::{Deserialize, Serialize};
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::{Span, error};

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str =
    "Origin, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ValidateRequest {
    #[serde(default)]
    pub licensekey: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ValidateResponse {
    pub valid: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub purchaseinfo: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licensekey: Option<String>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failure of a request, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// The request itself is at fault.
    BadRequest(String),
    /// The server failed; the message is generic.
    Internal(&'static str),
}

impl ApiError {
    fn from_license(err: LicenseError, failure: &'static str) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            error!(error = %err, "{failure}");
            ApiError::Internal(failure)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

async fn validate_handler<S: LicenseStore>(
    State(service): State<Arc<ActivationService<S>>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(req) = payload?;
    let license_key = req.licensekey.unwrap_or_default();
    let machine_id = req.machine_id.unwrap_or_default();

    let verdict = service
        .validate(&license_key, &machine_id)
        .await
        .map_err(|err| ApiError::from_license(err, "Failed to validate license"))?;

    Ok(Json(ValidateResponse {
        valid: verdict.is_valid(),
        message: verdict.message().to_string(),
    }))
}

async fn register_handler<S: LicenseStore>(
    State(service): State<Arc<ActivationService<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(req) = payload?;
    let email = req.email.unwrap_or_default();

    let license = service
        .register(&email, req.purchaseinfo)
        .await
        .map_err(|err| ApiError::from_license(err, "Failed to create license"))?;

    Ok(Json(RegisterResponse {
        success: true,
        licensekey: Some(license.license_key),
        message: "License created successfully".to_string(),
    }))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Answers every preflight with 204 and stamps CORS headers on all responses.
async fn cors(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

/// Build the HTTP API router around the given service.
pub fn build_router<S: LicenseStore>(service: Arc<ActivationService<S>>) -> Router {
    Router::new()
        .route("/api/v1/validate", post(validate_handler::<S>))
        .route("/api/v1/register", post(register_handler::<S>))
        .route("/health", get(health_handler))
        .with_state(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str);
                    tracing::info_span!("req", method = ?req.method(), matched_path)
                })
                .on_failure(
                    |err: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        error!(error = ?err, "request failed");
                    },
                ),
        )
        .layer(middleware::from_fn(cors))
}
