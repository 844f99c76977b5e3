use super::AuthService;
use super::credentials::CredentialParams;
use super::errors::ResolutionFailure;
use crate::clients::scopes;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthAppState {
    pub auth_service: Arc<AuthService>,
    pub base_url: String,
}

/// OAuth 2.0 error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Handler for POST /token
///
/// Credentials come from a Basic header, or from `client_id`/`client_secret` in the
/// body (form or JSON) or query string.
pub async fn token_handler(
    State(state): State<AuthAppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let params = CredentialParams::from_query(query.as_deref())
        .overlay(CredentialParams::from_body(content_type, &body));

    let client = match state.auth_service.authenticate(&headers, &params).await {
        Ok(client) => client,
        // the store only sees well-formed ids, so this says nothing about the credentials
        Err(ResolutionFailure::Store(e)) => {
            tracing::error!("Client store unavailable during authentication: {:#}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                Some("Could not resolve client from request"),
            );
        }
        Err(e) => {
            // Don't leak information about why resolution failed
            tracing::warn!("Client authentication failed: {} ({})", e.code(), e);
            return error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                Some("Could not resolve client from request"),
            );
        }
    };

    match state.auth_service.issue_token(&client) {
        Ok(token_response) => {
            tracing::info!("Issued token for client: {} ({})", client.id, client.name);
            (StatusCode::OK, Json(token_response)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to issue token: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                Some("Failed to issue token"),
            )
        }
    }
}

fn error_response(status: StatusCode, error: &str, description: Option<&str>) -> Response {
    let error_resp = ErrorResponse {
        error: error.to_string(),
        error_description: description.map(|s| s.to_string()),
    };
    (status, Json(error_resp)).into_response()
}

/// Auth server metadata (RFC 8414)
#[derive(Debug, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub token_endpoint: String,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

/// Tells clients how to get a token
pub async fn metadata_handler(State(state): State<AuthAppState>) -> Response {
    let base_url = &state.base_url;
    let metadata = AuthorizationServerMetadata {
        issuer: state.auth_service.issuer().to_string(),
        token_endpoint: format!("{}/token", base_url),
        grant_types_supported: vec!["client_credentials".to_string()],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
        ],
        scopes_supported: scopes::ALL.iter().map(|s| s.to_string()).collect(),
    };

    (StatusCode::OK, Json(metadata)).into_response()
}
