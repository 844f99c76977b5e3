use super::guard::DenialReason;
use super::AuthService;
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthMiddlewareConfig {
    pub auth_service: Arc<AuthService>,
    pub base_url: String,
}

/// Bearer token authentication for protected routes.
///
/// No bearer token ends in `TokenMissing`, a token that fails to decode in
/// `TokenInvalid`/`TokenExpired`. A verified token's claims are put in the request
/// extensions for the handler's scope check.
pub async fn bearer_auth_middleware(
    State(config): State<AuthMiddlewareConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    match config.auth_service.verify_bearer(token.as_deref()) {
        Ok(claims) => {
            tracing::debug!("Valid token for client: {}", claims.sub);
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(reason) => {
            tracing::warn!(
                "{} for {} {}",
                reason.code(),
                req.method(),
                req.uri().path()
            );
            unauthorized_response(&config.base_url, reason)
        }
    }
}

/// 401 with a WWW-Authenticate challenge (RFC 6750)
fn unauthorized_response(base_url: &str, reason: DenialReason) -> Response {
    let challenge = match reason {
        DenialReason::TokenMissing => format!("Bearer realm=\"{}\"", base_url),
        _ => format!("Bearer realm=\"{}\", error=\"invalid_token\"", base_url),
    };

    let mut response = ApiError::Denied(reason).into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
