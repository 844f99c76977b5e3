mod client_credentials;
mod credentials;
mod errors;
mod guard;
mod handlers;
mod middleware;
mod token;
mod traits;

pub use client_credentials::ClientResolver;
pub use credentials::{CredentialParams, extract_credentials};
pub use errors::{ResolutionFailure, TokenError};
pub use guard::{Decision, DenialReason, authorize};
pub use handlers::{AuthAppState, metadata_handler, token_handler};
pub use middleware::{AuthMiddlewareConfig, bearer_auth_middleware};
pub use token::{JwtTokenIssuer, JwtTokenValidator};
pub use traits::{Claims, CredentialValidator, TokenIssuer, TokenResponse, TokenValidator};

use crate::clients::{Client, SharedClientStore};
use axum::http::HeaderMap;
use std::sync::Arc;

/// Issuer identity and signing key, loaded once at startup
#[derive(Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub jwt_secret: String,
}

/// Authentication, issuance and verification behind one handle
#[derive(Clone)]
pub struct AuthService {
    issuer: String,
    credential_validator: Arc<dyn CredentialValidator + Send + Sync>,
    token_issuer: Arc<dyn TokenIssuer + Send + Sync>,
    token_validator: Arc<dyn TokenValidator + Send + Sync>,
}

impl AuthService {
    pub fn new(config: AuthConfig, store: SharedClientStore) -> Self {
        let credential_validator = Arc::new(ClientResolver::new(store));

        let token_issuer = Arc::new(JwtTokenIssuer::new(
            config.issuer.clone(),
            &config.jwt_secret,
        ));

        let token_validator = Arc::new(JwtTokenValidator::new(&config.issuer, &config.jwt_secret));

        Self {
            issuer: config.issuer,
            credential_validator,
            token_issuer,
            token_validator,
        }
    }

    /// The `iss` every token from this service carries
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Extract credentials from the request and resolve them to a client.
    /// The error says why, for logging; callers must not pass it on.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        params: &CredentialParams,
    ) -> Result<Client, ResolutionFailure> {
        let pair = extract_credentials(headers, params).ok_or(ResolutionFailure::CredentialsAbsent)?;
        self.validate_credentials(&pair.client_id, &pair.client_secret)
            .await
    }

    pub async fn validate_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Client, ResolutionFailure> {
        self.credential_validator
            .validate(client_id, client_secret)
            .await
    }

    pub fn issue_token(&self, client: &Client) -> Result<TokenResponse, TokenError> {
        self.token_issuer.issue_token(client)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.token_validator.validate_token(token)
    }

    /// First half of `authorize(token, scope)`: turn a presented bearer token into
    /// verified claims. The scope half is `guard::authorize`, run by each handler.
    pub fn verify_bearer(&self, token: Option<&str>) -> Result<Claims, DenialReason> {
        let token = token.ok_or(DenialReason::TokenMissing)?;
        self.validate_token(token).map_err(|e| {
            tracing::warn!("Rejected bearer token: {}", e);
            match e {
                TokenError::Expired => DenialReason::TokenExpired,
                _ => DenialReason::TokenInvalid,
            }
        })
    }

    /// Verify a bearer token and check it carries `required_scope`
    #[cfg(test)]
    pub fn authorize(&self, token: Option<&str>, required_scope: &str) -> Decision {
        match self.verify_bearer(token) {
            Ok(claims) => authorize(&claims, required_scope),
            Err(reason) => Decision::Denied(reason),
        }
    }
}
