use super::errors::{ResolutionFailure, TokenError};
use crate::clients::{Client, Supplemental};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Token lifetime, counted from `iat`
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

#[async_trait]
pub trait CredentialValidator {
    async fn validate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Client, ResolutionFailure>;
}

pub trait TokenIssuer {
    fn issue_token(&self, client: &Client) -> Result<TokenResponse, TokenError>;
}

pub trait TokenValidator {
    fn validate_token(&self, token: &str) -> Result<Claims, TokenError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64, // seconds
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String, // Issuer
    pub sub: String, // Subject (client id)
    pub iat: i64,    // Issued at
    pub exp: i64,    // iat + TOKEN_LIFETIME_SECS
    // a set: ordering and duplicates from the client record don't survive issuance
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub sup: Supplemental,
}

impl Claims {
    pub fn for_client(issuer: &str, client: &Client, iat: i64) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: client.id.to_string(),
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
            scopes: client.scopes.iter().cloned().collect(),
            sup: client.supplemental.clone(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}
