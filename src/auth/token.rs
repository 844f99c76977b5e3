use super::errors::TokenError;
use super::traits::{Claims, TOKEN_LIFETIME_SECS, TokenIssuer, TokenResponse, TokenValidator};
use crate::clients::Client;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

pub struct JwtTokenIssuer {
    issuer: String,
    encoding_key: EncodingKey,
}

impl JwtTokenIssuer {
    pub fn new(issuer: String, secret: &str) -> Self {
        Self {
            issuer,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign an already-built claims set
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn issue_token_at(&self, client: &Client, iat: i64) -> Result<TokenResponse, TokenError> {
        let claims = Claims::for_client(&self.issuer, client, iat);
        let token = self.encode_claims(&claims)?;

        Ok(TokenResponse {
            access_token: token,
            expires_in: TOKEN_LIFETIME_SECS,
            token_type: "bearer".to_string(),
        })
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue_token(&self, client: &Client) -> Result<TokenResponse, TokenError> {
        self.issue_token_at(client, Utc::now().timestamp())
    }
}

pub struct JwtTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenValidator {
    pub fn new(issuer: &str, secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // no clock skew allowance
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(classify)?;
        let claims = token_data.claims;

        // exp is checked by jsonwebtoken against the wall clock; the lifetime is ours to
        // enforce regardless of what exp says
        if now > claims.iat + TOKEN_LIFETIME_SECS || now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_token_at(token, Utc::now().timestamp())
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        _ => TokenError::Malformed(err.to_string()),
    }
}
