use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;

const BASIC_PREFIX: &str = "Basic ";

/// (client id, client secret) as presented by one request. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub client_id: String,
    pub client_secret: String,
}

// keep the secret out of logs
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// `client_id` / `client_secret` as they appear in a query string or request body
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CredentialParams {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl CredentialParams {
    /// Fields present in `other` win
    pub fn overlay(self, other: CredentialParams) -> Self {
        Self {
            client_id: other.client_id.or(self.client_id),
            client_secret: other.client_secret.or(self.client_secret),
        }
    }

    pub fn from_query(query: Option<&str>) -> Self {
        query
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// JSON when the content type says so, form encoding otherwise.
    /// Anything unparseable is treated as an empty body.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        let is_json = content_type.is_some_and(|ct| ct.starts_with("application/json"));
        let parsed: Option<Self> = if is_json {
            serde_json::from_slice(body).ok()
        } else {
            serde_urlencoded::from_bytes(body).ok()
        };
        parsed.unwrap_or_default()
    }
}

/// Pulls client credentials out of a request.
///
/// An `Authorization: Basic ...` header takes priority; if it's there but can't be decoded
/// the request has no credentials (we don't fall back to the params). Without a Basic
/// header, both `client_id` and `client_secret` params must be present.
pub fn extract_credentials(headers: &HeaderMap, params: &CredentialParams) -> Option<CredentialPair> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Some(encoded) = auth_header.and_then(|h| h.strip_prefix(BASIC_PREFIX)) {
        return decode_basic(encoded.trim());
    }

    match (&params.client_id, &params.client_secret) {
        (Some(client_id), Some(client_secret)) => Some(CredentialPair {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        }),
        _ => None,
    }
}

fn decode_basic(encoded: &str) -> Option<CredentialPair> {
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    // the secret may itself contain ':'
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some(CredentialPair {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}
