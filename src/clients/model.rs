use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Open set of extra claims embedded into every token issued for a client.
/// `serde_json::Value` is already a tagged union (null/bool/number/string/array/object),
/// so the token payload stays strongly typed without a bespoke value enum.
pub type Supplemental = Map<String, Value>;

pub mod scopes {
    pub const CLIENT_CREATE: &str = "client:create";
    pub const CLIENT_FETCH: &str = "client:fetch";
    pub const CLIENT_UPDATE: &str = "client:update";
    pub const CLIENT_DELETE: &str = "client:delete";

    pub const ALL: [&str; 4] = [CLIENT_CREATE, CLIENT_FETCH, CLIENT_UPDATE, CLIENT_DELETE];

    /// Scopes this service itself acts on. Anything else is opaque to us.
    pub fn is_management(scope: &str) -> bool {
        ALL.contains(&scope)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("scopes must not contain empty strings")]
    EmptyScope,
}

/// A stored trust principal, secret included. Not `Serialize`: responses go through
/// `ClientView`, stores through their own document types.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRecord {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    pub scopes: Vec<String>,
    pub supplemental: Supplemental,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientRecord {
    /// New client with a fresh id and generated secret
    pub fn generate(
        name: String,
        scopes: Vec<String>,
        supplemental: Supplemental,
    ) -> Result<Self, ValidationError> {
        let now = Utc::now();
        let record = Self {
            id: Uuid::new_v4(),
            name: validate_name(name)?,
            secret: generate_secret(),
            scopes: normalise_scopes(scopes)?,
            supplemental,
            created_at: now,
            updated_at: now,
        };
        Ok(record)
    }

    /// Client with a caller-chosen id and secret (used for the bootstrap client)
    pub fn with_credentials(
        id: Uuid,
        name: String,
        secret: String,
        scopes: Vec<String>,
    ) -> Result<Self, ValidationError> {
        if secret.is_empty() {
            return Err(ValidationError::EmptySecret);
        }
        let now = Utc::now();
        Ok(Self {
            id,
            name: validate_name(name)?,
            secret,
            scopes: normalise_scopes(scopes)?,
            supplemental: Supplemental::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, changes: ClientChanges) -> Result<(), ValidationError> {
        if let Some(name) = changes.name {
            self.name = validate_name(name)?;
        }
        if let Some(scopes) = changes.scopes {
            self.scopes = normalise_scopes(scopes)?;
        }
        if let Some(supplemental) = changes.supplemental {
            self.supplemental = supplemental;
        }
        if changes.rotate_secret {
            self.secret = generate_secret();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// The identity handed to the rest of the system after authentication
    pub fn identity(&self) -> Client {
        Client {
            id: self.id,
            name: self.name.clone(),
            scopes: self.scopes.clone(),
            supplemental: self.supplemental.clone(),
        }
    }

    pub fn view(&self) -> ClientView {
        ClientView {
            id: self.id,
            name: self.name.clone(),
            scopes: self.scopes.clone(),
            supplemental: self.supplemental.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Authenticated client identity. Deliberately has no secret field.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub scopes: Vec<String>,
    pub supplemental: Supplemental,
}

/// Public representation of a client (reads and updates)
#[derive(Debug, Clone, Serialize)]
pub struct ClientView {
    pub id: Uuid,
    pub name: String,
    pub scopes: Vec<String>,
    pub supplemental: Supplemental,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returned exactly once, when a secret is generated
#[derive(Debug, Clone, Serialize)]
pub struct ClientWithSecret {
    #[serde(flatten)]
    pub client: ClientView,
    pub secret: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub supplemental: Option<Supplemental>,
    #[serde(default)]
    pub rotate_secret: bool,
}

fn validate_name(name: String) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// drops duplicates, keeps the first occurrence's position
fn normalise_scopes(scopes: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let mut out: Vec<String> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if scope.is_empty() {
            return Err(ValidationError::EmptyScope);
        }
        if !out.contains(&scope) {
            out.push(scope);
        }
    }
    Ok(out)
}

/// 32 random bytes, hex encoded (64 chars)
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_creates_64_char_hex_secret() {
        let record = ClientRecord::generate("svc".into(), vec![], Supplemental::new()).unwrap();
        assert_eq!(record.secret.len(), 64);
        assert!(record.secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(record.id.get_version_num(), 4);
    }

    #[test]
    fn test_generate_rejects_blank_name() {
        let err = ClientRecord::generate("   ".into(), vec![], Supplemental::new()).unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
    }

    #[test]
    fn test_scopes_deduplicated_in_order() {
        let scopes = normalise_scopes(vec![
            "scope:two".into(),
            "scope:one".into(),
            "scope:two".into(),
        ])
        .unwrap();
        assert_eq!(scopes, vec!["scope:two", "scope:one"]);
    }

    #[test]
    fn test_management_scopes() {
        assert!(scopes::is_management("client:create"));
        assert!(!scopes::is_management("client:*"));
        assert!(!scopes::is_management("scope:one"));
    }

    #[test]
    fn test_empty_scope_rejected() {
        assert_eq!(
            normalise_scopes(vec!["".into()]),
            Err(ValidationError::EmptyScope)
        );
    }

    #[test]
    fn test_with_credentials_rejects_empty_secret() {
        let err = ClientRecord::with_credentials(Uuid::new_v4(), "boot".into(), String::new(), vec![])
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptySecret);
    }

    #[test]
    fn test_apply_rotates_secret() {
        let mut record = ClientRecord::generate("svc".into(), vec![], Supplemental::new()).unwrap();
        let old = record.secret.clone();
        record
            .apply(ClientChanges {
                rotate_secret: true,
                ..Default::default()
            })
            .unwrap();
        assert_ne!(record.secret, old);
        assert_eq!(record.secret.len(), 64);
    }

    #[test]
    fn test_view_and_identity_never_expose_secret() {
        let mut sup = Supplemental::new();
        sup.insert("tier".into(), json!("gold"));
        let record =
            ClientRecord::generate("svc".into(), vec!["client:fetch".into()], sup).unwrap();

        let body = serde_json::to_value(record.view()).unwrap();
        assert!(body.get("secret").is_none());
        assert_eq!(body["supplemental"]["tier"], "gold");

        let identity = record.identity();
        assert_eq!(identity.id, record.id);
        assert_eq!(identity.scopes, vec!["client:fetch"]);
    }
}
