use super::traits::Claims;

/// Why a protected action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    InsufficientPrivileges,
}

impl DenialReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::TokenMissing => "TokenMissing",
            Self::TokenInvalid => "TokenInvalid",
            Self::TokenExpired => "TokenExpired",
            Self::InsufficientPrivileges => "InsufficientPrivileges",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(DenialReason),
}

impl Decision {
    pub fn into_result(self) -> Result<(), DenialReason> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(reason) => Err(reason),
        }
    }
}

/// Exact, case-sensitive scope membership. No wildcards, no hierarchy.
pub fn authorize(claims: &Claims, required_scope: &str) -> Decision {
    if claims.has_scope(required_scope) {
        Decision::Allowed
    } else {
        tracing::debug!(
            "Client {} lacks scope {} (has {:?})",
            claims.sub,
            required_scope,
            claims.scopes
        );
        Decision::Denied(DenialReason::InsufficientPrivileges)
    }
}
