use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::SESSION_LIFETIME_SECS;

/// Portal role; also the leading path segment of the role's section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Guru,
    Murid,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Guru, Role::Murid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Guru => "guru",
            Role::Murid => "murid",
        }
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Guru => "/guru/dashboard",
            Role::Murid => "/murid/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "guru" => Ok(Role::Guru),
            "murid" => Ok(Role::Murid),
            other => Err(SessionError::UnknownRole(other.to_string())),
        }
    }
}

/// Home for a role; `/` when the role is not one the portal knows.
pub fn dashboard_url(role: Option<Role>) -> &'static str {
    role.map(|r| r.dashboard_path()).unwrap_or("/")
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session secret not configured")]
    MissingSecret,

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Session token encoding failed: {0}")]
    Encoding(String),

    #[error("Session token rejected: {0}")]
    Decoding(String),
}

/// The signed-in user as carried inside the session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub full_name: String,
    /// Kept as the raw string so unknown roles still decode
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl SessionUser {
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

/// JWT claims of the portal session cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user: Option<SessionUser>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn new(user: SessionUser) -> Self {
        Self::issued_at(user, Utc::now().timestamp())
    }

    pub fn issued_at(user: SessionUser, iat: i64) -> Self {
        Self {
            user: Some(user),
            iat: Some(iat),
            exp: Some(iat + SESSION_LIFETIME_SECS),
        }
    }
}

/// Decoded session: who, and when the session was issued
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken {
    pub issued_at: Option<i64>,
    pub user: SessionUser,
}

impl SessionToken {
    pub fn role(&self) -> Option<Role> {
        self.user.role()
    }

    /// `now >= issued_at + 12h`; a token without `iat` is always expired.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.issued_at {
            Some(iat) => now >= iat.saturating_add(SESSION_LIFETIME_SECS),
            None => true,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.user.access_token.as_deref()
    }
}

/// Signing and verification keys for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
}

impl SessionKeys {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn from_config() -> Self {
        Self::new(crate::config::config().security.auth_secret.clone())
    }

    pub fn is_configured(&self) -> bool {
        !self.secret.is_empty()
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, SessionError> {
        if !self.is_configured() {
            return Err(SessionError::MissingSecret);
        }

        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), claims, &key)
            .map_err(|e| SessionError::Encoding(e.to_string()))
    }

    /// Verify the signature and return the session, if the token carries a user.
    ///
    /// Expiry is not validated here; it is computed from `iat`.
    pub fn decode(&self, token: &str) -> Result<Option<SessionToken>, SessionError> {
        if !self.is_configured() {
            return Err(SessionError::MissingSecret);
        }

        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| SessionError::Decoding(e.to_string()))?;

        Ok(data.claims.user.map(|user| SessionToken {
            issued_at: data.claims.iat,
            user,
        }))
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("configured", &self.is_configured())
            .finish()
    }
}
