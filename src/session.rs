//! Identity recovered from the staff bearer token.
//!
//! The token's payload segment is decoded without signature verification.
//! Claims are only used to scope requests and label the UI; the backend
//! verifies the token on every call, so nothing here is an authorization
//! decision.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("token payload is not base64url: {0}")]
    Encoding(String),
    #[error("token payload is not a JSON claim set: {0}")]
    Claims(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default, rename = "id")]
    pub teacher_id: Option<String>,
    #[serde(default, rename = "InstitutionId", alias = "institutionId")]
    pub institution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    pub fn is_empty(&self) -> bool {
        self.teacher_id.is_none() && self.institution_id.is_none()
    }
}

pub fn decode_claims(token: &str) -> Result<Claims, SessionError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::Malformed);
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SessionError::Encoding(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| SessionError::Claims(e.to_string()))
}

/// Explicit session handed to every component that talks to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub claims: Claims,
    pub staff: Option<serde_json::Value>,
}

/// Ids every scoped request needs; only present when the token carried both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub teacher_id: String,
    pub institution_id: String,
}

impl Session {
    /// A token that fails to decode still yields a session, with an empty claim set.
    pub fn from_token(token: impl Into<String>, staff: Option<serde_json::Value>) -> Self {
        let token = token.into();
        let claims = match decode_claims(&token) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("discarding undecodable staff token: {e}");
                Claims::default()
            }
        };
        Self {
            token,
            claims,
            staff,
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        let teacher_id = self.claims.teacher_id.clone().filter(|s| !s.is_empty())?;
        let institution_id = self
            .claims
            .institution_id
            .clone()
            .filter(|s| !s.is_empty())?;
        Some(Identity {
            teacher_id,
            institution_id,
        })
    }
}

#[cfg(test)]
pub(crate) fn fake_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
