use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// JWT claims issued by the host for an authenticated subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    #[serde(deserialize_with = "subject_id")]
    pub id: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    #[serde(default)]
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

/// Hosts issue numeric or string primary keys; both are carried as strings here.
fn subject_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Identity record attached to every registered connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            collection: collection.into(),
            role: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Failure of the identity backend itself, as opposed to a subject that does not exist
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Identity lookup failed: {0}")]
pub struct LookupError(pub String);
