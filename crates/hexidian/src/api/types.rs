//! Request and response types for the registration API.

use crate::error::ApiError;
use serde::Serialize;
use serde_json::Value;

/// Body of a registration POST: `{"callerid": "...", "token": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub callerid: String,
    pub token: String,
}

impl RegistrationRequest {
    /// Parse a raw body. Numeric fields are accepted, the dialplan does not quote digits.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::NotJson)?;
        Ok(Self {
            callerid: field(&value, "callerid")?,
            token: field(&value, "token")?,
        })
    }
}

fn field(value: &Value, name: &'static str) -> Result<String, ApiError> {
    match value.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ApiError::MissingField(name)),
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
