//! Player identity from the session token
//!
//! The server hands out JWT-shaped session tokens whose payload carries the
//! player's username. The client only needs that claim; signature
//! verification stays with the server.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is not a three-part JWT")]
    Shape,
    #[error("token payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token payload has no username claim")]
    MissingUsername,
}

/// Extracts the username claim from a session token.
pub fn player_id_from_token(token: &str) -> Result<String, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Shape);
    };

    let decoded = URL_SAFE_NO_PAD.decode(payload)?;
    let claims: Value = serde_json::from_slice(&decoded)?;

    claims
        .get("username")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AuthError::MissingUsername)
}
