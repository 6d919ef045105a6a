//! Bearer credential decoding.
//!
//! The backend issues JWT-shaped tokens (`header.payload.signature`). The client
//! only reads the payload segment to learn who is signed in; signature and
//! expiry are enforced by the backend on every protected request.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// base64url with optional padding, matching what browser-side decoders accept.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid token: missing payload segment")]
    MissingPayload,

    #[error("Invalid token: payload is not base64url ({0})")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid token: claims could not be parsed ({0})")]
    Claims(#[from] serde_json::Error),

    #[error("Invalid token: claim `{0}` is empty")]
    EmptyClaim(&'static str),
}

/// Claims the client relies on. Extra claims (`iat`, `exp`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Identity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Decode the identity carried in a credential without verifying it.
pub fn decode_identity(token: &str) -> Result<Identity, DecodeError> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or(DecodeError::MissingPayload)?;

    let bytes = PAYLOAD_ENGINE.decode(payload)?;
    let identity: Identity = serde_json::from_slice(&bytes)?;

    if identity.id.trim().is_empty() {
        return Err(DecodeError::EmptyClaim("id"));
    }
    if identity.email.trim().is_empty() {
        return Err(DecodeError::EmptyClaim("email"));
    }

    Ok(identity)
}

/// Build an unsigned token around the given claims JSON.
#[cfg(test)]
pub(crate) fn fake_token(claims: serde_json::Value) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}
