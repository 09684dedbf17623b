//! Bearer session tokens.
//!
//! The auth service signs a [`SessionToken`] with its Ed25519 key and hands
//! it to the browser, which sends it back as `Authorization: Bearer <token>`.
//! The wire form is URL-safe base64 of the token's JSON.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    /// User id for `Role::User`, admin id for `Role::Admin`.
    pub subject: Uuid,
    pub role: Role,
    pub valid_until: DateTime<Utc>,
    pub signature: Vec<u8>,
}

// payload = subject || role || valid_until (rfc3339)
fn signing_payload(subject: &Uuid, role: Role, valid_until: &DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(subject.as_bytes());
    payload.extend_from_slice(role.as_str().as_bytes());
    payload.extend_from_slice(valid_until.to_rfc3339().as_bytes());
    payload
}

pub fn create_session_token(
    subject: Uuid,
    role: Role,
    valid_until: DateTime<Utc>,
    signing_key: &SigningKey,
) -> SessionToken {
    let signature = signing_key.sign(&signing_payload(&subject, role, &valid_until));

    SessionToken {
        subject,
        role,
        valid_until,
        signature: signature.to_bytes().to_vec(),
    }
}

impl SessionToken {
    pub fn verify(&self, verifying_key: &VerifyingKey) -> Result<(), TokenError> {
        if Utc::now() > self.valid_until {
            return Err(TokenError::Expired);
        }

        let signature =
            Signature::from_slice(&self.signature).map_err(|_| TokenError::BadSignature)?;

        verifying_key
            .verify(
                &signing_payload(&self.subject, self.role, &self.valid_until),
                &signature,
            )
            .map_err(|_| TokenError::BadSignature)
    }

    pub fn encode(&self) -> String {
        // Serializing plain data with derived impls cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(encoded: &str) -> Result<Self, TokenError> {
        let json = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)
    }
}

/// Parse a 64-character hex Ed25519 secret key.
pub fn signing_key_from_hex(hex_key: &str) -> Result<SigningKey, TokenError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| TokenError::InvalidKey(format!("expected 32 bytes, got {}", b.len())))?;
    Ok(SigningKey::from_bytes(&secret))
}

pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}
