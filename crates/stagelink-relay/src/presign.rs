//! Presigned upload tokens
//!
//! The relay stands in for an external object store: it issues time-limited
//! PUT targets of the form `/api/presigned/{token}`. A token binds the file
//! name and an expiry timestamp under a sha256 signature, so it can be
//! verified statelessly when the PUT arrives.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PresignError {
    #[error("malformed upload token")]
    Malformed,
    #[error("upload token signature mismatch")]
    BadSignature,
    #[error("upload token expired")]
    Expired,
}

/// Issues and verifies signed upload tokens
#[derive(Debug, Clone)]
pub struct Presigner {
    secret: String,
    expiry_secs: u64,
}

impl Presigner {
    pub fn new(secret: impl Into<String>, expiry_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            expiry_secs,
        }
    }

    /// Issue a token for `file_name`, valid until now + expiry
    pub fn issue(&self, file_name: &str) -> String {
        let expires_at = chrono::Utc::now().timestamp() as u64 + self.expiry_secs;
        self.issue_at(file_name, expires_at)
    }

    fn issue_at(&self, file_name: &str, expires_at: u64) -> String {
        let name = URL_SAFE_NO_PAD.encode(file_name.as_bytes());
        let sig = self.signature(file_name, expires_at);
        format!("{name}.{expires_at}.{sig}")
    }

    /// Verify a token and return the file name it was issued for
    pub fn verify(&self, token: &str) -> Result<String, PresignError> {
        self.verify_at(token, chrono::Utc::now().timestamp() as u64)
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<String, PresignError> {
        let mut parts = token.splitn(3, '.');
        let (name_b64, expiry_str, sig) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(e), Some(s)) => (n, e, s),
            _ => return Err(PresignError::Malformed),
        };

        let name_bytes = URL_SAFE_NO_PAD
            .decode(name_b64)
            .map_err(|_| PresignError::Malformed)?;
        let file_name =
            String::from_utf8(name_bytes).map_err(|_| PresignError::Malformed)?;
        let expires_at: u64 = expiry_str.parse().map_err(|_| PresignError::Malformed)?;

        if self.signature(&file_name, expires_at) != sig {
            return Err(PresignError::BadSignature);
        }
        if now > expires_at {
            return Err(PresignError::Expired);
        }

        Ok(file_name)
    }

    fn signature(&self, file_name: &str, expires_at: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_name.as_bytes());
        hasher.update(b"|");
        hasher.update(expires_at.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}
