//! Credential hash lifecycle for internal users.
//!
//! Plaintext passwords are turned into Argon2id PHC strings before anything is
//! persisted, and hashes are blanked on every read path.
//!
//! Cost parameters are fixed: 19 MiB memory, 2 iterations, 1 lane, 16-byte
//! random salt.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier};
use serde_json::Value;

use crate::restapi::errors::ApiError;
use crate::restapi::types::Entry;

pub const MEMORY_COST_KIB: u32 = 19_456;
pub const TIME_COST: u32 = 2;
pub const PARALLELISM: u32 = 1;

pub const HASH_FIELD: &str = "hash";
pub const PASSWORD_FIELD: &str = "password";

/// Secret material supplied with a request, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretInput {
    pub password: Option<String>,
    pub hash: Option<String>,
}

impl SecretInput {
    /// Split the secret fields off an entry, leaving the remaining fields in place.
    pub fn take_from(entry: &mut Entry) -> Self {
        let take = |entry: &mut Entry, key: &str| match entry.remove(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        Self {
            password: take(entry, PASSWORD_FIELD),
            hash: take(entry, HASH_FIELD),
        }
    }
}

fn hasher() -> Result<Argon2<'static>, ApiError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| ApiError::Internal(format!("invalid argon2 parameters: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, argon2::Version::V0x13, params))
}

pub fn hash_password(plaintext: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

/// Check a plaintext against a stored PHC string. Unparseable hashes never verify.
pub fn verify_password(hash: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    match hasher() {
        Ok(argon2) => argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Decide which hash an internal user ends up with.
///
/// `existing` is the hash stored before this request. Empty values count as
/// absent, so a redacted read can be sent back as is. The plaintext must
/// already have passed the password policy.
pub fn resolve_secret(existing: Option<&str>, secret: &SecretInput) -> Result<String, ApiError> {
    let password = secret.password.as_deref().filter(|p| !p.is_empty());
    let hash = secret.hash.as_deref().filter(|h| !h.is_empty());

    match (password, hash, existing) {
        (Some(_), Some(_), _) => Err(ApiError::invalid_keys(
            "Only one of 'hash' or 'password' may be specified",
            vec![HASH_FIELD.to_string(), PASSWORD_FIELD.to_string()],
        )),
        (Some(plaintext), None, _) => hash_password(plaintext),
        (None, Some(hash), _) => Ok(hash.to_string()),
        (None, None, Some(existing)) if !existing.is_empty() => Ok(existing.to_string()),
        (None, None, _) => Err(ApiError::missing_keys(
            "Please specify either 'hash' or 'password' when creating a new internal user",
            vec![HASH_FIELD.to_string(), PASSWORD_FIELD.to_string()],
        )),
    }
}

/// Blank credential material on an entry that is about to leave the engine.
pub fn redact(entry: &mut Entry) {
    entry.remove(PASSWORD_FIELD);
    entry.insert(HASH_FIELD.to_string(), Value::String(String::new()));
}
