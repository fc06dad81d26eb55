use std::collections::HashMap;

use axum::http::HeaderMap;
use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};

use crate::restapi::types::Actor;
use crate::settings::ApiToken;

/// Resolves `Authorization: Bearer` tokens to actors.
///
/// Tokens are looked up by digest so plaintext tokens never appear in the
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct TokenDirectory {
    by_digest: HashMap<String, Actor>,
}

impl TokenDirectory {
    pub fn new(tokens: &[ApiToken]) -> Self {
        let by_digest = tokens
            .iter()
            .map(|token| {
                let actor = Actor {
                    principal: token.principal.clone(),
                    is_super_admin: token.super_admin,
                    granted_privileges: token.privileges.clone(),
                };
                (token.token_sha256.clone(), actor)
            })
            .collect();
        Self { by_digest }
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Option<Actor> {
        let value = headers
            .get(axum::http::header::AUTHORIZATION)?
            .to_str()
            .ok()?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))?
            .trim();
        self.resolve_token(token)
    }

    pub fn resolve_token(&self, token: &str) -> Option<Actor> {
        if token.is_empty() {
            return None;
        }
        let actor = self.by_digest.get(&token_digest(token)).cloned();
        if actor.is_none() {
            tracing::debug!("unknown bearer token presented");
        }
        actor
    }
}

/// base64url SHA-256 of a bearer token, the form stored in `auth.tokens`.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    Base64UrlUnpadded::encode_string(&digest)
}
