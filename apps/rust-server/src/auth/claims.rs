// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the verified identity handed to handlers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims payload as issued by the OIDC provider.
///
/// Only decoded after the signature has been verified. Unknown claims are
/// ignored and every claim is optional at this layer, `null` included; the
/// verifier decides which of `exp`, `aud` and `iss` are mandatory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<Flag>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

/// Boolean claim that some providers send as `"true"` / `"false"`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(#[serde(deserialize_with = "text_flag")] bool),
}

impl Flag {
    fn value(self) -> bool {
        match self {
            Flag::Bool(value) | Flag::Text(value) => value,
        }
    }
}

fn text_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    Ok(text.trim().eq_ignore_ascii_case("true"))
}

/// The `aud` claim is either a single string or an array of strings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        }
    }
}

/// Verified identity of the caller.
///
/// Exists only once the trust root has accepted the token. Attached to the
/// request by the gate and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub subject: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub email: String,
    pub email_verified: bool,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    /// Raw space-delimited scope string.
    pub scope: String,
    pub preferred_username: String,
    pub name: String,
    pub given_name: String,
    pub family_name: String,
}

impl Claims {
    /// Individual scope tokens.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

impl From<RawClaims> for Claims {
    fn from(raw: RawClaims) -> Self {
        Self {
            subject: raw.sub.unwrap_or_default(),
            issuer: raw.iss.unwrap_or_default(),
            audience: raw.aud.map(Audience::into_vec).unwrap_or_default(),
            expiry: timestamp(raw.exp),
            issued_at: timestamp(raw.iat),
            not_before: timestamp(raw.nbf),
            email: raw.email.unwrap_or_default(),
            email_verified: raw.email_verified.is_some_and(Flag::value),
            roles: raw.roles.unwrap_or_default().into_iter().collect(),
            permissions: raw.permissions.unwrap_or_default().into_iter().collect(),
            scope: raw.scope.unwrap_or_default(),
            preferred_username: raw.preferred_username.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            given_name: raw.given_name.unwrap_or_default(),
            family_name: raw.family_name.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: serde_json::Value) -> Claims {
        let raw: RawClaims = serde_json::from_value(json).expect("claims decode");
        raw.into()
    }

    #[test]
    fn maps_full_payload() {
        let claims = decode(serde_json::json!({
            "sub": "user_123",
            "iss": "https://idp.example.com",
            "aud": "timeloc",
            "exp": 1700003600,
            "iat": 1700000000,
            "email": "ada@example.com",
            "email_verified": true,
            "roles": ["user", "admin"],
            "permissions": ["locations:read"],
            "scope": "openid  profile",
            "preferred_username": "ada",
            "name": "Ada Lovelace",
            "given_name": "Ada",
            "family_name": "Lovelace"
        }));

        assert_eq!(claims.subject, "user_123");
        assert_eq!(claims.audience, vec!["timeloc".to_string()]);
        assert_eq!(claims.expiry.map(|t| t.timestamp()), Some(1700003600));
        assert!(claims.not_before.is_none());
        assert!(claims.email_verified);
        assert!(claims.has_role("admin"));
        assert!(claims.has_permission("locations:read"));
        assert_eq!(claims.scopes().collect::<Vec<_>>(), vec!["openid", "profile"]);
        assert_eq!(claims.family_name, "Lovelace");
    }

    #[test]
    fn audience_array_is_kept() {
        let claims = decode(serde_json::json!({"sub": "u", "aud": ["a", "b"]}));
        assert_eq!(claims.audience, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_and_unknown_claims_default() {
        let claims = decode(serde_json::json!({
            "sub": "user_123",
            "org_memberships": [{"org_id": "o1"}]
        }));

        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
        assert_eq!(claims.scope, "");
        assert_eq!(claims.email, "");
        assert!(!claims.email_verified);
        assert!(claims.audience.is_empty());
    }

    #[test]
    fn null_claims_decode_as_absent() {
        let claims = decode(serde_json::json!({
            "sub": "user_123",
            "email": null,
            "name": null,
            "roles": null,
            "scope": null,
            "email_verified": null
        }));

        assert_eq!(claims.subject, "user_123");
        assert_eq!(claims.email, "");
        assert_eq!(claims.name, "");
        assert!(claims.roles.is_empty());
        assert_eq!(claims.scope, "");
        assert!(!claims.email_verified);
    }

    #[test]
    fn email_verified_accepts_string_form() {
        let verified = decode(serde_json::json!({"sub": "u", "email_verified": "true"}));
        assert!(verified.email_verified);

        let unverified = decode(serde_json::json!({"sub": "u", "email_verified": "false"}));
        assert!(!unverified.email_verified);
    }
}
