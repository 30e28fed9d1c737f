// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller identity endpoint.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, Claims};

/// Response for GET /v1/me
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    /// Token subject.
    pub subject: String,
    pub issuer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preferred_username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// Granted scopes, split from the `scope` claim.
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Claims> for MeResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            subject: claims.subject.clone(),
            issuer: claims.issuer.clone(),
            email: claims.email.clone(),
            email_verified: claims.email_verified,
            preferred_username: claims.preferred_username.clone(),
            name: claims.name.clone(),
            roles: claims.roles.iter().cloned().collect(),
            permissions: claims.permissions.iter().cloned().collect(),
            scopes: claims.scopes().map(str::to_string).collect(),
            expires_at: claims.expiry,
        }
    }
}

/// Get the current caller's verified identity.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Forbidden - access requirements not met"),
    )
)]
pub async fn get_current_user(Auth(claims): Auth) -> Json<MeResponse> {
    Json(claims.as_ref().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn me_response_from_claims() {
        let claims = Claims {
            subject: "user-123".to_string(),
            issuer: "https://idp.example.com".to_string(),
            email: "ada@example.com".to_string(),
            roles: ["admin".to_string()].into_iter().collect(),
            scope: "openid time:read".to_string(),
            ..Default::default()
        };

        let Json(response) = get_current_user(Auth(Arc::new(claims))).await;
        assert_eq!(response.subject, "user-123");
        assert_eq!(response.email, "ada@example.com");
        assert_eq!(response.roles, vec!["admin".to_string()]);
        assert_eq!(response.scopes, vec!["openid", "time:read"]);
        assert!(response.expires_at.is_none());
    }
}
