// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Errors are layered the same way the gate processes a request:
//!
//! - [`ExtractError`]: the `Authorization` header is unusable (401)
//! - [`VerifyError`]: the token failed cryptographic or claim checks (401)
//! - [`AuthzError`]: the verified identity lacks a required grant (403)
//!
//! The distinct variants exist for logs and metrics only. On the wire every
//! layer collapses to one generic message per status (see [`GateRejection`]).

use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

/// Wire message for a missing or unparseable `Authorization` header.
pub const MISSING_TOKEN_MESSAGE: &str = "missing or invalid authorization header";
/// Wire message for any verification failure.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid or expired token";
/// Wire message for any authorization failure.
pub const FORBIDDEN_MESSAGE: &str = "insufficient permissions";

/// Failure to pull a bearer token out of the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("authorization header is missing or empty")]
    EmptyHeader,
    #[error("authorization header is not of the form '<scheme> <token>'")]
    MalformedHeader,
    #[error("authorization scheme is not Bearer")]
    WrongScheme,
    #[error("bearer token is empty")]
    EmptyToken,
}

impl ExtractError {
    /// Stable label used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractError::EmptyHeader => "empty_header",
            ExtractError::MalformedHeader => "malformed_header",
            ExtractError::WrongScheme => "wrong_scheme",
            ExtractError::EmptyToken => "empty_token",
        }
    }
}

/// Failure to verify a bearer token against the trust root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("token is malformed")]
    Malformed,
    #[error("no signing key matches the token")]
    UnknownKey,
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("token audience does not match")]
    AudienceMismatch,
    #[error("token issuer does not match")]
    IssuerMismatch,
    #[error("token verification timed out")]
    Timeout,
}

impl VerifyError {
    /// Stable label used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            VerifyError::Malformed => "malformed",
            VerifyError::UnknownKey => "unknown_key",
            VerifyError::KeyFetch(_) => "key_fetch",
            VerifyError::InvalidSignature => "invalid_signature",
            VerifyError::Expired => "expired",
            VerifyError::NotYetValid => "not_yet_valid",
            VerifyError::AudienceMismatch => "audience_mismatch",
            VerifyError::IssuerMismatch => "issuer_mismatch",
            VerifyError::Timeout => "timeout",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                VerifyError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
            ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
            ErrorKind::InvalidIssuer => VerifyError::IssuerMismatch,
            ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
                "exp" => VerifyError::Expired,
                "aud" => VerifyError::AudienceMismatch,
                "iss" => VerifyError::IssuerMismatch,
                _ => VerifyError::Malformed,
            },
            _ => VerifyError::Malformed,
        }
    }
}

/// The verified identity does not satisfy the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("missing required role")]
    MissingRole,
    #[error("missing required permission")]
    MissingPermission,
    #[error("missing required scope")]
    MissingScope,
}

impl AuthzError {
    /// Stable label used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthzError::MissingRole => "missing_role",
            AuthzError::MissingPermission => "missing_permission",
            AuthzError::MissingScope => "missing_scope",
        }
    }
}

/// Failure to build the gate at startup. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum GateBuildError {
    #[error("invalid issuer URL '{url}': {reason}")]
    InvalidIssuer { url: String, reason: String },
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
    #[error("issuer mismatch: configured '{configured}', provider reports '{discovered}'")]
    IssuerMismatch {
        configured: String,
        discovered: String,
    },
    #[error("failed to load signing keys: {0}")]
    Keys(String),
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// A request the gate refuses to forward.
///
/// Carries the underlying cause so it can be logged, but the response body
/// only ever contains the generic message for its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken(ExtractError),
    InvalidToken(VerifyError),
    Forbidden(AuthzError),
}

impl GateRejection {
    /// Label of the specific cause, for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GateRejection::MissingToken(e) => e.reason(),
            GateRejection::InvalidToken(e) => e.reason(),
            GateRejection::Forbidden(e) => e.reason(),
        }
    }

    fn into_api_error(self) -> ApiError {
        match self {
            GateRejection::MissingToken(_) => ApiError::unauthorized(MISSING_TOKEN_MESSAGE),
            GateRejection::InvalidToken(_) => ApiError::unauthorized(INVALID_TOKEN_MESSAGE),
            GateRejection::Forbidden(_) => ApiError::forbidden(FORBIDDEN_MESSAGE),
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        self.into_api_error().into_response()
    }
}
