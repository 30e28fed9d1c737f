// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token extraction and the handler-side `Auth` extractor.
//!
//! Use the `Auth` extractor in handlers that need the caller's identity:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims was verified and authorized by the gate
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, HeaderValue},
};

use super::claims::Claims;
use super::context::claims_from;
use super::error::{ExtractError, GateRejection};

const BEARER: &str = "Bearer";

/// Pull the bearer token out of an `Authorization` header value.
///
/// The header is split once at the first whitespace run into scheme and
/// token. The scheme is compared case-insensitively; the token is trimmed
/// but keeps any inner whitespace.
pub fn bearer_token(header: Option<&HeaderValue>) -> Result<&str, ExtractError> {
    let header = header.ok_or(ExtractError::EmptyHeader)?;
    if header.as_bytes().iter().all(u8::is_ascii_whitespace) {
        return Err(ExtractError::EmptyHeader);
    }

    let value = header.to_str().map_err(|_| ExtractError::MalformedHeader)?;

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(ExtractError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case(BEARER) {
        return Err(ExtractError::WrongScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ExtractError::EmptyToken);
    }

    Ok(token)
}

/// Extractor for the verified caller.
///
/// Reads the claims the gate attached to the request. Rejects with the
/// generic 401 when the request was not authenticated, e.g. because the
/// gate is disabled or the route is on the public allow-list.
pub struct Auth(pub Arc<Claims>);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        claims_from(&parts.extensions)
            .map(Auth)
            .ok_or(GateRejection::MissingToken(ExtractError::EmptyHeader))
    }
}

impl<S> OptionalFromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(claims_from(&parts.extensions).map(Auth))
    }
}
