// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-scoped storage for the verified identity.
//!
//! The gate stores [`Claims`] in the request extensions under a private
//! wrapper type. Nothing else can insert or overwrite that slot, so handlers
//! that read it through [`claims_from`] only ever see gate-verified data.

use std::sync::Arc;

use axum::http::Extensions;

use super::claims::Claims;

#[derive(Clone)]
struct VerifiedClaims(Arc<Claims>);

/// Attach verified claims to a request.
pub(crate) fn with_claims(extensions: &mut Extensions, claims: Claims) {
    extensions.insert(VerifiedClaims(Arc::new(claims)));
}

/// Claims the gate attached to this request, if any.
pub fn claims_from(extensions: &Extensions) -> Option<Arc<Claims>> {
    extensions
        .get::<VerifiedClaims>()
        .map(|verified| Arc::clone(&verified.0))
}
