// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role, permission and scope checks against the access policy.
//!
//! ## Evaluation Order
//!
//! 1. Roles: the caller must hold any one of the required roles
//! 2. Permissions: the caller must hold every required permission
//! 3. Scopes: any one of the required scopes must appear in `scope`
//!
//! The first failing check decides the error. Literals are opaque,
//! case-sensitive tokens compared by set membership.

use super::claims::Claims;
use super::error::AuthzError;
use super::policy::AccessPolicy;

/// Check a verified identity against the access policy.
pub fn authorize(claims: &Claims, policy: &AccessPolicy) -> Result<(), AuthzError> {
    if policy.is_open() {
        return Ok(());
    }

    if !policy.required_roles.is_empty()
        && !policy.required_roles.iter().any(|role| claims.has_role(role))
    {
        return Err(AuthzError::MissingRole);
    }

    if !policy
        .required_permissions
        .iter()
        .all(|permission| claims.has_permission(permission))
    {
        return Err(AuthzError::MissingPermission);
    }

    if !policy.required_scopes.is_empty()
        && !claims
            .scopes()
            .any(|scope| policy.required_scopes.contains(scope))
    {
        return Err(AuthzError::MissingScope);
    }

    Ok(())
}
