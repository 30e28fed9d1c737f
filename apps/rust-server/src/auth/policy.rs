// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gate policy: what to verify, what to require, what to skip.
//!
//! Built once at startup from [`crate::config::AppConfig`] and shared
//! read-only for the life of the process.

use std::collections::BTreeSet;

/// Which token claims the trust root must check.
///
/// All checks are on unless relaxed through [`VerificationChecks::insecure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationChecks {
    expiry: bool,
    audience: bool,
    issuer: bool,
}

/// Checks to switch off. Only meant for local development against a test
/// identity provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsecureChecks {
    pub skip_expiry: bool,
    pub skip_audience: bool,
    pub skip_issuer: bool,
}

impl VerificationChecks {
    /// Signature, expiry, audience and issuer are all enforced.
    pub fn strict() -> Self {
        Self {
            expiry: true,
            audience: true,
            issuer: true,
        }
    }

    /// Relax some checks. Logs a security warning for each one disabled.
    pub fn insecure(relax: InsecureChecks) -> Self {
        if relax.skip_expiry {
            tracing::warn!("SECURITY: token expiry check is DISABLED");
        }
        if relax.skip_audience {
            tracing::warn!("SECURITY: token audience check is DISABLED");
        }
        if relax.skip_issuer {
            tracing::warn!("SECURITY: token issuer check is DISABLED");
        }

        Self {
            expiry: !relax.skip_expiry,
            audience: !relax.skip_audience,
            issuer: !relax.skip_issuer,
        }
    }

    pub fn expiry(&self) -> bool {
        self.expiry
    }

    pub fn audience(&self) -> bool {
        self.audience
    }

    pub fn issuer(&self) -> bool {
        self.issuer
    }

    pub fn is_strict(&self) -> bool {
        self.expiry && self.audience && self.issuer
    }
}

impl Default for VerificationChecks {
    fn default() -> Self {
        Self::strict()
    }
}

/// Requirements a verified identity must meet.
///
/// Roles and scopes need any one match, permissions need all of them.
/// An empty set is always satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    pub required_roles: BTreeSet<String>,
    pub required_permissions: BTreeSet<String>,
    pub required_scopes: BTreeSet<String>,
}

impl AccessPolicy {
    pub fn is_open(&self) -> bool {
        self.required_roles.is_empty()
            && self.required_permissions.is_empty()
            && self.required_scopes.is_empty()
    }
}

/// One entry of the public-path allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches the path exactly.
    Exact(String),
    /// From `prefix/*`: matches `prefix` itself and anything under `prefix/`.
    Prefix(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/*") {
            Some(prefix) => PathPattern::Prefix(prefix.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

/// Ordered allow-list of paths exempt from the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicPaths {
    patterns: Vec<PathPattern>,
}

impl PublicPaths {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .map(|p| PathPattern::parse(&p))
                .collect(),
        }
    }

    /// First pattern matching `path`, in configured order.
    pub fn first_match(&self, path: &str) -> Option<&PathPattern> {
        self.patterns.iter().find(|p| p.matches(path))
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }
}

/// Process-wide gate policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    pub enabled: bool,
    pub issuer_url: String,
    pub audience: String,
    pub checks: VerificationChecks,
    pub access: AccessPolicy,
    pub public_paths: PublicPaths,
}

impl AuthPolicy {
    /// A policy with the gate switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            issuer_url: String::new(),
            audience: String::new(),
            checks: VerificationChecks::strict(),
            access: AccessPolicy::default(),
            public_paths: PublicPaths::default(),
        }
    }
}
