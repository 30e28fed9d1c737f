// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! OIDC bearer-token gate for the timeloc API.
//!
//! ## Auth Flow
//!
//! 1. Clients obtain a token from the configured OIDC provider
//! 2. Clients send `Authorization: Bearer <JWT>`
//! 3. The gate:
//!    - Skips public paths (`AUTH_PUBLIC_PATHS`)
//!    - Verifies signature, expiry, audience and issuer against the
//!      provider's JWKS
//!    - Checks required roles (any), permissions (all) and scopes (any)
//!    - Attaches the verified [`Claims`] to the request for handlers
//!
//! ## Security
//!
//! - Provider discovery and the first key fetch happen at startup; failure
//!   aborts the process
//! - Clients only ever see three generic error bodies; the precise reason
//!   goes to logs
//! - Raw tokens are never logged

pub mod authorizer;
pub mod claims;
pub mod context;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod policy;
pub mod verifier;

pub use authorizer::authorize;
pub use claims::Claims;
pub use context::claims_from;
pub use error::{AuthzError, ExtractError, GateBuildError, GateRejection, VerifyError};
pub use extractor::{bearer_token, Auth};
pub use jwks::JwksManager;
pub use middleware::{auth_gate, AuthGate, AuthMetrics, GateDecision, Outcome, UNMATCHED_ROUTE};
pub use policy::{AccessPolicy, AuthPolicy, InsecureChecks, PathPattern, PublicPaths, VerificationChecks};
pub use verifier::{OidcVerifier, TokenVerifier};
