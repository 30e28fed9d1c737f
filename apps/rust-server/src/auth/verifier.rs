// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification against an OIDC provider.
//!
//! ## Flow
//!
//! 1. At startup, fetch `{issuer}/.well-known/openid-configuration`
//! 2. Check the advertised issuer and load the JWKS from `jwks_uri`
//! 3. Per request: resolve the signing key from the token header, then
//!    verify signature, `exp`/`nbf`, audience and issuer
//!
//! Any failure during 1–2 is fatal; the process must not serve requests
//! with a half-built verifier.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use url::Url;

use super::claims::{Claims, RawClaims};
use super::error::{GateBuildError, VerifyError};
use super::jwks::JwksManager;
use super::policy::VerificationChecks;

/// Timeout for the discovery request. JWKS fetches use their own shorter one.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Verifies bearer tokens and decodes their claims.
///
/// Implementations must be safe to call from many requests at once.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, VerifyError>;

    /// Whether signing keys are loaded. Used by the health endpoint.
    async fn ready(&self) -> bool {
        true
    }
}

/// Subset of the OIDC discovery document we rely on.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
}

/// Verifier backed by an OIDC provider's published signing keys.
pub struct OidcVerifier {
    issuer: String,
    audience: String,
    checks: VerificationChecks,
    jwks: JwksManager,
}

impl OidcVerifier {
    /// Run provider discovery and load the signing keys.
    pub async fn discover(
        issuer_url: &str,
        audience: &str,
        checks: VerificationChecks,
    ) -> Result<Self, GateBuildError> {
        let issuer = Url::parse(issuer_url).map_err(|e| GateBuildError::InvalidIssuer {
            url: issuer_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(issuer.scheme(), "https" | "http") {
            return Err(GateBuildError::InvalidIssuer {
                url: issuer_url.to_string(),
                reason: format!("unsupported scheme '{}'", issuer.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GateBuildError::HttpClient(e.to_string()))?;

        let discovery_url = format!("{}{DISCOVERY_PATH}", issuer_url.trim_end_matches('/'));
        let metadata: ProviderMetadata = client
            .get(&discovery_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| GateBuildError::Discovery(e.to_string()))?
            .json()
            .await
            .map_err(|e| GateBuildError::Discovery(e.to_string()))?;

        if checks.issuer()
            && metadata.issuer.trim_end_matches('/') != issuer_url.trim_end_matches('/')
        {
            return Err(GateBuildError::IssuerMismatch {
                configured: issuer_url.to_string(),
                discovered: metadata.issuer,
            });
        }

        let jwks = JwksManager::new(metadata.jwks_uri, client);
        let keys = jwks
            .refresh()
            .await
            .map_err(|e| GateBuildError::Keys(e.to_string()))?;

        tracing::info!(
            issuer = %metadata.issuer,
            jwks_uri = %jwks.jwks_url(),
            keys = keys.keys.len(),
            "OIDC provider initialized"
        );

        Ok(Self {
            issuer: metadata.issuer,
            audience: audience.to_string(),
            checks,
            jwks,
        })
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = self.checks.expiry();
        validation.validate_nbf = self.checks.expiry();

        let mut required = Vec::new();
        if self.checks.expiry() {
            required.push("exp");
        }

        if self.checks.audience() {
            validation.set_audience(&[&self.audience]);
            required.push("aud");
        } else {
            validation.validate_aud = false;
        }

        if self.checks.issuer() {
            validation.set_issuer(&[&self.issuer]);
            required.push("iss");
        }

        validation.set_required_spec_claims(&required[..]);
        validation
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header = decode_header(token).map_err(|_| VerifyError::Malformed)?;

        let (decoding_key, algorithm) = self
            .jwks
            .decoding_key(header.kid.as_deref(), header.alg)
            .await?;

        let token_data = decode::<RawClaims>(token, &decoding_key, &self.validation(algorithm))?;
        Ok(token_data.claims.into())
    }

    async fn ready(&self) -> bool {
        self.jwks.cached_key_count().await.is_some()
    }
}
