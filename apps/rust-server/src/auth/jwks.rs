// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behavior
//!
//! - Keys are loaded once when the verifier is built; startup fails if that
//!   first fetch fails
//! - Cached keys are served until the TTL runs out. After that the expired
//!   set keeps serving while a background task refetches
//! - A token carrying an unknown `kid` triggers an early refetch
//! - Refetches of either kind start at most once per
//!   [`MIN_REFRESH_INTERVAL`], whether or not the last one succeeded
//! - When a refetch fails the stale set keeps serving

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};

use super::error::VerifyError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum spacing between refetch attempts.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Timeout for one JWKS request; kept well under the gate's verify timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// JWKS cache entry.
struct CacheEntry {
    jwks: Arc<JwkSet>,
    fetched_at: Instant,
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    jwks_url: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Start of the most recent refetch attempt.
    last_attempt: Arc<Mutex<Option<Instant>>>,
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a manager for the given JWKS endpoint. Nothing is fetched yet.
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            last_attempt: Arc::new(Mutex::new(None)),
            client,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Current key set. Never waits on the network once keys are cached.
    async fn get_jwks(&self) -> Result<Arc<JwkSet>, VerifyError> {
        let stale = {
            let cache = self.cache.read().await;
            match &*cache {
                Some(entry) if entry.fetched_at.elapsed() < self.cache_ttl => {
                    return Ok(Arc::clone(&entry.jwks));
                }
                Some(entry) => Some(Arc::clone(&entry.jwks)),
                None => None,
            }
        };

        let Some(stale) = stale else {
            return self.refresh().await;
        };

        if self.begin_attempt().await {
            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(e) = manager.fetch_and_store().await {
                    tracing::warn!(error = %e, "JWKS refetch failed, serving stale keys");
                }
            });
        }
        Ok(stale)
    }

    /// Claim the next refetch slot, unless an attempt started recently.
    async fn begin_attempt(&self) -> bool {
        let mut last = self.last_attempt.lock().await;
        match *last {
            Some(at) if at.elapsed() < MIN_REFRESH_INTERVAL => false,
            _ => {
                *last = Some(Instant::now());
                true
            }
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, VerifyError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::KeyFetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))
    }

    async fn fetch_and_store(&self) -> Result<Arc<JwkSet>, VerifyError> {
        let jwks = Arc::new(self.fetch_jwks().await?);
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: Arc::clone(&jwks),
            fetched_at: Instant::now(),
        });
        tracing::debug!(keys = jwks.keys.len(), url = %self.jwks_url, "JWKS refreshed");
        Ok(jwks)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<Arc<JwkSet>, VerifyError> {
        *self.last_attempt.lock().await = Some(Instant::now());
        self.fetch_and_store().await
    }

    /// Refetch after a key-ID miss, unless an attempt started recently.
    async fn refresh_after_miss(&self, cached: Arc<JwkSet>) -> Arc<JwkSet> {
        if !self.begin_attempt().await {
            return cached;
        }
        match self.fetch_and_store().await {
            Ok(jwks) => jwks,
            Err(e) => {
                tracing::warn!(error = %e, "JWKS refetch after unknown key ID failed");
                cached
            }
        }
    }

    /// Decoding key for a token header.
    ///
    /// Looks the key up by `kid`, or takes the first usable key when the
    /// token carries none. The header algorithm must agree with the key.
    pub async fn decoding_key(
        &self,
        kid: Option<&str>,
        header_alg: Algorithm,
    ) -> Result<(DecodingKey, Algorithm), VerifyError> {
        let jwks = self.get_jwks().await?;

        let Some(kid) = kid else {
            return jwks
                .keys
                .iter()
                .find_map(|jwk| jwk_to_decoding_key(jwk, header_alg).ok())
                .ok_or(VerifyError::UnknownKey);
        };

        let jwks = match find_key(&jwks, kid) {
            Some(_) => jwks,
            None => self.refresh_after_miss(jwks).await,
        };

        let jwk = find_key(&jwks, kid).ok_or(VerifyError::UnknownKey)?;
        jwk_to_decoding_key(jwk, header_alg)
    }

    /// Number of cached keys, or `None` before the first successful fetch.
    pub async fn cached_key_count(&self) -> Option<usize> {
        let cache = self.cache.read().await;
        cache.as_ref().map(|entry| entry.jwks.keys.len())
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Algorithm family a key type can verify.
fn key_supports(params: &AlgorithmParameters, alg: Algorithm) -> bool {
    use Algorithm::*;

    match params {
        AlgorithmParameters::RSA(_) => {
            matches!(alg, RS256 | RS384 | RS512 | PS256 | PS384 | PS512)
        }
        AlgorithmParameters::EllipticCurve(_) => matches!(alg, ES256 | ES384),
        AlgorithmParameters::OctetKey(_) => matches!(alg, HS256 | HS384 | HS512),
        AlgorithmParameters::OctetKeyPair(_) => matches!(alg, EdDSA),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

fn declared_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Convert a JWK to a DecodingKey for the token's algorithm.
fn jwk_to_decoding_key(
    jwk: &Jwk,
    header_alg: Algorithm,
) -> Result<(DecodingKey, Algorithm), VerifyError> {
    if let Some(declared) = jwk.common.key_algorithm {
        if declared_algorithm(declared) != Some(header_alg) {
            return Err(VerifyError::InvalidSignature);
        }
    }
    if !key_supports(&jwk.algorithm, header_alg) {
        return Err(VerifyError::InvalidSignature);
    }

    let key = DecodingKey::from_jwk(jwk).map_err(|_| VerifyError::UnknownKey)?;
    Ok((key, header_alg))
}
