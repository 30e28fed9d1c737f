// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate for Axum.
//!
//! Every request passes through [`auth_gate`]. Per request the gate either
//! forwards it (gate disabled, public path, or caller verified and
//! authorized) or answers it with a 401/403 itself:
//!
//! ```text
//! disabled / public path           -> forward             (bypassed)
//! no usable bearer token           -> 401                 (missing_token)
//! token fails verification         -> 401                 (invalid_token)
//! identity fails the access policy -> 403                 (forbidden)
//! otherwise                        -> attach claims, forward (success)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/v1/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(gate.clone(), auth_gate));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::authorizer::authorize;
use super::claims::Claims;
use super::context::with_claims;
use super::error::{GateBuildError, GateRejection, VerifyError};
use super::extractor::bearer_token;
use super::policy::AuthPolicy;
use super::verifier::{OidcVerifier, TokenVerifier};

/// Metrics label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Default upper bound on a single token verification.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Result class of one gated request, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Bypassed,
    MissingToken,
    InvalidToken,
    Forbidden,
    Success,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Bypassed => "bypassed",
            Outcome::MissingToken => "missing_token",
            Outcome::InvalidToken => "invalid_token",
            Outcome::Forbidden => "forbidden",
            Outcome::Success => "success",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for gate telemetry.
pub trait AuthMetrics: Send + Sync {
    /// One authorization attempt finished. Not called for bypassed requests.
    ///
    /// `route` is a route template, never a raw request path.
    fn record_attempt(&self, route: &str, outcome: Outcome);
    /// Time spent verifying a token that was accepted.
    fn observe_verification(&self, route: &str, elapsed: Duration);
    /// A token passed verification and authorization.
    fn record_token_verified(&self, status: &str);
}

/// What the gate decided for one request.
#[derive(Debug)]
pub enum GateDecision {
    Bypass,
    Allow(Claims),
    Reject(GateRejection),
}

impl GateDecision {
    pub fn outcome(&self) -> Outcome {
        match self {
            GateDecision::Bypass => Outcome::Bypassed,
            GateDecision::Allow(_) => Outcome::Success,
            GateDecision::Reject(GateRejection::MissingToken(_)) => Outcome::MissingToken,
            GateDecision::Reject(GateRejection::InvalidToken(_)) => Outcome::InvalidToken,
            GateDecision::Reject(GateRejection::Forbidden(_)) => Outcome::Forbidden,
        }
    }
}

/// Request authentication and authorization gate.
///
/// Holds no per-request state; share it as `Arc<AuthGate>`.
pub struct AuthGate {
    policy: AuthPolicy,
    verifier: Option<Arc<dyn TokenVerifier>>,
    metrics: Arc<dyn AuthMetrics>,
    verify_timeout: Duration,
}

impl AuthGate {
    /// Build the gate for a policy, running OIDC discovery when enabled.
    pub async fn from_policy(
        policy: AuthPolicy,
        metrics: Arc<dyn AuthMetrics>,
    ) -> Result<Self, GateBuildError> {
        if !policy.enabled {
            tracing::warn!("Authentication is DISABLED; all requests are forwarded unchecked");
            return Ok(Self {
                policy,
                verifier: None,
                metrics,
                verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            });
        }

        let verifier =
            OidcVerifier::discover(&policy.issuer_url, &policy.audience, policy.checks).await?;
        Ok(Self::new(policy, Arc::new(verifier), metrics))
    }

    /// Gate using an already-built verifier.
    pub fn new(
        policy: AuthPolicy,
        verifier: Arc<dyn TokenVerifier>,
        metrics: Arc<dyn AuthMetrics>,
    ) -> Self {
        Self {
            policy,
            verifier: Some(verifier),
            metrics,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    /// Pass-through gate.
    pub fn disabled(metrics: Arc<dyn AuthMetrics>) -> Self {
        Self {
            policy: AuthPolicy::disabled(),
            verifier: None,
            metrics,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    fn active_verifier(&self) -> Option<&Arc<dyn TokenVerifier>> {
        self.verifier.as_ref().filter(|_| self.policy.enabled)
    }

    /// Whether the verifier has signing keys; `None` when the gate is off.
    pub async fn ready(&self) -> Option<bool> {
        match self.active_verifier() {
            Some(verifier) => Some(verifier.ready().await),
            None => None,
        }
    }

    /// Run the gate for one request.
    ///
    /// `path` is the request path, matched against the public paths and
    /// logged. `route` is the bounded metrics label: the matched route
    /// template, or [`UNMATCHED_ROUTE`].
    pub async fn check(
        &self,
        path: &str,
        route: &str,
        authorization: Option<&HeaderValue>,
        remote: Option<SocketAddr>,
    ) -> GateDecision {
        let Some(verifier) = self.active_verifier() else {
            return GateDecision::Bypass;
        };

        if let Some(pattern) = self.policy.public_paths.first_match(path) {
            tracing::trace!(path, ?pattern, "public path, skipping authentication");
            return GateDecision::Bypass;
        }

        let decision = self
            .authenticate(verifier.as_ref(), path, route, authorization, remote)
            .await;
        self.metrics.record_attempt(route, decision.outcome());
        decision
    }

    async fn authenticate(
        &self,
        verifier: &dyn TokenVerifier,
        path: &str,
        route: &str,
        authorization: Option<&HeaderValue>,
        remote: Option<SocketAddr>,
    ) -> GateDecision {
        let token = match bearer_token(authorization) {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(path, remote = ?remote, reason = e.reason(), "missing bearer token");
                return GateDecision::Reject(GateRejection::MissingToken(e));
            }
        };

        let started = Instant::now();
        let verified = tokio::time::timeout(self.verify_timeout, verifier.verify(token))
            .await
            .unwrap_or(Err(VerifyError::Timeout));
        let elapsed = started.elapsed();

        let claims = match verified {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(path, remote = ?remote, reason = e.reason(), "token verification failed");
                return GateDecision::Reject(GateRejection::InvalidToken(e));
            }
        };

        if let Err(e) = authorize(&claims, &self.policy.access) {
            tracing::warn!(
                path,
                subject = %claims.subject,
                reason = e.reason(),
                "authorization denied"
            );
            return GateDecision::Reject(GateRejection::Forbidden(e));
        }

        self.metrics.observe_verification(route, elapsed);
        self.metrics.record_token_verified("success");
        tracing::debug!(
            subject = %claims.subject,
            email = %claims.email,
            path,
            "request authenticated"
        );

        GateDecision::Allow(claims)
    }
}

/// Authentication middleware function.
pub async fn auth_gate(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let authorization = request.headers().get(AUTHORIZATION).cloned();

    match gate.check(&path, &route, authorization.as_ref(), remote).await {
        GateDecision::Bypass => next.run(request).await,
        GateDecision::Allow(claims) => {
            with_claims(request.extensions_mut(), claims);
            next.run(request).await
        }
        GateDecision::Reject(rejection) => rejection.into_response(),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::auth::error::{AuthzError, ExtractError};
    use crate::auth::extractor::Auth;
    use crate::auth::policy::{AccessPolicy, PublicPaths, VerificationChecks};
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        routing::get,
        Router,
    };
    use std::collections::BTreeSet;
    use tower::ServiceExt;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn policy(access: AccessPolicy) -> AuthPolicy {
        AuthPolicy {
            enabled: true,
            issuer_url: "https://idp.example.com".to_string(),
            audience: "timeloc-api".to_string(),
            checks: VerificationChecks::strict(),
            access,
            public_paths: PublicPaths::new(["/health", "/public/*"]),
        }
    }

    fn caller(roles: &[&str]) -> Claims {
        Claims {
            subject: "user_123".to_string(),
            email: "ada@example.com".to_string(),
            roles: set(roles),
            ..Default::default()
        }
    }

    fn app(gate: AuthGate) -> Router {
        async fn whoami(auth: Option<Auth>) -> String {
            match auth {
                Some(Auth(claims)) => claims.subject.clone(),
                None => "anonymous".to_string(),
            }
        }

        Router::new()
            .route("/health", get(whoami))
            .route("/public/info", get(whoami))
            .route("/v1/me", get(whoami))
            .route("/v1/locations/{id}", get(whoami))
            .layer(axum::middleware::from_fn_with_state(Arc::new(gate), auth_gate))
    }

    async fn send(app: Router, path: &str, authorization: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(path);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn disabled_gate_forwards_everything() {
        let metrics = Arc::new(RecordingMetrics::default());
        let app = app(AuthGate::disabled(metrics.clone()));

        assert_eq!(send(app.clone(), "/v1/me", None).await, (StatusCode::OK, "anonymous".into()));
        assert_eq!(
            send(app, "/v1/me", Some("Basic dXNlcjpwYXNz")).await,
            (StatusCode::OK, "anonymous".into())
        );
        assert!(metrics.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn public_path_bypasses_without_telemetry() {
        let metrics = Arc::new(RecordingMetrics::default());
        let gate = AuthGate::new(
            policy(AccessPolicy::default()),
            Arc::new(StubVerifier::Reject(VerifyError::InvalidSignature)),
            metrics.clone(),
        );
        let app = app(gate);

        assert_eq!(send(app.clone(), "/health", None).await.0, StatusCode::OK);
        assert_eq!(send(app, "/public/info", None).await.0, StatusCode::OK);
        assert!(metrics.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_scheme_is_missing_token() {
        let metrics = Arc::new(RecordingMetrics::default());
        let gate = AuthGate::new(
            policy(AccessPolicy::default()),
            Arc::new(StubVerifier::Accept(caller(&["user"]))),
            metrics.clone(),
        );

        let decision = gate
            .check("/v1/me", "/v1/me", Some(&HeaderValue::from_static("Basic dXNlcjpwYXNz")), None)
            .await;
        assert!(matches!(
            decision,
            GateDecision::Reject(GateRejection::MissingToken(ExtractError::WrongScheme))
        ));

        let (status, body) = send(app(gate), "/v1/me", Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"missing or invalid authorization header"}"#);
        assert_eq!(
            metrics.attempts.lock().unwrap().as_slice(),
            &[
                ("/v1/me".to_string(), Outcome::MissingToken),
                ("/v1/me".to_string(), Outcome::MissingToken),
            ]
        );
    }

    #[tokio::test]
    async fn failed_verification_is_invalid_token() {
        let metrics = Arc::new(RecordingMetrics::default());
        let gate = AuthGate::new(
            policy(AccessPolicy::default()),
            Arc::new(StubVerifier::Reject(VerifyError::InvalidSignature)),
            metrics.clone(),
        );

        let (status, body) = send(app(gate), "/v1/me", Some("Bearer abc.def.ghi")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"invalid or expired token"}"#);
        assert_eq!(
            metrics.attempts.lock().unwrap().as_slice(),
            &[("/v1/me".to_string(), Outcome::InvalidToken)]
        );
        assert!(metrics.verifications.lock().unwrap().is_empty());
        assert!(metrics.verified.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_role_is_forbidden() {
        let metrics = Arc::new(RecordingMetrics::default());
        let gate = AuthGate::new(
            policy(AccessPolicy {
                required_roles: set(&["admin"]),
                ..Default::default()
            }),
            Arc::new(StubVerifier::Accept(caller(&["user"]))),
            metrics.clone(),
        );

        let decision = gate
            .check("/v1/me", "/v1/me", Some(&HeaderValue::from_static("Bearer t")), None)
            .await;
        assert!(matches!(
            decision,
            GateDecision::Reject(GateRejection::Forbidden(AuthzError::MissingRole))
        ));

        let (status, body) = send(app(gate), "/v1/me", Some("Bearer t")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, r#"{"error":"insufficient permissions"}"#);
        assert_eq!(metrics.attempts.lock().unwrap()[1].1, Outcome::Forbidden);
    }

    #[tokio::test]
    async fn satisfied_policy_forwards_with_claims() {
        let metrics = Arc::new(RecordingMetrics::default());
        let mut claims = caller(&["admin"]);
        claims.permissions = set(&["locations:read", "locations:write"]);
        claims.scope = "openid time:read".to_string();

        let gate = AuthGate::new(
            policy(AccessPolicy {
                required_roles: set(&["admin", "operator"]),
                required_permissions: set(&["locations:read"]),
                required_scopes: set(&["time:read"]),
            }),
            Arc::new(StubVerifier::Accept(claims)),
            metrics.clone(),
        );

        assert_eq!(
            send(app(gate), "/v1/me", Some("bearer  t0ken ")).await,
            (StatusCode::OK, "user_123".into())
        );
        assert_eq!(
            metrics.attempts.lock().unwrap().as_slice(),
            &[("/v1/me".to_string(), Outcome::Success)]
        );
        assert_eq!(metrics.verifications.lock().unwrap().as_slice(), &["/v1/me".to_string()]);
        assert_eq!(metrics.verified.lock().unwrap().as_slice(), &["success".to_string()]);
    }

    #[tokio::test]
    async fn attempts_are_labelled_by_route_template() {
        let metrics = Arc::new(RecordingMetrics::default());
        let gate = AuthGate::new(
            policy(AccessPolicy::default()),
            Arc::new(StubVerifier::Accept(caller(&["user"]))),
            metrics.clone(),
        );
        let app = app(gate);

        for id in ["0b7c6a4e-5c1d-4c1d-9a39-4d1b2c3d4e5f", "5f0f3c1a-7e2b-4d6e-8b1a-9c8d7e6f5a4b"] {
            let (status, _) = send(app.clone(), &format!("/v1/locations/{id}"), Some("Bearer t")).await;
            assert_eq!(status, StatusCode::OK);
        }
        for i in 0..3 {
            let (status, _) = send(app.clone(), &format!("/random-{i}"), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let route = "/v1/locations/{id}".to_string();
        let unmatched = UNMATCHED_ROUTE.to_string();
        assert_eq!(
            metrics.attempts.lock().unwrap().as_slice(),
            &[
                (route.clone(), Outcome::Success),
                (route.clone(), Outcome::Success),
                (unmatched.clone(), Outcome::MissingToken),
                (unmatched.clone(), Outcome::MissingToken),
                (unmatched, Outcome::MissingToken),
            ]
        );
        assert_eq!(
            metrics.verifications.lock().unwrap().as_slice(),
            &[route.clone(), route]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_verification_times_out_as_invalid_token() {
        let metrics = Arc::new(RecordingMetrics::default());
        let gate = AuthGate::new(
            policy(AccessPolicy::default()),
            Arc::new(StubVerifier::Hang),
            metrics.clone(),
        )
        .with_verify_timeout(Duration::from_millis(50));

        let decision = gate
            .check("/v1/me", "/v1/me", Some(&HeaderValue::from_static("Bearer t")), None)
            .await;
        assert!(matches!(
            decision,
            GateDecision::Reject(GateRejection::InvalidToken(VerifyError::Timeout))
        ));
    }

    #[test]
    fn outcome_labels_are_stable() {
        let labels: Vec<_> = [
            Outcome::Bypassed,
            Outcome::MissingToken,
            Outcome::InvalidToken,
            Outcome::Forbidden,
            Outcome::Success,
        ]
        .iter()
        .map(Outcome::as_str)
        .collect();
        assert_eq!(
            labels,
            ["bypassed", "missing_token", "invalid_token", "forbidden", "success"]
        );
    }
}
