// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Prometheus metrics.
//!
//! One [`PrometheusMetrics`] per process, owned by [`crate::state::AppState`]
//! and handed to the auth gate as its [`AuthMetrics`] sink. Exposed in the
//! text format on `GET /metrics`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::auth::{AuthMetrics, Outcome, UNMATCHED_ROUTE};

/// Histogram buckets for token verification, in seconds.
const VERIFICATION_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

pub struct PrometheusMetrics {
    auth_attempts_total: IntCounterVec,
    auth_verification_duration: HistogramVec,
    auth_tokens_verified_total: IntCounterVec,
    http_requests_total: IntCounterVec,
    registry: Registry,
}

impl PrometheusMetrics {
    /// Create and register all collectors on a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let auth_attempts_total = IntCounterVec::new(
            Opts::new("auth_attempts_total", "Authorization attempts by route template and outcome"),
            &["path", "outcome"],
        )?;

        let auth_verification_duration = HistogramVec::new(
            HistogramOpts::new(
                "auth_verification_duration_seconds",
                "Time spent verifying accepted bearer tokens",
            )
            .buckets(VERIFICATION_BUCKETS.to_vec()),
            &["path"],
        )?;

        let auth_tokens_verified_total = IntCounterVec::new(
            Opts::new("auth_tokens_verified_total", "Bearer tokens verified"),
            &["status"],
        )?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;

        registry.register(Box::new(auth_attempts_total.clone()))?;
        registry.register(Box::new(auth_verification_duration.clone()))?;
        registry.register(Box::new(auth_tokens_verified_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;

        Ok(Self {
            auth_attempts_total,
            auth_verification_duration,
            auth_tokens_verified_total,
            http_requests_total,
            registry,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
    }

    /// Current value of `auth_attempts_total` for a label pair.
    pub fn auth_attempts(&self, route: &str, outcome: Outcome) -> u64 {
        self.auth_attempts_total
            .with_label_values(&[route, outcome.as_str()])
            .get()
    }

    /// Current value of `auth_tokens_verified_total` for a status.
    pub fn tokens_verified(&self, status: &str) -> u64 {
        self.auth_tokens_verified_total
            .with_label_values(&[status])
            .get()
    }

    /// Number of verification durations observed for a route.
    pub fn verification_samples(&self, route: &str) -> u64 {
        self.auth_verification_duration
            .with_label_values(&[route])
            .get_sample_count()
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl AuthMetrics for PrometheusMetrics {
    fn record_attempt(&self, route: &str, outcome: Outcome) {
        self.auth_attempts_total
            .with_label_values(&[route, outcome.as_str()])
            .inc();
    }

    fn observe_verification(&self, route: &str, elapsed: Duration) {
        self.auth_verification_duration
            .with_label_values(&[route])
            .observe(elapsed.as_secs_f64());
    }

    fn record_token_verified(&self, status: &str) {
        self.auth_tokens_verified_total
            .with_label_values(&[status])
            .inc();
    }
}

/// Middleware counting requests by method, route template and status.
pub async fn track_http(
    State(metrics): State<Arc<PrometheusMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    tracing::trace!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request finished"
    );

    metrics.record_http_request(&method, &path, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_auth_outcomes() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_attempt("/v1/me", Outcome::Success);
        metrics.record_attempt("/v1/me", Outcome::Success);
        metrics.record_attempt("/v1/me", Outcome::Forbidden);
        metrics.observe_verification("/v1/me", Duration::from_millis(3));
        metrics.record_token_verified("success");

        assert_eq!(metrics.auth_attempts("/v1/me", Outcome::Success), 2);
        assert_eq!(metrics.auth_attempts("/v1/me", Outcome::Forbidden), 1);
        assert_eq!(metrics.auth_attempts("/v1/me", Outcome::InvalidToken), 0);
        assert_eq!(metrics.verification_samples("/v1/me"), 1);
        assert_eq!(metrics.tokens_verified("success"), 1);
    }

    #[test]
    fn renders_text_format() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_attempt("/v1/time", Outcome::MissingToken);
        metrics.record_http_request("GET", "/v1/time", 401);

        let text = metrics.render().unwrap();
        let attempts = text
            .lines()
            .find(|line| line.starts_with("auth_attempts_total{"))
            .expect("auth_attempts_total sample");
        assert!(attempts.contains(r#"outcome="missing_token""#));
        assert!(attempts.contains(r#"path="/v1/time""#));
        assert!(attempts.ends_with(" 1"));
        assert!(text.contains(r#"http_requests_total{method="GET",path="/v1/time",status="401"} 1"#));
    }
}
