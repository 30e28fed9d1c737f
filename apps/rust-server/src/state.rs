// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::AuthGate;
use crate::metrics::PrometheusMetrics;
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<InMemoryStore>>,
    pub gate: Arc<AuthGate>,
    pub metrics: Arc<PrometheusMetrics>,
}

impl AppState {
    pub fn new(store: InMemoryStore, gate: AuthGate, metrics: Arc<PrometheusMetrics>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            gate: Arc::new(gate),
            metrics,
        }
    }

    /// State with authentication switched off, for tests and local runs.
    pub fn unauthenticated(metrics: Arc<PrometheusMetrics>) -> Self {
        let gate = AuthGate::disabled(metrics.clone());
        Self::new(InMemoryStore::new(), gate, metrics)
    }
}

#[cfg(test)]
impl Default for AppState {
    fn default() -> Self {
        let metrics = PrometheusMetrics::new().expect("metrics registry");
        Self::unauthenticated(Arc::new(metrics))
    }
}
