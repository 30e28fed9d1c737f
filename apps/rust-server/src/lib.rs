// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Timeloc - time, timezone and locations service
//!
//! An HTTP API for current time lookups and named locations, fronted by an
//! OIDC bearer-token gate.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer-token authentication and authorization (OIDC / JWKS)
//! - `config` - Environment configuration
//! - `metrics` - Prometheus collectors

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod state;
pub mod store;
pub mod timezone;
