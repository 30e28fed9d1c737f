// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Request,
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::auth_gate,
    metrics::track_http,
    models::{
        CreateLocationRequest, Location, LocationTimeResponse, TimeResponse, TimezoneList,
        UpdateLocationRequest,
    },
    state::AppState,
};

pub mod health;
pub mod locations;
pub mod metrics;
pub mod time;
pub mod users;

/// Build the service router.
///
/// Every route, Swagger UI included, sits behind the auth gate; paths listed
/// in the public-path policy are let through without a token.
pub fn router(state: AppState) -> Router {
    let gate = state.gate.clone();
    let http_metrics = state.metrics.clone();

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/metrics", get(metrics::metrics))
        .route("/v1/me", get(users::get_current_user))
        .route("/v1/time", get(time::current_time))
        .route("/v1/timezones", get(time::list_timezones))
        .route(
            "/v1/locations",
            get(locations::list_locations).post(locations::create_location),
        )
        .route(
            "/v1/locations/{id}",
            get(locations::get_location)
                .put(locations::update_location)
                .delete(locations::delete_location),
        )
        .route("/v1/locations/{id}/time", get(locations::location_time))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(gate, auth_gate))
        .layer(middleware::from_fn_with_state(http_metrics, track_http))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        metrics::metrics,
        users::get_current_user,
        time::current_time,
        time::list_timezones,
        locations::list_locations,
        locations::create_location,
        locations::get_location,
        locations::update_location,
        locations::delete_location,
        locations::location_time
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            users::MeResponse,
            TimeResponse,
            TimezoneList,
            Location,
            CreateLocationRequest,
            UpdateLocationRequest,
            LocationTimeResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness, health and metrics"),
        (name = "Users", description = "Caller identity"),
        (name = "Time", description = "Current time and timezone lookup"),
        (name = "Locations", description = "Named locations and their local time")
    )
)]
struct ApiDoc;
