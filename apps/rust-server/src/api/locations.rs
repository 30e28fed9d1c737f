// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{CreateLocationRequest, Location, LocationTimeResponse, UpdateLocationRequest},
    state::AppState,
    timezone::{parse_timezone, time_in},
};

#[utoipa::path(
    get,
    path = "/v1/locations",
    tag = "Locations",
    security(("bearer" = [])),
    responses((status = 200, body = [Location]))
)]
pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<Location>> {
    let store = state.store.read().await;
    Json(store.list_locations())
}

#[utoipa::path(
    post,
    path = "/v1/locations",
    request_body = CreateLocationRequest,
    tag = "Locations",
    security(("bearer" = [])),
    responses(
        (status = 201, body = Location),
        (status = 409, description = "Name already taken"),
        (status = 422, description = "Unknown timezone or invalid coordinates")
    )
)]
pub async fn create_location(
    State(state): State<AppState>,
    Json(request): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), ApiError> {
    let mut store = state.store.write().await;
    let location = store.create_location(request)?;
    tracing::info!(id = %location.id, name = %location.name, "location created");
    Ok((StatusCode::CREATED, Json(location)))
}

#[utoipa::path(
    get,
    path = "/v1/locations/{id}",
    params(("id" = Uuid, Path, description = "Location identifier")),
    tag = "Locations",
    security(("bearer" = [])),
    responses(
        (status = 200, body = Location),
        (status = 404, description = "Location not found")
    )
)]
pub async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Location>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.get_location(id)?))
}

#[utoipa::path(
    put,
    path = "/v1/locations/{id}",
    params(("id" = Uuid, Path, description = "Location identifier")),
    request_body = UpdateLocationRequest,
    tag = "Locations",
    security(("bearer" = [])),
    responses(
        (status = 200, body = Location),
        (status = 404, description = "Location not found"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<Location>, ApiError> {
    let mut store = state.store.write().await;
    Ok(Json(store.update_location(id, request)?))
}

#[utoipa::path(
    delete,
    path = "/v1/locations/{id}",
    params(("id" = Uuid, Path, description = "Location identifier")),
    tag = "Locations",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Location deleted"),
        (status = 404, description = "Location not found")
    )
)]
pub async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.store.write().await;
    store.delete_location(id)?;
    tracing::info!(%id, "location deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/locations/{id}/time",
    params(("id" = Uuid, Path, description = "Location identifier")),
    tag = "Locations",
    security(("bearer" = [])),
    responses(
        (status = 200, body = LocationTimeResponse),
        (status = 404, description = "Location not found")
    )
)]
pub async fn location_time(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LocationTimeResponse>, ApiError> {
    let location = state.store.read().await.get_location(id)?;
    let tz = parse_timezone(&location.timezone)?;
    Ok(Json(LocationTimeResponse {
        time: time_in(tz, Utc::now()),
        location,
    }))
}
