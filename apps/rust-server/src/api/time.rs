// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::Query, Json};
use chrono::Utc;
use chrono_tz::Tz;

use crate::{
    error::ApiError,
    models::{TimeQuery, TimeResponse, TimezoneList, TimezoneQuery},
    timezone::{parse_timezone, time_in, timezone_names},
};

#[utoipa::path(
    get,
    path = "/v1/time",
    params(TimeQuery),
    tag = "Time",
    security(("bearer" = [])),
    responses(
        (status = 200, body = TimeResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 422, description = "Unknown timezone")
    )
)]
pub async fn current_time(Query(query): Query<TimeQuery>) -> Result<Json<TimeResponse>, ApiError> {
    let tz = match query.timezone.as_deref() {
        Some(name) if !name.trim().is_empty() => parse_timezone(name)?,
        _ => Tz::UTC,
    };
    Ok(Json(time_in(tz, Utc::now())))
}

#[utoipa::path(
    get,
    path = "/v1/timezones",
    params(TimezoneQuery),
    tag = "Time",
    security(("bearer" = [])),
    responses((status = 200, body = TimezoneList))
)]
pub async fn list_timezones(Query(query): Query<TimezoneQuery>) -> Json<TimezoneList> {
    Json(TimezoneList {
        timezones: timezone_names(query.prefix.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn defaults_to_utc() {
        let Json(time) = current_time(Query(TimeQuery { timezone: None }))
            .await
            .expect("time in UTC");
        assert_eq!(time.timezone, "UTC");
        assert_eq!(time.utc_offset, "+00:00");
    }

    #[tokio::test]
    async fn unknown_timezone_is_unprocessable() {
        let err = current_time(Query(TimeQuery {
            timezone: Some("Nowhere/Special".to_string()),
        }))
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn lists_timezones_with_prefix() {
        let Json(list) = list_timezones(Query(TimezoneQuery {
            prefix: Some("Asia/Tok".to_string()),
        }))
        .await;
        assert_eq!(list.timezones, vec!["Asia/Tokyo".to_string()]);
    }
}
