// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IANA timezone lookup and clock rendering.

use chrono::{DateTime, Offset, Utc};
use chrono_tz::{Tz, TZ_VARIANTS};

use crate::error::ApiError;
use crate::models::TimeResponse;

/// Resolve an IANA name, rejecting unknown zones with 422.
pub fn parse_timezone(name: &str) -> Result<Tz, ApiError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ApiError::unprocessable(format!("Unknown timezone: {name}")))
}

/// Render `now` in `tz`.
pub fn time_in(tz: Tz, now: DateTime<Utc>) -> TimeResponse {
    let local = now.with_timezone(&tz);
    TimeResponse {
        timezone: tz.name().to_string(),
        datetime: local.to_rfc3339(),
        unix: now.timestamp(),
        utc_offset: local.offset().fix().to_string(),
        abbreviation: local.format("%Z").to_string(),
    }
}

/// All known zone names, optionally filtered by a case-insensitive prefix.
pub fn timezone_names(prefix: Option<&str>) -> Vec<String> {
    let prefix = prefix.map(str::to_ascii_lowercase).unwrap_or_default();
    let mut names: Vec<String> = TZ_VARIANTS
        .iter()
        .map(|tz| tz.name())
        .filter(|name| name.to_ascii_lowercase().starts_with(&prefix))
        .map(str::to_string)
        .collect();
    names.sort();
    names
}
