// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory location store.
//!
//! Contents do not survive a restart.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{CreateLocationRequest, Location, UpdateLocationRequest};
use crate::timezone::parse_timezone;

#[derive(Default)]
pub struct InMemoryStore {
    locations: HashMap<Uuid, Location>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All locations, ordered by name.
    pub fn list_locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        locations
    }

    pub fn get_location(&self, id: Uuid) -> Result<Location, ApiError> {
        self.locations
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Location not found"))
    }

    pub fn create_location(&mut self, request: CreateLocationRequest) -> Result<Location, ApiError> {
        let name = validate_name(&request.name)?;
        let timezone = parse_timezone(&request.timezone)?;
        validate_coordinates(request.latitude, request.longitude)?;
        self.ensure_name_free(&name, None)?;

        let now = Utc::now();
        let location = Location {
            id: Uuid::new_v4(),
            name,
            timezone: timezone.name().to_string(),
            latitude: request.latitude,
            longitude: request.longitude,
            created_at: now,
            updated_at: now,
        };
        self.locations.insert(location.id, location.clone());
        Ok(location)
    }

    pub fn update_location(
        &mut self,
        id: Uuid,
        request: UpdateLocationRequest,
    ) -> Result<Location, ApiError> {
        let mut location = self.get_location(id)?;

        if let Some(name) = request.name {
            let name = validate_name(&name)?;
            self.ensure_name_free(&name, Some(id))?;
            location.name = name;
        }
        if let Some(timezone) = request.timezone {
            location.timezone = parse_timezone(&timezone)?.name().to_string();
        }
        if request.latitude.is_some() {
            location.latitude = request.latitude;
        }
        if request.longitude.is_some() {
            location.longitude = request.longitude;
        }
        validate_coordinates(location.latitude, location.longitude)?;

        location.updated_at = Utc::now();
        self.locations.insert(id, location.clone());
        Ok(location)
    }

    pub fn delete_location(&mut self, id: Uuid) -> Result<(), ApiError> {
        if self.locations.remove(&id).is_some() {
            Ok(())
        } else {
            Err(ApiError::not_found("Location not found"))
        }
    }

    fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ApiError> {
        let taken = self
            .locations
            .values()
            .any(|l| Some(l.id) != except && l.name.eq_ignore_ascii_case(name));
        if taken {
            Err(ApiError::conflict(format!("Location '{name}' already exists")))
        } else {
            Ok(())
        }
    }
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Location name must not be empty"));
    }
    Ok(name.to_string())
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), ApiError> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ApiError::unprocessable("Latitude must be between -90 and 90"));
        }
    }
    if let Some(lon) = longitude {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ApiError::unprocessable("Longitude must be between -180 and 180"));
        }
    }
    Ok(())
}
