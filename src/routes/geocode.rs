// SPDX-License-Identifier: MIT

//! Batch geocoding route.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::services::geocode::LatLng;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/geocode", post(geocode_addresses))
}

#[derive(Deserialize)]
pub struct GeocodeRequest {
    // Kept loose so a non-array payload yields a 400 with a message
    // instead of a body-rejection error.
    #[serde(default)]
    addresses: serde_json::Value,
}

#[derive(Serialize)]
pub struct GeocodeResponse {
    results: Vec<LatLng>,
}

/// Resolve a batch of addresses to coordinates.
async fn geocode_addresses(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GeocodeRequest>,
) -> Result<Json<GeocodeResponse>> {
    let addresses = body
        .addresses
        .as_array()
        .ok_or_else(|| AppError::BadRequest("addresses must be an array".to_string()))?;

    let geocoder = state.geocoder.as_ref().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("GOOGLE_MAPS_API_KEY not configured"))
    })?;

    let mut results = Vec::with_capacity(addresses.len());
    for address in addresses {
        let address = address
            .as_str()
            .ok_or_else(|| AppError::BadRequest("addresses must be strings".to_string()))?;
        results.push(geocoder.geocode(address).await?);
    }

    Ok(Json(GeocodeResponse { results }))
}
