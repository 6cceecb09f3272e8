// SPDX-License-Identifier: MIT

//! Google Maps geocoding client with a per-address cache.

use crate::cache::{self, CacheStore};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

/// A resolved coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

/// Geocoding client. Results are cached under `geocode:<address>` for a
/// day; the cache is consulted before the API.
#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    api_key: String,
    cache: CacheStore,
}

impl Geocoder {
    pub fn new(api_key: String, cache: CacheStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            cache,
        }
    }

    /// Resolve an address to coordinates, cache-first.
    pub async fn geocode(&self, address: &str) -> Result<LatLng, AppError> {
        let key = cache::geocode_key(address);
        if let Some(hit) = self.cache.get_json::<LatLng>(&key).await {
            return Ok(hit);
        }

        let response = self
            .http
            .get(GEOCODE_ENDPOINT)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .timeout(GEOCODE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Geocoding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Geocoding HTTP {}",
                response.status()
            )));
        }

        let parsed: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Geocoding JSON parse error: {}", e)))?;

        let location = parsed
            .results
            .first()
            .map(|result| result.geometry.location)
            .ok_or_else(|| {
                AppError::Upstream(format!("No geocoding results for address: {}", address))
            })?;

        self.cache
            .set_json(&key, &location, cache::GEOCODE_TTL)
            .await;
        Ok(location)
    }
}
