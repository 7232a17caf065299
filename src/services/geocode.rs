// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reverse geocoding of activity start points.

use serde::Deserialize;

/// Label used when a start point cannot be resolved.
pub const DEFAULT_CITY: &str = "Paradise City";

/// geocode.xyz response; only the place names are used.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    city: Option<String>,
    name: Option<String>,
}

/// Reverse geocoder backed by geocode.xyz.
#[derive(Clone)]
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a city name for the given start point.
    ///
    /// Never fails: missing coordinates, transport errors, non-200 responses
    /// and empty answers all fall back to [`DEFAULT_CITY`].
    pub async fn city_for(&self, coordinates: Option<(f64, f64)>) -> String {
        let Some((lat, lon)) = coordinates else {
            return DEFAULT_CITY.to_string();
        };

        match self.lookup(lat, lon).await {
            Ok(Some(city)) => city,
            Ok(None) => DEFAULT_CITY.to_string(),
            Err(e) => {
                tracing::debug!(error = %e, lat, lon, "Reverse geocoding failed");
                DEFAULT_CITY.to_string()
            }
        }
    }

    async fn lookup(&self, lat: f64, lon: f64) -> Result<Option<String>, reqwest::Error> {
        let url = format!("{}/{},{}", self.base_url, lat, lon);
        let response: GeocodeResponse = self
            .http
            .get(&url)
            .query(&[("geoit", "json")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(pick_place_name(response))
    }
}

/// Prefer the city, then the generic place name; blank values don't count.
fn pick_place_name(response: GeocodeResponse) -> Option<String> {
    [response.city, response.name]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_place_name() {
        let both = GeocodeResponse {
            city: Some("Palo Alto".to_string()),
            name: Some("Somewhere".to_string()),
        };
        assert_eq!(pick_place_name(both).as_deref(), Some("Palo Alto"));

        let name_only = GeocodeResponse {
            city: Some("  ".to_string()),
            name: Some("Woodside".to_string()),
        };
        assert_eq!(pick_place_name(name_only).as_deref(), Some("Woodside"));

        let neither = GeocodeResponse {
            city: None,
            name: None,
        };
        assert_eq!(pick_place_name(neither), None);
    }

    #[tokio::test]
    async fn test_missing_coordinates_skip_lookup() {
        // Unroutable base URL: any request would fail, but none is made.
        let client = GeocodeClient::new(reqwest::Client::new(), "http://0.0.0.0:1");
        assert_eq!(client.city_for(None).await, DEFAULT_CITY);
    }
}
