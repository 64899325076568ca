//! Nominatim geocoder

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Coordinate, GeocodingService, Place};
use crate::{Error, Result};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Forward and reverse geocoding against a Nominatim server
///
/// The public server requires an identifying User-Agent and at most one
/// request per second.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                "pathsense/",
                env!("CARGO_PKG_VERSION"),
                " (walking navigation assistant)"
            ))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Nominatim request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!("Nominatim error {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("Nominatim response: {e}")))
    }
}

#[async_trait]
impl GeocodingService for NominatimGeocoder {
    async fn forward(&self, address: &str) -> Result<Place> {
        let query = [
            ("format", "jsonv2".to_string()),
            ("limit", "1".to_string()),
            ("q", address.to_string()),
        ];
        let value = self.get_json("/search", &query).await?;

        let results: Vec<SearchResult> = serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("Nominatim search: {e}")))?;
        let first = results
            .into_iter()
            .next()
            .ok_or_else(|| Error::GeocodeNotFound(address.to_string()))?;

        let coordinate = first.coordinate()?;
        tracing::debug!(address, %coordinate, "address geocoded");

        Ok(Place {
            coordinate,
            label: first.display_name,
        })
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<String> {
        let query = [
            ("format", "jsonv2".to_string()),
            ("lat", coordinate.latitude.to_string()),
            ("lon", coordinate.longitude.to_string()),
        ];
        let value = self.get_json("/reverse", &query).await?;

        // Nominatim answers 200 with {"error": ...} when nothing is there
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return Err(Error::GeocodeNotFound(format!("{coordinate}: {error}")));
        }

        let result: ReverseResult = serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("Nominatim reverse: {e}")))?;

        Ok(result.label())
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

impl SearchResult {
    fn coordinate(&self) -> Result<Coordinate> {
        let parse = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|e| Error::MalformedResponse(format!("coordinate {value:?}: {e}")))
        };
        Ok(Coordinate::new(parse(&self.lat)?, parse(&self.lon)?))
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    display_name: String,
    #[serde(default)]
    address: Address,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl ReverseResult {
    /// Short street-level label, falling back to the full display name
    fn label(self) -> String {
        let Some(road) = self.address.road else {
            return self.display_name;
        };

        let street = match self.address.house_number {
            Some(number) => format!("{number} {road}"),
            None => road,
        };

        match self.address.city.or(self.address.town).or(self.address.village) {
            Some(place) => format!("{street}, {place}"),
            None => street,
        }
    }
}
