//! OSRM walking router

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Coordinate, RoutePlan, RoutingService, Step};
use crate::{Error, Result};

/// Public demo server; production deployments should run their own
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Routes through an OSRM server's `foot` profile
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouter {
    /// Create a router for `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pathsense/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn route_url(&self, source: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/foot/{},{};{},{}?steps=true&overview=full&geometries=geojson",
            self.base_url,
            source.longitude,
            source.latitude,
            destination.longitude,
            destination.latitude
        )
    }
}

#[async_trait]
impl RoutingService for OsrmRouter {
    async fn walking_route(
        &self,
        source: Coordinate,
        destination: Coordinate,
    ) -> Result<RoutePlan> {
        let url = self.route_url(source, destination);
        tracing::debug!(%source, %destination, "requesting walking route");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("OSRM request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("OSRM response unreadable: {e}")))?;

        // OSRM reports NoRoute and friends with a 400 and a JSON body
        let parsed: Option<OsrmResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(parsed) if parsed.code == "Ok" => plan_from_response(parsed),
            Some(parsed) if matches!(parsed.code.as_str(), "NoRoute" | "NoSegment") => {
                Err(Error::RouteNotFound(parsed.message.unwrap_or(parsed.code)))
            }
            Some(parsed) => Err(Error::MalformedResponse(format!(
                "OSRM {status}: {}",
                parsed.message.unwrap_or(parsed.code)
            ))),
            None if !status.is_success() => Err(Error::Network(format!("OSRM error {status}"))),
            None => Err(Error::MalformedResponse("OSRM body is not a route response".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "osrm"
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: Geometry,
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    geometry: Geometry,
    maneuver: Maneuver,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[longitude, latitude]` pairs
    coordinates: Vec<[f64; 2]>,
}

impl Geometry {
    fn points(&self) -> Vec<Coordinate> {
        self.coordinates
            .iter()
            .map(|[lon, lat]| Coordinate::new(*lat, *lon))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Maneuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
    #[serde(default)]
    bearing_after: f64,
    exit: Option<u32>,
}

fn plan_from_response(response: OsrmResponse) -> Result<RoutePlan> {
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| Error::RouteNotFound("OSRM returned no routes".to_string()))?;

    let mut steps = Vec::new();
    for step in route.legs.into_iter().flat_map(|leg| leg.steps) {
        let path = step.geometry.points();
        let Some(waypoint) = path.last().copied() else {
            return Err(Error::MalformedResponse("route step without geometry".to_string()));
        };
        steps.push(Step {
            instruction: instruction_for(&step.maneuver, &step.name),
            waypoint,
            path,
        });
    }

    if steps.is_empty() {
        return Err(Error::RouteNotFound("OSRM route has no steps".to_string()));
    }

    Ok(RoutePlan {
        steps,
        path: route.geometry.points(),
    })
}

/// Spoken instruction for one maneuver; empty for arrival
fn instruction_for(maneuver: &Maneuver, road: &str) -> String {
    let modifier = maneuver.modifier.as_deref().unwrap_or("straight");
    let onto = if road.is_empty() {
        String::new()
    } else {
        format!(" onto {road}")
    };

    match maneuver.kind.as_str() {
        "arrive" => String::new(),
        "depart" => {
            let heading = cardinal(maneuver.bearing_after);
            if road.is_empty() {
                format!("Head {heading}")
            } else {
                format!("Head {heading} on {road}")
            }
        }
        "new name" => {
            if road.is_empty() {
                "Continue straight".to_string()
            } else {
                format!("Continue onto {road}")
            }
        }
        "roundabout" | "rotary" => match maneuver.exit {
            Some(exit) => format!("Enter the roundabout and take exit {exit}{onto}"),
            None => format!("Enter the roundabout{onto}"),
        },
        "end of road" => format!(
            "At the end of the road, {}{onto}",
            turn_phrase(modifier).to_lowercase()
        ),
        "fork" => format!("Keep {}{onto}", side(modifier)),
        "merge" => format!("Merge {}{onto}", side(modifier)),
        "continue" if modifier == "straight" => format!("Continue straight{onto}"),
        _ => format!("{}{onto}", turn_phrase(modifier)),
    }
}

fn turn_phrase(modifier: &str) -> String {
    match modifier {
        "uturn" => "Make a U-turn".to_string(),
        "straight" => "Continue straight".to_string(),
        "slight left" => "Bear left".to_string(),
        "slight right" => "Bear right".to_string(),
        other => format!("Turn {other}"),
    }
}

fn side(modifier: &str) -> &str {
    modifier.rsplit(' ').next().unwrap_or(modifier)
}

fn cardinal(bearing: f64) -> &'static str {
    const NAMES: [&str; 8] = [
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
    ];
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = ((bearing.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    NAMES[sector]
}
