//! External routing and geocoding seams

use async_trait::async_trait;
use serde::Serialize;

use super::Coordinate;
use crate::Result;

/// One maneuver of a walking route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// Spoken instruction, e.g. "Turn left onto Main Street"
    pub instruction: String,
    /// Point that completes the step
    pub waypoint: Coordinate,
    /// Geometry walked during the step
    pub path: Vec<Coordinate>,
}

/// Routing service response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    /// Steps in traversal order
    pub steps: Vec<Step>,
    /// Full route geometry
    pub path: Vec<Coordinate>,
}

/// A geocoded place
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub coordinate: Coordinate,
    pub label: String,
}

/// Computes walking routes
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Route on foot from `source` to `destination`
    ///
    /// # Errors
    ///
    /// Returns `RouteNotFound` if no route exists, `Network` or
    /// `MalformedResponse` if the service misbehaves
    async fn walking_route(&self, source: Coordinate, destination: Coordinate) -> Result<RoutePlan>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}

/// Translates between addresses and coordinates
#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Resolve an address or place name
    ///
    /// # Errors
    ///
    /// Returns `GeocodeNotFound` if nothing matches
    async fn forward(&self, address: &str) -> Result<Place>;

    /// Describe a coordinate
    ///
    /// # Errors
    ///
    /// Returns `GeocodeNotFound` if the coordinate has no address
    async fn reverse(&self, coordinate: Coordinate) -> Result<String>;

    /// Service name for logging
    fn name(&self) -> &'static str;
}
