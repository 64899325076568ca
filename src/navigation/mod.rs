//! Walking navigation
//!
//! Destinations are geocoded and routed through external services; the
//! [`NavigationProgressTracker`] then follows the route step by step from
//! location fixes and announces each instruction through the speech arbiter.

mod geo;
mod location;
mod nominatim;
mod osrm;
mod route;
mod services;
mod tracker;

pub use geo::Coordinate;
pub use location::{LabelerSettings, LocationLabeler, LocationLabels};
pub use nominatim::{DEFAULT_NOMINATIM_URL, NominatimGeocoder};
pub use osrm::{DEFAULT_OSRM_URL, OsrmRouter};
pub use route::{NavigationPhase, NavigationSnapshot, NavigationState, Route};
pub use services::{GeocodingService, Place, RoutePlan, RoutingService, Step};
pub use tracker::{
    NavigationEvent, NavigationHandle, NavigationProgressTracker, NavigationSettings,
    PendingRoute, RouteOutcome,
};
