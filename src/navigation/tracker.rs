//! Turn-by-turn progress tracking
//!
//! The tracker is a single-writer actor. Route requests, location fixes,
//! finished route lookups and reinforcement firings are all handled in one
//! `select!` loop, so transitions never race. Route lookups run as spawned
//! tasks and report back into the loop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::{
    Coordinate, GeocodingService, NavigationSnapshot, NavigationState, Route, RoutePlan,
    RoutingService,
};
use crate::events::EventBus;
use crate::speech::{SpeechHandle, SpeechRequest, SpeechSource};
use crate::timer::CancellableTimer;
use crate::{Error, Result};

const ARRIVED_MESSAGE: &str = "You have arrived at your destination.";
const EMPTY_DESTINATION_MESSAGE: &str = "Please provide a destination address.";
const NO_LOCATION_MESSAGE: &str = "Waiting for your location. Please try again in a moment.";

/// Tunables for progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// A step completes once a fix is closer than this to its waypoint
    pub arrival_radius_m: f64,
    /// Gap between repetitions of the current instruction
    #[serde(with = "crate::timer::secs_f64")]
    pub reinforcement_period: Duration,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            arrival_radius_m: 10.0,
            reinforcement_period: Duration::from_secs(5),
        }
    }
}

impl NavigationSettings {
    /// # Errors
    ///
    /// Returns `Config` if the radius or period is not positive
    pub fn validate(&self) -> Result<()> {
        if !(self.arrival_radius_m.is_finite() && self.arrival_radius_m > 0.0) {
            return Err(Error::Config(format!(
                "navigation: arrival radius {} must be positive",
                self.arrival_radius_m
            )));
        }
        if self.reinforcement_period.is_zero() {
            return Err(Error::Config(
                "navigation: reinforcement period must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a route request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// A new route was installed
    Started { steps: usize },
    /// The destination is already being navigated to
    AlreadyNavigating,
    /// A later request finished first and this result was discarded
    Superseded,
}

/// Tracker transitions, published for observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    RouteInstalled { destination: String, steps: usize },
    RouteFailed { destination: String, reason: String },
    StepAdvanced { index: usize, instruction: String },
    Arrived { destination: String },
}

/// A validated request waiting for its route lookup
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRoute {
    pub destination: String,
    pub origin: Coordinate,
}

/// The navigation state machine
pub struct NavigationProgressTracker {
    settings: NavigationSettings,
    state: NavigationState,
    last_fix: Option<Coordinate>,
    reinforcement: CancellableTimer,
    routing: Arc<dyn RoutingService>,
    geocoder: Arc<dyn GeocodingService>,
    speech: SpeechHandle,
    events: EventBus,
    snapshot: watch::Sender<NavigationSnapshot>,
}

impl NavigationProgressTracker {
    /// Create an idle tracker
    #[must_use]
    pub fn new(
        settings: NavigationSettings,
        routing: Arc<dyn RoutingService>,
        geocoder: Arc<dyn GeocodingService>,
        speech: SpeechHandle,
        events: EventBus,
    ) -> Self {
        let (snapshot, _) = watch::channel(NavigationSnapshot::default());
        Self {
            settings,
            state: NavigationState::Idle,
            last_fix: None,
            reinforcement: CancellableTimer::new("reinforcement"),
            routing,
            geocoder,
            speech,
            events,
            snapshot,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &NavigationState {
        &self.state
    }

    #[must_use]
    pub const fn last_fix(&self) -> Option<Coordinate> {
        self.last_fix
    }

    /// Whether periodic reinforcement is scheduled
    #[must_use]
    pub const fn reinforcement_armed(&self) -> bool {
        self.reinforcement.is_armed()
    }

    /// Subscribe to snapshots
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<NavigationSnapshot> {
        self.snapshot.subscribe()
    }

    /// Request a walking route to `destination`, resolving it inline
    ///
    /// `current_location` overrides the last recorded fix as the origin.
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput`, `LocationUnavailable`, or the geocoding/routing
    /// failure. Every failure has already been spoken.
    pub async fn request_route(
        &mut self,
        destination: &str,
        current_location: Option<Coordinate>,
    ) -> Result<RouteOutcome> {
        if let Some(fix) = current_location {
            self.last_fix = Some(fix);
        }

        let pending = match self.begin_request(destination) {
            Ok(pending) => pending,
            Err(Error::DuplicateDestination(_)) => return Ok(RouteOutcome::AlreadyNavigating),
            Err(e) => return Err(e),
        };

        let result = resolve_route(&*self.geocoder, &*self.routing, &pending).await;
        self.finish_request(pending.destination, result)
    }

    /// Validate a route request before any external call
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` for a blank destination, `DuplicateDestination`
    /// when it is already active, `LocationUnavailable` without a fix
    pub fn begin_request(&mut self, destination: &str) -> Result<PendingRoute> {
        let destination = destination.trim();

        if destination.is_empty() {
            self.say(SpeechRequest::interrupting(
                SpeechSource::System,
                EMPTY_DESTINATION_MESSAGE,
            ));
            return Err(Error::EmptyInput("destination"));
        }

        if let NavigationState::Navigating { route, .. } = &self.state
            && route.destination() == destination
        {
            tracing::debug!(destination, "destination already active");
            self.say(SpeechRequest::interrupting(
                SpeechSource::Navigation,
                format!("{destination} is already in navigation."),
            ));
            return Err(Error::DuplicateDestination(destination.to_string()));
        }

        let Some(origin) = self.last_fix else {
            self.say(SpeechRequest::interrupting(
                SpeechSource::System,
                NO_LOCATION_MESSAGE,
            ));
            return Err(Error::LocationUnavailable);
        };

        Ok(PendingRoute {
            destination: destination.to_string(),
            origin,
        })
    }

    /// Install or reject the outcome of a route lookup
    ///
    /// # Errors
    ///
    /// Returns the lookup failure (or `RouteNotFound` for a route without
    /// usable steps) after announcing it; state is unchanged
    pub fn finish_request(
        &mut self,
        destination: String,
        result: Result<RoutePlan>,
    ) -> Result<RouteOutcome> {
        match result.and_then(|plan| Route::from_plan(destination.clone(), plan)) {
            Ok(route) => Ok(self.install(route)),
            Err(e) => {
                tracing::warn!(destination = %destination, error = %e, "route request failed");
                self.say(SpeechRequest::interrupting(
                    SpeechSource::Navigation,
                    format!("Unable to find {destination}."),
                ));
                self.events.publish(NavigationEvent::RouteFailed {
                    destination,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn install(&mut self, route: Route) -> RouteOutcome {
        let destination = route.destination().to_string();
        let steps = route.steps().len();

        self.state = NavigationState::Navigating {
            route,
            current_step: 0,
        };
        self.reinforcement
            .start_repeating(self.settings.reinforcement_period);

        tracing::info!(destination = %destination, steps, "route installed");
        self.say(SpeechRequest::interrupting(
            SpeechSource::Navigation,
            format!("Starting walking navigation to {destination}."),
        ));
        self.events.publish(NavigationEvent::RouteInstalled { destination, steps });
        self.publish_snapshot();

        RouteOutcome::Started { steps }
    }

    /// Record a fix and advance at most one step
    pub fn on_location_update(&mut self, fix: Coordinate) -> Option<NavigationEvent> {
        self.last_fix = Some(fix);

        let NavigationState::Navigating {
            route,
            current_step,
        } = &mut self.state
        else {
            self.publish_snapshot();
            return None;
        };

        let step = route.step(*current_step)?;

        let distance = fix.distance_to(&step.waypoint);
        if distance >= self.settings.arrival_radius_m {
            self.publish_snapshot();
            return None;
        }

        *current_step += 1;
        let index = *current_step;

        let event = if let Some(next) = route.step(index) {
            let instruction = next.instruction.clone();
            tracing::info!(index, distance, instruction = %instruction, "step advanced");
            self.say(SpeechRequest::interrupting(
                SpeechSource::Navigation,
                instruction.clone(),
            ));
            NavigationEvent::StepAdvanced { index, instruction }
        } else {
            let destination = route.destination().to_string();
            self.state = NavigationState::Arrived {
                destination: destination.clone(),
            };
            self.reinforcement.cancel();
            tracing::info!(destination = %destination, "arrived");
            self.say(SpeechRequest::interrupting(
                SpeechSource::Navigation,
                ARRIVED_MESSAGE,
            ));
            NavigationEvent::Arrived { destination }
        };

        self.events.publish(event.clone());
        self.publish_snapshot();
        Some(event)
    }

    /// Repeat the current instruction without cutting anything off
    pub fn reinforce(&self) {
        if let NavigationState::Navigating {
            route,
            current_step,
        } = &self.state
            && let Some(step) = route.step(*current_step)
        {
            tracing::debug!(index = current_step, "reinforcing instruction");
            self.say(SpeechRequest::polite(
                SpeechSource::Navigation,
                step.instruction.clone(),
            ));
        }
    }

    fn say(&self, request: SpeechRequest) {
        self.speech.speak(request);
    }

    fn publish_snapshot(&self) {
        let snapshot = NavigationSnapshot::of(&self.state, self.last_fix);
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Run the tracker as an actor
    ///
    /// Returns the handle used by producers and the task handle. The task
    /// stops once every [`NavigationHandle`] is dropped.
    pub fn spawn(self, capacity: usize) -> (NavigationHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = NavigationHandle {
            tx,
            snapshot: self.watch(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let (resolved_tx, mut resolved_rx) = mpsc::unbounded_channel::<Resolved>();
        let mut generation: u64 = 0;
        let mut lookup: Option<JoinHandle<()>> = None;

        tracing::debug!(
            routing = self.routing.name(),
            geocoder = self.geocoder.name(),
            "navigation tracker started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::RequestRoute { destination, reply }) => {
                        let pending = match self.begin_request(&destination) {
                            Ok(pending) => pending,
                            Err(Error::DuplicateDestination(_)) => {
                                let _ = reply.send(Ok(RouteOutcome::AlreadyNavigating));
                                continue;
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                                continue;
                            }
                        };

                        generation += 1;
                        let request_generation = generation;
                        let geocoder = Arc::clone(&self.geocoder);
                        let routing = Arc::clone(&self.routing);
                        let resolved_tx = resolved_tx.clone();

                        lookup = Some(tokio::spawn(async move {
                            let result = resolve_route(&*geocoder, &*routing, &pending).await;
                            let _ = resolved_tx.send(Resolved {
                                generation: request_generation,
                                destination: pending.destination,
                                result,
                                reply,
                            });
                        }));
                    }
                    Some(Command::Location(fix)) => {
                        self.on_location_update(fix);
                    }
                    None => break,
                },
                Some(resolved) = resolved_rx.recv() => {
                    let outcome = if resolved.generation == generation {
                        self.finish_request(resolved.destination, resolved.result)
                    } else {
                        tracing::debug!(
                            destination = %resolved.destination,
                            "stale route lookup discarded"
                        );
                        Ok(RouteOutcome::Superseded)
                    };
                    let _ = resolved.reply.send(outcome);
                }
                () = self.reinforcement.fired() => {
                    self.reinforce();
                }
            }
        }

        if let Some(lookup) = lookup {
            lookup.abort();
        }
        self.reinforcement.cancel();
        tracing::debug!("navigation tracker stopped");
    }
}

/// Geocode the destination, then route to it
async fn resolve_route(
    geocoder: &dyn GeocodingService,
    routing: &dyn RoutingService,
    pending: &PendingRoute,
) -> Result<RoutePlan> {
    let place = geocoder.forward(&pending.destination).await?;
    tracing::debug!(
        destination = %pending.destination,
        label = %place.label,
        coordinate = %place.coordinate,
        "destination geocoded"
    );
    routing.walking_route(pending.origin, place.coordinate).await
}

enum Command {
    RequestRoute {
        destination: String,
        reply: oneshot::Sender<Result<RouteOutcome>>,
    },
    Location(Coordinate),
}

struct Resolved {
    generation: u64,
    destination: String,
    result: Result<RoutePlan>,
    reply: oneshot::Sender<Result<RouteOutcome>>,
}

/// Cloneable front door to the tracker actor
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<NavigationSnapshot>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestRoute { destination, .. } => {
                f.debug_struct("RequestRoute").field("destination", destination).finish()
            }
            Self::Location(fix) => f.debug_tuple("Location").field(fix).finish(),
        }
    }
}

impl NavigationHandle {
    /// Ask for a route and wait for the outcome
    ///
    /// # Errors
    ///
    /// Returns the request failure, or `Stopped` if the tracker is gone
    pub async fn request_route(&self, destination: impl Into<String>) -> Result<RouteOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::RequestRoute {
                destination: destination.into(),
                reply,
            })
            .await
            .map_err(|_| Error::Stopped("navigation tracker"))?;
        rx.await.map_err(|_| Error::Stopped("navigation tracker"))?
    }

    /// Forward a location fix without waiting
    ///
    /// Returns false if the fix was dropped because the tracker is busy or
    /// gone.
    pub fn update_location(&self, fix: Coordinate) -> bool {
        match self.tx.try_send(Command::Location(fix)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "location fix dropped");
                false
            }
        }
    }

    /// Latest snapshot
    #[must_use]
    pub fn snapshot(&self) -> NavigationSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.snapshot.clone()
    }
}
