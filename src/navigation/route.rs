//! Installed routes and navigation state

use serde::Serialize;

use super::{Coordinate, RoutePlan, Step};
use crate::{Error, Result};

/// A walking route being followed
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    destination: String,
    steps: Vec<Step>,
    path: Vec<Coordinate>,
}

impl Route {
    /// Build a route from a routing response
    ///
    /// Steps without an instruction (e.g. the departure point) are discarded.
    ///
    /// # Errors
    ///
    /// Returns `RouteNotFound` if no step remains
    pub fn from_plan(destination: impl Into<String>, plan: RoutePlan) -> Result<Self> {
        let destination = destination.into();
        let steps: Vec<Step> = plan
            .steps
            .into_iter()
            .filter(|step| !step.instruction.trim().is_empty())
            .collect();

        if steps.is_empty() {
            return Err(Error::RouteNotFound(format!("no walkable steps to {destination}")));
        }

        Ok(Self {
            destination,
            steps,
            path: plan.path,
        })
    }

    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }
}

/// Tracker state machine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NavigationState {
    #[default]
    Idle,
    Navigating {
        route: Route,
        /// Never decreases while `route` is installed
        current_step: usize,
    },
    Arrived {
        destination: String,
    },
}

/// Coarse state name for read models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPhase {
    #[default]
    Idle,
    Navigating,
    Arrived,
}

/// Read-only view of the tracker, published after every change
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NavigationSnapshot {
    pub phase: NavigationPhase,
    pub destination: Option<String>,
    pub step_index: Option<usize>,
    pub step_count: usize,
    pub current_instruction: Option<String>,
    pub next_instruction: Option<String>,
    pub last_fix: Option<Coordinate>,
}

impl NavigationSnapshot {
    /// Project a tracker state
    #[must_use]
    pub fn of(state: &NavigationState, last_fix: Option<Coordinate>) -> Self {
        match state {
            NavigationState::Idle => Self {
                last_fix,
                ..Self::default()
            },
            NavigationState::Navigating {
                route,
                current_step,
            } => Self {
                phase: NavigationPhase::Navigating,
                destination: Some(route.destination().to_string()),
                step_index: Some(*current_step),
                step_count: route.steps().len(),
                current_instruction: route.step(*current_step).map(|s| s.instruction.clone()),
                next_instruction: route.step(current_step + 1).map(|s| s.instruction.clone()),
                last_fix,
            },
            NavigationState::Arrived { destination } => Self {
                phase: NavigationPhase::Arrived,
                destination: Some(destination.clone()),
                last_fix,
                ..Self::default()
            },
        }
    }

    /// Whether a route is being followed
    #[must_use]
    pub fn is_navigating(&self) -> bool {
        self.phase == NavigationPhase::Navigating
    }
}
