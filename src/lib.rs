//! Pathsense - walking navigation assistant for blind and low-vision users
//!
//! This library provides the core functionality for the pathsense daemon:
//! - Obstacle haptics from depth frames
//! - Turn-by-turn walking navigation with spoken progress
//! - On-demand scene descriptions from a vision-language model
//! - One speech arbiter shared by every narrating component
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Companion device (HTTP API)            │
//! │  depth │ camera │ location │ dictation │ permissions│
//! └───┬────────┬────────┬───────────┬──────────┬────────┘
//!     │        │        │           │          │
//! ┌───▼────┐ ┌─▼──────┐ ┌▼─────────┐ │   ┌──────▼──────┐
//! │ Depth  │ │ Vision │ │Navigation│◄┘   │ FeatureGate │
//! │monitor │ │pipeline│ │ tracker  │     └──────┬──────┘
//! └───┬────┘ └─┬──────┘ └┬─────────┘            │
//!     │        │         │                      │
//! ┌───▼────┐ ┌─▼─────────▼──────────────────────▼──────┐
//! │Actuator│ │             Speech arbiter               │
//! └────────┘ └──────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod depth;
pub mod error;
pub mod events;
pub mod features;
pub mod haptics;
pub mod navigation;
pub mod speech;
pub mod timer;
pub mod vision;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use depth::{DepthFrame, DepthFrameProcessor, DistanceSample, FocusRegion};
pub use error::{Error, Result};
pub use events::{Event, EventBus};
pub use features::{Feature, FeatureGate, FeatureStatus};
pub use haptics::{HapticAlertScheduler, HapticEvent, HapticPolicy};
pub use navigation::{NavigationHandle, NavigationProgressTracker};
pub use speech::{SpeechArbiter, SpeechHandle, SpeechRequest, SpeechSource};
pub use timer::CancellableTimer;
pub use vision::VisionAssistPipeline;
