//! On-demand scene descriptions
//!
//! A capture grabs the latest camera frame, builds a prompt from the
//! navigation context and asks a vision-language model to describe obstacles.
//! The answer is spoken through the arbiter.

mod client;
mod frame;
mod pipeline;
mod prompt;

pub use client::{OpenAiVisionClient, VisionLanguageModelClient, VisionRequest};
pub use frame::{CapturedFrame, FileFrameSource, FrameSource, SharedFrameSlot};
pub use pipeline::{Capture, VisionAssistPipeline, VisionSettings};
pub(crate) use pipeline::CAMERA_UNAVAILABLE_MESSAGE;
pub use prompt::{NarrationContext, strip_digits};
