//! Voice input
//!
//! Audio capture and recognition happen on the companion device; only the
//! transcript text reaches us.

mod dictation;

pub use dictation::{
    DictationHandle, DictationSession, DictationSettings, DictationStep, spawn_dictation,
};
