//! Narration prompts for the vision model

use crate::navigation::NavigationSnapshot;

/// What the user is doing when they capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationContext {
    /// No active route: describe obstacles only
    General { location: String },
    /// Following a route: relate the scene to the next maneuvers
    Contextual {
        location: String,
        destination: String,
        instruction: String,
        next_instruction: Option<String>,
    },
}

impl NarrationContext {
    /// Pick the context from the navigation state and location label
    ///
    /// Digits are removed from the label; the model tends to read house
    /// numbers back as distances.
    #[must_use]
    pub fn from_snapshot(snapshot: &NavigationSnapshot, label: Option<&str>) -> Self {
        let location = strip_digits(label.unwrap_or_default());

        match (&snapshot.destination, &snapshot.current_instruction) {
            (Some(destination), Some(instruction)) if snapshot.is_navigating() => Self::Contextual {
                location,
                destination: destination.clone(),
                instruction: instruction.clone(),
                next_instruction: snapshot.next_instruction.clone(),
            },
            _ => Self::General { location },
        }
    }

    /// Text part of the request
    #[must_use]
    pub fn prompt(&self) -> String {
        match self {
            Self::General { location } => format!(
                "Based on the photo, tell the user if there are any physical obstructions like cars, red lights, etc. \
                 Using the road: {location}, help direct the user safely. \
                 Let the user know if it is safe to walk. \
                 If the image provided is not clear, tell the user but don't describe the photo with more than 1 sentence. \
                 Only respond in 1 or 2 sentences."
            ),
            Self::Contextual {
                location,
                destination,
                instruction,
                next_instruction,
            } => {
                let instructions = match next_instruction {
                    Some(next) => format!("{instruction} and then {next}"),
                    None => instruction.clone(),
                };
                format!(
                    "Based on the photo, tell the user if there are any physical obstructions like cars, red lights, etc. \
                     Using the road: {location}, the instructions: {instructions}, and the user's destination: {destination}, \
                     help direct the user safely. \
                     Let the user know if it is safe to walk. \
                     If the image provided is not clear, tell the user but don't describe the photo with more than 1 sentence. \
                     Only respond in 2 or 3 sentences."
                )
            }
        }
    }
}

/// Remove every decimal digit, collapsing the whitespace left behind
#[must_use]
pub fn strip_digits(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationPhase;

    fn navigating(next: Option<&str>) -> NavigationSnapshot {
        NavigationSnapshot {
            phase: NavigationPhase::Navigating,
            destination: Some("Central Library".to_string()),
            step_index: Some(0),
            step_count: 2,
            current_instruction: Some("Turn left onto Main Street".to_string()),
            next_instruction: next.map(str::to_string),
            last_fix: None,
        }
    }

    #[test]
    fn test_strip_digits() {
        assert_eq!(strip_digits("123 Main St, Apt 4B"), "Main St, Apt B");
        assert_eq!(strip_digits("42"), "");
    }

    #[test]
    fn test_general_when_idle() {
        let context =
            NarrationContext::from_snapshot(&NavigationSnapshot::default(), Some("12 Oak Road"));
        assert_eq!(
            context,
            NarrationContext::General {
                location: "Oak Road".to_string()
            }
        );
        assert!(context.prompt().contains("Using the road: Oak Road, help"));
    }

    #[test]
    fn test_contextual_when_navigating() {
        let context =
            NarrationContext::from_snapshot(&navigating(Some("Turn right")), Some("9 Elm St"));
        let prompt = context.prompt();

        assert!(prompt.contains("Using the road: Elm St"));
        assert!(prompt.contains("Turn left onto Main Street and then Turn right"));
        assert!(prompt.contains("destination: Central Library"));
        assert!(prompt.contains("2 or 3 sentences"));
    }

    #[test]
    fn test_contextual_last_step_has_single_instruction() {
        let context = NarrationContext::from_snapshot(&navigating(None), None);
        let prompt = context.prompt();

        assert!(prompt.contains("the instructions: Turn left onto Main Street, and"));
        assert!(!prompt.contains("and then"));
    }
}
