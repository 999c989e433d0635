//! The engine collaborator interface.
//!
//! The simulation never renders, plays audio or reads input itself. It asks
//! a [`Collaborator`] to do so. Any type implementing the trait can sit on
//! the presentation side of the split: a desktop UI, the process bridge, or
//! the [`RecordingCollaborator`] used by tests.
//!
//! # Call semantics
//!
//! Every method is a fire-and-forget notification except
//! [`Collaborator::show_dialog`], which blocks the calling thread until the
//! collaborator returns a choice or a cancellation.
//!
//! Failures on the collaborator side never fail the simulation operation
//! that triggered them. Only [`Collaborator::play_sound`] reports failure at
//! all, and the core swallows it after logging.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category tag attached to every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageCategory {
    /// Neutral information.
    Info,
    /// Something went well.
    Success,
    /// A request was refused or something needs attention.
    Warning,
    /// A request could not be understood.
    Error,
    /// An event occurred or was resolved.
    Event,
    /// An action was performed.
    Action,
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            MessageCategory::Info => "INFO",
            MessageCategory::Success => "SUCCESS",
            MessageCategory::Warning => "WARNING",
            MessageCategory::Error => "ERROR",
            MessageCategory::Event => "EVENT",
            MessageCategory::Action => "ACTION",
        };
        f.write_str(tag)
    }
}

/// One option offered in a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogOption {
    /// Stable option id.
    pub id: String,
    /// Label shown to the player.
    pub label: String,
}

/// How a dialog was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogOutcome {
    /// The player picked the option with this id.
    Chosen(String),
    /// The dialog was dismissed without a choice.
    Cancelled,
}

/// Failure to produce a side effect on the presentation side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The sound could not be played.
    #[error("Sound playback failed for '{id}': {reason}")]
    Sound {
        /// Sound identifier.
        id: String,
        /// Reason reported by the backend.
        reason: String,
    },
}

/// Capability set the simulation uses to request observable effects.
pub trait Collaborator {
    /// Show a message to the player.
    fn display_message(&mut self, text: &str, category: MessageCategory);

    /// Refresh the numeric resource readouts.
    fn update_resource_display(&mut self, resources: &BTreeMap<String, f64>);

    /// Refresh the turn counter.
    fn update_turn_display(&mut self, turn: u64);

    /// Refresh the head counts.
    fn update_employee_display(&mut self, employees: &BTreeMap<String, u32>);

    /// Present a modal choice.
    ///
    /// **Blocks** the calling thread until the player chooses or cancels.
    fn show_dialog(
        &mut self,
        title: &str,
        description: &str,
        options: &[DialogOption],
    ) -> DialogOutcome;

    /// Play a sound effect.
    fn play_sound(&mut self, id: &str) -> Result<(), CollaboratorError>;

    /// Size of the presentation surface in pixels.
    fn get_screen_size(&self) -> (u32, u32);
}

/// Collaborator that discards every notification.
///
/// Used for replay verification and benchmarks. Dialogs are cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCollaborator;

impl Collaborator for NullCollaborator {
    fn display_message(&mut self, _text: &str, _category: MessageCategory) {}

    fn update_resource_display(&mut self, _resources: &BTreeMap<String, f64>) {}

    fn update_turn_display(&mut self, _turn: u64) {}

    fn update_employee_display(&mut self, _employees: &BTreeMap<String, u32>) {}

    fn show_dialog(
        &mut self,
        _title: &str,
        _description: &str,
        _options: &[DialogOption],
    ) -> DialogOutcome {
        DialogOutcome::Cancelled
    }

    fn play_sound(&mut self, _id: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn get_screen_size(&self) -> (u32, u32) {
        (0, 0)
    }
}

/// A dialog as it was presented to a [`RecordingCollaborator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownDialog {
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub description: String,
    /// Offered options.
    pub options: Vec<DialogOption>,
}

/// Test double that records every call for later assertions.
///
/// Dialog answers are scripted with [`RecordingCollaborator::script_choice`];
/// once the script runs out dialogs are cancelled.
#[derive(Debug, Clone)]
pub struct RecordingCollaborator {
    /// Every message in call order.
    pub messages: Vec<(MessageCategory, String)>,
    /// Every resource readout pushed.
    pub resource_updates: Vec<BTreeMap<String, f64>>,
    /// Every turn number pushed.
    pub turn_updates: Vec<u64>,
    /// Every employee readout pushed.
    pub employee_updates: Vec<BTreeMap<String, u32>>,
    /// Every dialog presented.
    pub dialogs_shown: Vec<ShownDialog>,
    /// Every sound requested, including ones that failed.
    pub sounds_played: Vec<String>,
    /// When set, every `play_sound` call fails.
    pub fail_sounds: bool,
    /// Reported screen size.
    pub screen_size: (u32, u32),
    scripted: VecDeque<DialogOutcome>,
}

impl RecordingCollaborator {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            resource_updates: Vec::new(),
            turn_updates: Vec::new(),
            employee_updates: Vec::new(),
            dialogs_shown: Vec::new(),
            sounds_played: Vec::new(),
            fail_sounds: false,
            screen_size: (1280, 720),
            scripted: VecDeque::new(),
        }
    }

    /// Queue the answer for the next dialog.
    pub fn script_choice(&mut self, outcome: DialogOutcome) {
        self.scripted.push_back(outcome);
    }

    /// Messages of one category, in call order.
    #[must_use]
    pub fn messages_in(&self, category: MessageCategory) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    /// Forget everything recorded so far. Scripted answers are kept.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.resource_updates.clear();
        self.turn_updates.clear();
        self.employee_updates.clear();
        self.dialogs_shown.clear();
        self.sounds_played.clear();
    }
}

impl Default for RecordingCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

impl Collaborator for RecordingCollaborator {
    fn display_message(&mut self, text: &str, category: MessageCategory) {
        self.messages.push((category, text.to_string()));
    }

    fn update_resource_display(&mut self, resources: &BTreeMap<String, f64>) {
        self.resource_updates.push(resources.clone());
    }

    fn update_turn_display(&mut self, turn: u64) {
        self.turn_updates.push(turn);
    }

    fn update_employee_display(&mut self, employees: &BTreeMap<String, u32>) {
        self.employee_updates.push(employees.clone());
    }

    fn show_dialog(
        &mut self,
        title: &str,
        description: &str,
        options: &[DialogOption],
    ) -> DialogOutcome {
        self.dialogs_shown.push(ShownDialog {
            title: title.to_string(),
            description: description.to_string(),
            options: options.to_vec(),
        });
        self.scripted.pop_front().unwrap_or(DialogOutcome::Cancelled)
    }

    fn play_sound(&mut self, id: &str) -> Result<(), CollaboratorError> {
        self.sounds_played.push(id.to_string());
        if self.fail_sounds {
            return Err(CollaboratorError::Sound {
                id: id.to_string(),
                reason: "audio device unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn get_screen_size(&self) -> (u32, u32) {
        self.screen_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> DialogOption {
        DialogOption {
            id: id.to_string(),
            label: id.to_uppercase(),
        }
    }

    #[test]
    fn test_recorder_replays_script_then_cancels() {
        let mut rec = RecordingCollaborator::new();
        rec.script_choice(DialogOutcome::Chosen("a".to_string()));

        let first = rec.show_dialog("t", "d", &[option("a"), option("b")]);
        let second = rec.show_dialog("t", "d", &[option("a")]);

        assert_eq!(first, DialogOutcome::Chosen("a".to_string()));
        assert_eq!(second, DialogOutcome::Cancelled);
        assert_eq!(rec.dialogs_shown.len(), 2);
        assert_eq!(rec.dialogs_shown[0].options.len(), 2);
    }

    #[test]
    fn test_recorder_sound_failure_is_recorded() {
        let mut rec = RecordingCollaborator::new();
        rec.fail_sounds = true;
        assert!(rec.play_sound("victory").is_err());
        assert_eq!(rec.sounds_played, vec!["victory".to_string()]);
    }

    #[test]
    fn test_messages_in_filters_by_category() {
        let mut rec = RecordingCollaborator::new();
        rec.display_message("hello", MessageCategory::Info);
        rec.display_message("careful", MessageCategory::Warning);
        assert_eq!(rec.messages_in(MessageCategory::Warning), vec!["careful"]);
    }

    #[test]
    fn test_screen_size_and_clear() {
        let mut rec = RecordingCollaborator::new();
        rec.screen_size = (800, 600);
        rec.update_turn_display(3);
        rec.clear();
        assert!(rec.turn_updates.is_empty());
        assert_eq!(rec.get_screen_size(), (800, 600));
        assert_eq!(NullCollaborator.get_screen_size(), (0, 0));
    }

    #[test]
    fn test_category_display_names() {
        assert_eq!(MessageCategory::Warning.to_string(), "WARNING");
        assert_eq!(MessageCategory::Event.to_string(), "EVENT");
    }
}
