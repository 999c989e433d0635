//! Collaborator used behind the bridge.
//!
//! Notifications are queued and drained into the next response. Readout
//! updates are only logged, since every response already carries a fresh
//! snapshot. Dialogs never happen in bridge sessions: the remote client
//! resolves events through `resolve_event`.

use std::collections::BTreeMap;

use lab_core::collaborator::{
    Collaborator, CollaboratorError, DialogOption, DialogOutcome, MessageCategory,
};

use crate::protocol::Notification;

/// Queues notifications for the remote client.
#[derive(Debug, Clone)]
pub struct BridgeCollaborator {
    queue: Vec<Notification>,
    screen_size: (u32, u32),
}

impl BridgeCollaborator {
    /// Create a collaborator reporting the given screen size.
    pub fn new(screen_size: (u32, u32)) -> Self {
        Self {
            queue: Vec::new(),
            screen_size,
        }
    }

    /// Take every queued notification.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.queue)
    }

    /// Number of queued notifications.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Default for BridgeCollaborator {
    fn default() -> Self {
        Self::new((0, 0))
    }
}

impl Collaborator for BridgeCollaborator {
    fn display_message(&mut self, text: &str, category: MessageCategory) {
        tracing::debug!(%category, text, "Message");
        self.queue.push(Notification::Message {
            category,
            text: text.to_string(),
        });
    }

    fn update_resource_display(&mut self, resources: &BTreeMap<String, f64>) {
        tracing::trace!(?resources, "Resource readout");
    }

    fn update_turn_display(&mut self, turn: u64) {
        tracing::trace!(turn, "Turn readout");
    }

    fn update_employee_display(&mut self, employees: &BTreeMap<String, u32>) {
        tracing::trace!(?employees, "Employee readout");
    }

    fn show_dialog(
        &mut self,
        title: &str,
        _description: &str,
        options: &[DialogOption],
    ) -> DialogOutcome {
        tracing::warn!(
            title,
            options = options.len(),
            "Dialog requested in a bridge session, cancelling"
        );
        DialogOutcome::Cancelled
    }

    fn play_sound(&mut self, id: &str) -> Result<(), CollaboratorError> {
        self.queue.push(Notification::Sound { id: id.to_string() });
        Ok(())
    }

    fn get_screen_size(&self) -> (u32, u32) {
        self.screen_size
    }
}
