//! JSON protocol for the process bridge.
//!
//! The bridge communicates via JSON lines (one JSON object per line):
//!
//! **Input:** requests from the presentation client
//! **Output:** one response per request
//!
//! # Example Session
//!
//! ```text
//! -> {"action":"init_game","seed":"s1"}
//! <- {"success":true,"type":"game_started","seed":"s1","turn":0,"state":{...}}
//! -> {"action":"start_turn"}
//! <- {"success":true,"type":"turn_started","turn":0,"phase":"ACTION_SELECTION","events":[],"can_end_turn":true,"state":{...}}
//! -> {"action":"select_action","action_id":"fundraise"}
//! <- {"success":true,"type":"action_selected","action_id":"fundraise","selected_actions":["fundraise"],"state":{...}}
//! -> {"action":"end_turn"}
//! <- {"success":true,"type":"turn_ended","action_results":[...],"turn_end":{...},"phase":"TURN_END","notifications":[...],"state":{...}}
//! -> {"action":"end_turn"}
//! <- {"success":false,"type":"turn_ended","error":"Cannot end the turn during TURN_END","state":{...}}
//! -> not json
//! <- {"success":false,"error":"Invalid JSON: expected value at line 1 column 1"}
//! ```

use lab_core::actions::Changes;
use lab_core::collaborator::MessageCategory;
use lab_core::events::EventDescriptor;
use lab_core::simulation::{ActionOutcome, TurnEndOutcome};
use lab_core::state::Snapshot;
use lab_core::turn::TurnPhase;
use serde::{Deserialize, Serialize};

// ============================================================================
// Requests (client -> bridge)
// ============================================================================

/// Requests accepted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Start a fresh session, replacing any current one.
    InitGame {
        #[serde(default)]
        seed: Option<String>,
    },

    /// Begin the next turn.
    StartTurn,

    /// Report the current phase and turn state.
    GetPhase,

    /// Queue an action for this turn.
    SelectAction { action_id: String },

    /// Resolve a pending event.
    ResolveEvent { event_id: String, choice_id: String },

    /// Execute an action right away, bypassing phase gating.
    ExecuteAction { action_id: String },

    /// Execute selected actions and settle the turn.
    EndTurn,

    /// List the action catalog with availability.
    GetActions,

    /// Fetch a snapshot.
    GetState,

    /// Fetch the state fingerprint.
    StateHash,

    /// End the session.
    Quit,
}

impl Request {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Verb name, as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitGame { .. } => "init_game",
            Self::StartTurn => "start_turn",
            Self::GetPhase => "get_phase",
            Self::SelectAction { .. } => "select_action",
            Self::ResolveEvent { .. } => "resolve_event",
            Self::ExecuteAction { .. } => "execute_action",
            Self::EndTurn => "end_turn",
            Self::GetActions => "get_actions",
            Self::GetState => "get_state",
            Self::StateHash => "state_hash",
            Self::Quit => "quit",
        }
    }

    /// Type tag of the response this verb produces.
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::InitGame { .. } => "game_started",
            Self::StartTurn => "turn_started",
            Self::GetPhase => "phase",
            Self::SelectAction { .. } => "action_selected",
            Self::ResolveEvent { .. } => "event_resolved",
            Self::ExecuteAction { .. } => "action_result",
            Self::EndTurn => "turn_ended",
            Self::GetActions => "actions",
            Self::GetState => "state",
            Self::StateHash => "state_hash",
            Self::Quit => "bye",
        }
    }
}

// ============================================================================
// Responses (bridge -> client)
// ============================================================================

/// One catalog entry in an `actions` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub id: String,
    pub name: String,
    pub cost: i64,
    pub affordable: bool,
    pub available: bool,
}

/// A collaborator notification queued during the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// `display_message`
    Message {
        category: MessageCategory,
        text: String,
    },
    /// `play_sound`
    Sound { id: String },
}

/// Verb-specific response body, flattened next to `success` and `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    GameStarted {
        seed: String,
        turn: u64,
    },
    TurnStarted {
        turn: u64,
        phase: TurnPhase,
        events: Vec<EventDescriptor>,
        can_end_turn: bool,
    },
    Phase {
        phase: TurnPhase,
        can_end_turn: bool,
        pending_events: Vec<EventDescriptor>,
        selected_actions: Vec<String>,
    },
    ActionSelected {
        action_id: String,
        selected_actions: Vec<String>,
    },
    EventResolved {
        event_id: String,
        choice_id: String,
        applied: bool,
        messages: Vec<String>,
        changes: Changes,
        phase: TurnPhase,
        remaining_events: usize,
        can_end_turn: bool,
    },
    ActionResult {
        result: ActionOutcome,
    },
    TurnEnded {
        action_results: Vec<ActionOutcome>,
        turn_end: TurnEndOutcome,
        phase: TurnPhase,
    },
    Actions {
        actions: Vec<ActionInfo>,
        available: Vec<String>,
    },
    State {},
    StateHash {
        turn: u64,
        hash: String,
    },
    Bye {},
}

impl Payload {
    /// Type tag written next to the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GameStarted { .. } => "game_started",
            Self::TurnStarted { .. } => "turn_started",
            Self::Phase { .. } => "phase",
            Self::ActionSelected { .. } => "action_selected",
            Self::EventResolved { .. } => "event_resolved",
            Self::ActionResult { .. } => "action_result",
            Self::TurnEnded { .. } => "turn_ended",
            Self::Actions { .. } => "actions",
            Self::State {} => "state",
            Self::StateHash { .. } => "state_hash",
            Self::Bye {} => "bye",
        }
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(flatten)]
    pub payload: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Snapshot>,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Successful response carrying a payload.
    pub fn ok(payload: Payload) -> Self {
        Self {
            success: true,
            kind: Some(payload.kind()),
            payload: Some(payload),
            error: None,
            notifications: Vec::new(),
            state: None,
        }
    }

    /// Validation failure: keeps the verb's type tag.
    pub fn rejected(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            payload: None,
            error: Some(message.into()),
            notifications: Vec::new(),
            state: None,
        }
    }

    /// Protocol failure: no type tag, no state.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: None,
            payload: None,
            error: Some(message.into()),
            notifications: Vec::new(),
            state: None,
        }
    }

    /// Attach a snapshot.
    #[must_use]
    pub fn with_state(mut self, state: Snapshot) -> Self {
        self.state = Some(state);
        self
    }

    /// Attach queued notifications.
    #[must_use]
    pub fn with_notifications(mut self, notifications: Vec<Notification>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"success":false,"error":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse_line(response: &Response) -> Value {
        serde_json::from_str(response.to_json_line().trim_end()).unwrap()
    }

    #[test]
    fn test_parse_init_game_with_and_without_seed() {
        let req = Request::from_json(r#"{"action":"init_game","seed":"s1"}"#).unwrap();
        assert_eq!(
            req,
            Request::InitGame {
                seed: Some("s1".to_string())
            }
        );

        let req = Request::from_json(r#"{"action":"init_game"}"#).unwrap();
        assert_eq!(req, Request::InitGame { seed: None });
    }

    #[test]
    fn test_parse_resolve_event() {
        let json = r#"{"action":"resolve_event","event_id":"funding_crisis","choice_id":"emergency_loan"}"#;
        let req = Request::from_json(json).unwrap();
        assert!(matches!(
            req,
            Request::ResolveEvent { ref event_id, ref choice_id }
                if event_id == "funding_crisis" && choice_id == "emergency_loan"
        ));
        assert_eq!(req.response_type(), "event_resolved");
    }

    #[test]
    fn test_unknown_verb_is_rejected() {
        assert!(Request::from_json(r#"{"action":"launch"}"#).is_err());
        assert!(Request::from_json(r#"{"action":"select_action"}"#).is_err());
    }

    #[test]
    fn test_ok_response_is_flat() {
        let resp = Response::ok(Payload::StateHash {
            turn: 3,
            hash: "00000000000000ff".to_string(),
        });
        let json = parse_line(&resp);
        assert_eq!(json["success"], true);
        assert_eq!(json["type"], "state_hash");
        assert_eq!(json["turn"], 3);
        assert_eq!(json["hash"], "00000000000000ff");
        assert!(json.get("error").is_none());
        assert!(json.get("notifications").is_none());
    }

    #[test]
    fn test_unit_payloads_serialize() {
        let json = parse_line(&Response::ok(Payload::Bye {}));
        assert_eq!(json["type"], "bye");
        assert_eq!(json["success"], true);
    }

    #[test]
    fn test_rejected_keeps_type() {
        let json = parse_line(&Response::rejected("turn_ended", "nope"));
        assert_eq!(json["success"], false);
        assert_eq!(json["type"], "turn_ended");
        assert_eq!(json["error"], "nope");
    }

    #[test]
    fn test_protocol_error_shape() {
        let json = parse_line(&Response::error("Invalid JSON: eof"));
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_notification_tags() {
        let resp = Response::ok(Payload::State {}).with_notifications(vec![
            Notification::Message {
                category: MessageCategory::Warning,
                text: "careful".to_string(),
            },
            Notification::Sound {
                id: "victory".to_string(),
            },
        ]);
        let json = parse_line(&resp);
        assert_eq!(json["notifications"][0]["kind"], "message");
        assert_eq!(json["notifications"][0]["category"], "WARNING");
        assert_eq!(json["notifications"][1]["kind"], "sound");
    }

    #[test]
    fn test_line_ends_with_newline() {
        assert!(Response::ok(Payload::Bye {}).to_json_line().ends_with('\n'));
    }
}
