//! Process bridge for the lab turn engine.
//!
//! Exposes one [`lab_core`] session to an external presentation process
//! over JSON lines, so the front end can be a desktop UI, a headless test
//! harness or another engine without either side depending on the other.
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Requests from the client (`init_game`, `start_turn`, ...)
//! - **stdout**: One response per request, with a fresh snapshot
//! - **stderr**: Logs (human-readable)
//!
//! See the [`protocol`] module for the full request/response format.
//!
//! # Example
//!
//! ```bash
//! # Serve a session
//! printf '{"action":"init_game","seed":"s1"}\n{"action":"start_turn"}\n' | cargo run -p lab_bridge
//!
//! # Record, then verify the recording
//! cargo run -p lab_bridge -- serve --record session.replay < inputs.jsonl
//! cargo run -p lab_bridge -- replay --file session.replay --verify
//! ```

pub mod autopilot;
pub mod bridge;
pub mod collaborator;
pub mod protocol;

pub use autopilot::{play_session, verify_determinism, SessionReport, VerifyReport};
pub use bridge::{Bridge, BridgeConfig, BridgeError, Flow};
pub use collaborator::BridgeCollaborator;
pub use protocol::{Notification, Payload, Request, Response};
