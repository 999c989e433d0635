//! Request dispatcher and serve loop.
//!
//! [`Bridge`] owns at most one session. Each request is parsed, mapped to
//! exactly one controller or core call, and answered with the result, the
//! notifications queued during the call and a fresh snapshot.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use lab_core::actions::ActionKind;
use lab_core::error::GameError;
use lab_core::replay::{Replay, ReplayInput};
use lab_core::simulation::Simulation;
use lab_core::tuning::Tuning;
use lab_core::turn::TurnController;
use thiserror::Error;

use crate::collaborator::BridgeCollaborator;
use crate::protocol::{ActionInfo, Payload, Request, Response};

/// Seed used when `init_game` does not name one.
pub const DEFAULT_SEED: &str = "frontier-lab";

/// Error type for bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Line is not JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    /// Line is not valid UTF-8.
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),
    /// JSON is not a known request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// A session verb arrived before `init_game`.
    #[error("Game not initialized")]
    NotInitialized,
    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Replay recording could not be written.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Whether the serve loop keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop after writing this response.
    Quit,
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Seed for `init_game` without one.
    pub default_seed: String,
    /// Tuning for every session.
    pub tuning: Tuning,
    /// Where to write the replay of each session, if anywhere.
    ///
    /// The first session uses this path as is; later sessions in the same
    /// process get a numbered sibling (`session.replay`, `session.2.replay`).
    pub record: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_seed: DEFAULT_SEED.to_string(),
            tuning: Tuning::default(),
            record: None,
        }
    }
}

/// One bridge instance, serving one session at a time.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    session: Option<TurnController<BridgeCollaborator>>,
    spare: Option<BridgeCollaborator>,
    recording: Option<(Replay, PathBuf)>,
    sessions: u32,
}

impl Bridge {
    /// Create a bridge. The collaborator is handed to the first session.
    pub fn new(config: BridgeConfig, collaborator: BridgeCollaborator) -> Self {
        Self {
            config,
            session: None,
            spare: Some(collaborator),
            recording: None,
            sessions: 0,
        }
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<&TurnController<BridgeCollaborator>> {
        self.session.as_ref()
    }

    /// Read requests until `quit` or end of input, writing one response
    /// line per request. Blank lines are ignored; a line that is not UTF-8
    /// gets an error response like any other malformed request.
    pub fn serve<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), BridgeError> {
        tracing::info!("Bridge serving");

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }

            let (response, flow) = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.handle_line(line)
                }
                Err(err) => {
                    tracing::warn!(%err, "Rejected non UTF-8 request line");
                    (
                        Response::error(BridgeError::InvalidUtf8(err.to_string()).to_string()),
                        Flow::Continue,
                    )
                }
            };
            writer.write_all(response.to_json_line().as_bytes())?;
            writer.flush()?;

            if flow == Flow::Quit {
                break;
            }
        }

        self.finish_recording()?;
        tracing::info!("Bridge session ended");
        Ok(())
    }

    /// Handle one raw line.
    pub fn handle_line(&mut self, line: &str) -> (Response, Flow) {
        match parse_request(line) {
            Ok(request) => {
                let flow = if request == Request::Quit {
                    Flow::Quit
                } else {
                    Flow::Continue
                };
                (self.dispatch(&request), flow)
            }
            Err(err) => {
                tracing::warn!(%err, "Rejected request line");
                (Response::error(err.to_string()), Flow::Continue)
            }
        }
    }

    /// Handle one parsed request.
    pub fn dispatch(&mut self, request: &Request) -> Response {
        tracing::debug!(action = request.name(), "Request");

        if let Request::InitGame { seed } = request {
            return self.init_game(seed.as_deref());
        }
        if *request == Request::Quit {
            return self.respond(Response::ok(Payload::Bye {}));
        }

        let Some(ctl) = self.session.as_mut() else {
            return Response::rejected(
                request.response_type(),
                BridgeError::NotInitialized.to_string(),
            );
        };

        let response = match request {
            Request::InitGame { .. } | Request::Quit => unreachable_verb(request),
            Request::StartTurn => match ctl.start_turn() {
                Ok(started) => Response::ok(Payload::TurnStarted {
                    turn: started.turn,
                    phase: started.phase,
                    events: started.events,
                    can_end_turn: started.can_end_turn,
                }),
                Err(err) => Response::rejected(request.response_type(), err.to_string()),
            },
            Request::GetPhase => {
                let turn = ctl.turn_state();
                Response::ok(Payload::Phase {
                    phase: turn.phase,
                    can_end_turn: turn.can_end_turn(),
                    pending_events: turn.pending_events.clone(),
                    selected_actions: turn.selected_actions.clone(),
                })
            }
            Request::SelectAction { action_id } => match ctl.select_action(action_id) {
                Ok(selected_actions) => Response::ok(Payload::ActionSelected {
                    action_id: action_id.clone(),
                    selected_actions,
                }),
                Err(err) => Response::rejected(request.response_type(), err.to_string()),
            },
            Request::ResolveEvent {
                event_id,
                choice_id,
            } => match ctl.resolve_event(event_id, choice_id) {
                Ok(resolved) => Response::ok(Payload::EventResolved {
                    event_id: event_id.clone(),
                    choice_id: choice_id.clone(),
                    applied: resolved.outcome.applied,
                    messages: resolved.outcome.messages,
                    changes: resolved.outcome.changes,
                    phase: resolved.phase,
                    remaining_events: resolved.remaining_events,
                    can_end_turn: resolved.can_end_turn,
                }),
                Err(err) => Response::rejected(request.response_type(), err.to_string()),
            },
            Request::ExecuteAction { action_id } => {
                let result = ctl.execute_action_direct(action_id);
                let success = result.success;
                let error = (!success).then(|| result.messages.join("; "));
                let mut response = Response::ok(Payload::ActionResult { result });
                response.success = success;
                response.error = error;
                response
            }
            Request::EndTurn => match ctl.end_turn() {
                Ok(ended) => Response::ok(Payload::TurnEnded {
                    action_results: ended.action_results,
                    turn_end: ended.turn_end,
                    phase: ended.phase,
                }),
                Err(err) => Response::rejected(request.response_type(), err.to_string()),
            },
            Request::GetActions => {
                let sim = ctl.simulation();
                let available = sim.get_available_actions();
                let actions = ActionKind::ALL
                    .iter()
                    .map(|kind| ActionInfo {
                        id: kind.id().to_string(),
                        name: kind.name().to_string(),
                        cost: kind.cost(),
                        affordable: sim.can_afford_action(kind.id()),
                        available: available.iter().any(|id| id == kind.id()),
                    })
                    .collect();
                Response::ok(Payload::Actions { actions, available })
            }
            Request::GetState => Response::ok(Payload::State {}),
            Request::StateHash => Response::ok(Payload::StateHash {
                turn: ctl.simulation().state().turn,
                hash: format!("{:016x}", ctl.simulation().state_hash()),
            }),
        };

        self.record(request);
        self.respond(response)
    }

    fn init_game(&mut self, seed: Option<&str>) -> Response {
        if let Err(err) = self.finish_recording() {
            tracing::warn!(%err, "Failed to save previous recording");
        }

        let seed = seed.unwrap_or(&self.config.default_seed).to_string();
        let collaborator = match self.session.take() {
            Some(previous) => previous.into_collaborator(),
            None => self.spare.take().unwrap_or_default(),
        };
        let mut collaborator = collaborator;
        collaborator.drain();

        let sim = Simulation::new(seed.clone(), self.config.tuning.clone(), collaborator);
        self.session = Some(TurnController::new(sim));
        self.sessions += 1;
        if let Some(base) = &self.config.record {
            let replay = Replay::new(seed.clone(), self.config.tuning.clone());
            self.recording = Some((replay, session_replay_path(base, self.sessions)));
        }

        tracing::info!(seed = %seed, "Session started");
        self.respond(Response::ok(Payload::GameStarted { seed, turn: 0 }))
    }

    fn record(&mut self, request: &Request) {
        let Some((replay, _)) = self.recording.as_mut() else {
            return;
        };
        let input = match request {
            Request::StartTurn => ReplayInput::StartTurn,
            Request::SelectAction { action_id } => ReplayInput::SelectAction(action_id.clone()),
            Request::ResolveEvent {
                event_id,
                choice_id,
            } => ReplayInput::ResolveEvent {
                event_id: event_id.clone(),
                choice_id: choice_id.clone(),
            },
            Request::EndTurn => ReplayInput::EndTurn,
            Request::ExecuteAction { action_id } => ReplayInput::ExecuteAction(action_id.clone()),
            _ => return,
        };
        replay.record(input);
    }

    /// Finalize and write the current recording, if one is active.
    pub fn finish_recording(&mut self) -> Result<(), BridgeError> {
        let Some((mut replay, path)) = self.recording.take() else {
            return Ok(());
        };
        if let Some(ctl) = &self.session {
            let state = ctl.simulation().state();
            replay.finalize(state.turn, state.state_hash());
        }
        replay.save(&path)?;
        tracing::info!(
            path = %path.display(),
            inputs = replay.input_count(),
            "Replay saved"
        );
        Ok(())
    }

    fn respond(&mut self, response: Response) -> Response {
        match self.session.as_mut() {
            Some(ctl) => {
                let notifications = ctl.collaborator_mut().drain();
                response
                    .with_notifications(notifications)
                    .with_state(ctl.simulation().snapshot())
            }
            None => response,
        }
    }
}

fn parse_request(line: &str) -> Result<Request, BridgeError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| BridgeError::InvalidJson(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| BridgeError::InvalidRequest(e.to_string()))
}

/// Replay file for the `session`-th session (1-based) of this process.
fn session_replay_path(base: &Path, session: u32) -> PathBuf {
    if session <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}.{session}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{session}"),
    };
    base.with_file_name(name)
}

fn unreachable_verb(request: &Request) -> Response {
    tracing::error!(action = request.name(), "Verb reached session dispatch");
    Response::rejected(request.response_type(), "Internal dispatch error")
}
