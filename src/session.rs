//! Interactive customization state machine.
//!
//! A session walks one query's candidates through selection, parameter
//! editing, safety confirmation, and execution. The machine is pure and
//! single-threaded: it consumes discrete [`InputEvent`]s one at a time and
//! never touches a terminal, a clipboard, or a process itself; the driver
//! translates keys into events and performs the effects the machine asks
//! for. That keeps every transition testable without a real terminal.
//!
//! State diagram:
//!
//! ```text
//! Selecting --Select--> Customizing --Commit--> ConfirmingExecution
//!     |                     |                        |        |
//!     |                     |                     Confirm   Decline
//!     |                  (no parameters,             |        |
//!     |                   skips Customizing)         v        v
//!     +----------------------------------------> Executing  Cancelled
//!                                                    |
//!                                                    v
//!                                                  Done
//! ```
//!
//! `Done` and `Cancelled` are terminal; the next candidate or query gets a
//! fresh session.

use crate::error::IncompleteCommandError;
use crate::executor::ExecutionOutcome;
use crate::llm_client::Candidate;
use crate::parameters::{detect, ParameterKind, Span};
use crate::safety::{self, RiskVerdict, Severity};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Selecting,
    Customizing,
    ConfirmingExecution,
    Executing,
    Done,
    Cancelled,
}

/// One discrete user input, already decoded from whatever device produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Choose the candidate at this index.
    Select(usize),
    /// Move the active parameter to the next parameter span.
    NextParameter,
    /// Move the active parameter to the previous parameter span.
    PrevParameter,
    /// Replace the active parameter's value.
    Edit(String),
    /// Replace the active parameter's value with clipboard-provided text.
    Paste(String),
    /// Finish customizing and move toward execution.
    Commit,
    /// Acknowledge a dangerous command.
    Confirm,
    /// Refuse a dangerous command.
    Decline,
    /// Abandon the session.
    Cancel,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// The command classified as dangerous; ask the user before running.
    AwaitingConfirmation(RiskVerdict),
    /// Run this fully substituted command, then call
    /// [`InteractiveSession::complete_execution`].
    Execute { command: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no candidate at index {0}")]
    NoSuchCandidate(usize),
    #[error(transparent)]
    Incomplete(#[from] IncompleteCommandError),
    #[error("event not valid in state {state:?}")]
    InvalidEvent { state: SessionState },
    #[error("an execution is already in flight for this session")]
    ExecutionInFlight,
}

/// Editing state for one selected candidate.
///
/// Spans are a derived view of the candidate's command; edits live in
/// `edited_values`, keyed by span index, and the effective command is the
/// original spans re-concatenated with edits substituted.
#[derive(Debug, Clone)]
pub struct CustomizationSession {
    candidate: Candidate,
    spans: Vec<Span>,
    active_index: Option<usize>,
    edited_values: BTreeMap<usize, String>,
}

impl CustomizationSession {
    pub fn new(candidate: Candidate) -> Self {
        let spans = detect(&candidate.command);
        let active_index = spans.iter().position(Span::is_parameter);
        Self {
            candidate,
            spans,
            active_index,
            edited_values: BTreeMap::new(),
        }
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn has_parameters(&self) -> bool {
        self.spans.iter().any(Span::is_parameter)
    }

    /// The current value of a span: the edit if present, the original text
    /// otherwise.
    pub fn value_of(&self, index: usize) -> &str {
        self.edited_values
            .get(&index)
            .map(String::as_str)
            .unwrap_or(self.spans[index].text.as_str())
    }

    /// The command with all edits substituted in span order.
    pub fn effective_command(&self) -> String {
        self.spans
            .iter()
            .enumerate()
            .map(|(i, _)| self.value_of(i))
            .collect()
    }

    fn parameter_indices(&self) -> Vec<usize> {
        self.spans
            .iter()
            .enumerate()
            .filter(|(_, span)| span.is_parameter())
            .map(|(i, _)| i)
            .collect()
    }

    /// Moves the active parameter forward or backward, wrapping around.
    /// Literal spans are never selectable.
    fn navigate(&mut self, forward: bool) {
        let indices = self.parameter_indices();
        if indices.is_empty() {
            return;
        }
        let position = self
            .active_index
            .and_then(|active| indices.iter().position(|&i| i == active))
            .unwrap_or(0);
        let next = if forward {
            (position + 1) % indices.len()
        } else {
            (position + indices.len() - 1) % indices.len()
        };
        self.active_index = Some(indices[next]);
    }

    /// Replaces the active span's value. Reverting to the original text
    /// clears the edit.
    fn edit_active(&mut self, value: String) -> bool {
        let Some(active) = self.active_index else {
            return false;
        };
        if value == self.spans[active].text {
            self.edited_values.remove(&active);
        } else {
            self.edited_values.insert(active, value);
        }
        true
    }

    /// Placeholder spans that still carry their original `{NAME}`-style text.
    fn unresolved_placeholders(&self) -> Vec<String> {
        self.spans
            .iter()
            .enumerate()
            .filter(|(i, span)| {
                span.parameter_kind() == Some(ParameterKind::Placeholder)
                    && !self.edited_values.contains_key(i)
            })
            .map(|(_, span)| span.text.clone())
            .collect()
    }
}

/// The session driving one query's candidates to execution.
pub struct InteractiveSession {
    candidates: Vec<Candidate>,
    state: SessionState,
    customization: Option<CustomizationSession>,
    verdict: Option<RiskVerdict>,
    last_outcome: Option<ExecutionOutcome>,
    require_confirmation: bool,
}

impl InteractiveSession {
    pub fn new(candidates: Vec<Candidate>, require_confirmation: bool) -> Self {
        Self {
            candidates,
            state: SessionState::Selecting,
            customization: None,
            verdict: None,
            last_outcome: None,
            require_confirmation,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn customization(&self) -> Option<&CustomizationSession> {
        self.customization.as_ref()
    }

    pub fn verdict(&self) -> Option<&RiskVerdict> {
        self.verdict.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&ExecutionOutcome> {
        self.last_outcome.as_ref()
    }

    /// Applies one input event and returns the effect the driver must
    /// perform. Errors leave the state unchanged; the session never ends up
    /// in an unrecoverable state.
    pub fn apply(&mut self, event: InputEvent) -> Result<Effect, SessionError> {
        match self.state {
            SessionState::Selecting => self.apply_selecting(event),
            SessionState::Customizing => self.apply_customizing(event),
            SessionState::ConfirmingExecution => self.apply_confirming(event),
            SessionState::Executing => Err(SessionError::ExecutionInFlight),
            SessionState::Done | SessionState::Cancelled => {
                Err(SessionError::InvalidEvent { state: self.state })
            }
        }
    }

    /// Marks the in-flight execution finished, recording its outcome.
    ///
    /// A non-zero exit code or a timeout still lands in `Done`: they are
    /// recorded outcomes, not state-machine failures.
    pub fn complete_execution(&mut self, outcome: ExecutionOutcome) -> Result<(), SessionError> {
        if self.state != SessionState::Executing {
            return Err(SessionError::InvalidEvent { state: self.state });
        }
        self.last_outcome = Some(outcome);
        self.state = SessionState::Done;
        Ok(())
    }

    fn apply_selecting(&mut self, event: InputEvent) -> Result<Effect, SessionError> {
        match event {
            InputEvent::Select(index) => {
                let candidate = self
                    .candidates
                    .get(index)
                    .cloned()
                    .ok_or(SessionError::NoSuchCandidate(index))?;
                debug!("Selected candidate {}: {}", index, candidate.command);

                let customization = CustomizationSession::new(candidate);
                let has_parameters = customization.has_parameters();
                self.customization = Some(customization);
                if has_parameters {
                    self.state = SessionState::Customizing;
                    Ok(Effect::None)
                } else {
                    self.enter_confirmation()
                }
            }
            InputEvent::Cancel => {
                self.state = SessionState::Cancelled;
                Ok(Effect::None)
            }
            _ => Err(SessionError::InvalidEvent { state: self.state }),
        }
    }

    fn apply_customizing(&mut self, event: InputEvent) -> Result<Effect, SessionError> {
        let customization = self
            .customization
            .as_mut()
            .ok_or(SessionError::InvalidEvent {
                state: SessionState::Customizing,
            })?;

        match event {
            InputEvent::NextParameter => {
                customization.navigate(true);
                Ok(Effect::None)
            }
            InputEvent::PrevParameter => {
                customization.navigate(false);
                Ok(Effect::None)
            }
            InputEvent::Edit(value) | InputEvent::Paste(value) => {
                if customization.edit_active(value) {
                    Ok(Effect::None)
                } else {
                    Err(SessionError::InvalidEvent {
                        state: SessionState::Customizing,
                    })
                }
            }
            InputEvent::Commit => {
                let unresolved = customization.unresolved_placeholders();
                if !unresolved.is_empty() {
                    return Err(IncompleteCommandError {
                        placeholders: unresolved,
                    }
                    .into());
                }
                self.enter_confirmation()
            }
            InputEvent::Cancel => {
                self.state = SessionState::Cancelled;
                Ok(Effect::None)
            }
            _ => Err(SessionError::InvalidEvent {
                state: SessionState::Customizing,
            }),
        }
    }

    fn apply_confirming(&mut self, event: InputEvent) -> Result<Effect, SessionError> {
        match event {
            InputEvent::Confirm => {
                let command = self.effective_command()?;
                self.state = SessionState::Executing;
                Ok(Effect::Execute { command })
            }
            InputEvent::Decline | InputEvent::Cancel => {
                self.state = SessionState::Cancelled;
                Ok(Effect::None)
            }
            _ => Err(SessionError::InvalidEvent { state: self.state }),
        }
    }

    /// Re-classifies the fully substituted command and either asks for
    /// confirmation or advances straight to execution.
    fn enter_confirmation(&mut self) -> Result<Effect, SessionError> {
        let command = self.effective_command()?;
        let verdict = safety::classify(&command)?;
        debug!("Classified command as {:?}", verdict.severity);

        let needs_ack = verdict.severity == Severity::Dangerous && self.require_confirmation;
        self.verdict = Some(verdict.clone());
        if needs_ack {
            self.state = SessionState::ConfirmingExecution;
            Ok(Effect::AwaitingConfirmation(verdict))
        } else {
            self.state = SessionState::Executing;
            Ok(Effect::Execute { command })
        }
    }

    fn effective_command(&self) -> Result<String, SessionError> {
        self.customization
            .as_ref()
            .map(CustomizationSession::effective_command)
            .ok_or(SessionError::InvalidEvent { state: self.state })
    }
}

/// Sequence policy for multi-command requests: a failed command stops the
/// sequence unless configuration says to continue.
pub fn should_continue_sequence(outcome: &ExecutionOutcome, continue_on_failure: bool) -> bool {
    outcome.success() || continue_on_failure
}
