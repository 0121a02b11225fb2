//! Text-completion seam, timeout wrapper, and per-action request tracking.
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures a completion backend can report. All of them mean "no content"
/// to the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion transport failed: {0}")]
    Transport(String),
    #[error("completion service answered with status {0}")]
    Status(u16),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("completion payload was malformed: {0}")]
    Malformed(String),
    #[error("completion service is offline")]
    Offline,
}

/// The external text generator. One attempt per call, no retries.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// A backend that never answers; every reading uses local fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCompletion;

#[async_trait]
impl TextCompletion for OfflineCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Offline)
    }
}

fn non_empty(result: Result<String, CompletionError>) -> Option<String> {
    match result {
        Ok(text) if text.trim().is_empty() => {
            debug!("completion returned no text");
            None
        }
        Ok(text) => Some(text),
        Err(err) => {
            warn!("completion failed, using fallback: {err}");
            None
        }
    }
}

/// Run one completion, collapsing errors, empty text, and timeouts to `None`.
#[cfg(feature = "async")]
pub async fn complete_with_timeout<C>(service: &C, prompt: &str, limit: Duration) -> Option<String>
where
    C: TextCompletion + ?Sized,
{
    match tokio::time::timeout(limit, service.complete(prompt)).await {
        Ok(result) => non_empty(result),
        Err(_) => non_empty(Err(CompletionError::Timeout(limit))),
    }
}

/// Run one completion without a deadline; the backend owns its own timeout.
#[cfg(not(feature = "async"))]
pub async fn complete_with_timeout<C>(service: &C, prompt: &str, _limit: Duration) -> Option<String>
where
    C: TextCompletion + ?Sized,
{
    non_empty(service.complete(prompt).await)
}

/// User actions that each hold at most one live request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Reading,
    Spread,
    Affirmation,
    Chat,
}

impl ActionKind {
    const fn slot(self) -> usize {
        match self {
            Self::Reading => 0,
            Self::Spread => 1,
            Self::Affirmation => 2,
            Self::Chat => 3,
        }
    }
}

/// Where an action is in its request cycle.
///
/// `Idle -> Requesting -> Normalizing -> Done`, or
/// `Requesting -> Failed -> Normalizing (fallback only) -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ReadingPhase {
    #[default]
    Idle,
    Requesting,
    Failed,
    Normalizing { fallback_only: bool },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Start,
    Responded,
    NoContent,
    Fallback,
    Finished,
}

impl ReadingPhase {
    /// Next phase for `event`, or `None` if the event makes no sense here.
    /// A new start is allowed from any phase and supersedes the old request.
    #[must_use]
    pub const fn advance(self, event: PhaseEvent) -> Option<Self> {
        match (self, event) {
            (_, PhaseEvent::Start) => Some(Self::Requesting),
            (Self::Requesting, PhaseEvent::Responded) => {
                Some(Self::Normalizing { fallback_only: false })
            }
            (Self::Requesting, PhaseEvent::NoContent) => Some(Self::Failed),
            (Self::Failed, PhaseEvent::Fallback) => Some(Self::Normalizing { fallback_only: true }),
            (Self::Normalizing { .. }, PhaseEvent::Finished) => Some(Self::Done),
            _ => None,
        }
    }
}

/// Identifies one request. Only the newest ticket per action is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestTicket {
    pub action: ActionKind,
    pub seq: u64,
}

/// What to normalize once a current request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub text: Option<String>,
    pub fallback_only: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    seq: u64,
    phase: ReadingPhase,
}

/// Issues monotonic tickets per action and discards stale responses.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    next_seq: u64,
    slots: [Slot; 4],
}

impl RequestTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `action`, superseding any in flight.
    pub fn begin(&mut self, action: ActionKind) -> RequestTicket {
        self.next_seq += 1;
        let slot = &mut self.slots[action.slot()];
        slot.seq = self.next_seq;
        slot.phase = ReadingPhase::Requesting;
        RequestTicket {
            action,
            seq: self.next_seq,
        }
    }

    #[must_use]
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.slots[ticket.action.slot()].seq == ticket.seq
    }

    #[must_use]
    pub fn phase(&self, action: ActionKind) -> ReadingPhase {
        self.slots[action.slot()].phase
    }

    fn step(&mut self, action: ActionKind, event: PhaseEvent) {
        let slot = &mut self.slots[action.slot()];
        if let Some(next) = slot.phase.advance(event) {
            slot.phase = next;
        }
    }

    /// Record the response for `ticket`. Returns `None` when a newer request
    /// has replaced it; the response is then dropped.
    pub fn settle(&mut self, ticket: RequestTicket, text: Option<String>) -> Option<Settled> {
        if !self.is_current(ticket) {
            debug!("dropping stale {:?} response #{}", ticket.action, ticket.seq);
            return None;
        }
        let fallback_only = text.is_none();
        if fallback_only {
            self.step(ticket.action, PhaseEvent::NoContent);
            self.step(ticket.action, PhaseEvent::Fallback);
        } else {
            self.step(ticket.action, PhaseEvent::Responded);
        }
        Some(Settled {
            text,
            fallback_only,
        })
    }

    /// Mark a current request as rendered.
    pub fn finish(&mut self, ticket: RequestTicket) {
        if self.is_current(ticket) {
            self.step(ticket.action, PhaseEvent::Finished);
        }
    }
}
