//! Core of the upload-and-analyze workflow: the selection and submission
//! controllers plus the HTTP boundary client. Everything visual stays in
//! the embedding application; everything that decides lives here.

use std::sync::Arc;

use shared::{domain, error::AnalysisFailure, protocol::AnalyzeResponse};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod boundary;
pub mod preview;
pub mod selection;

pub use boundary::{
    AnalysisBoundary, AnalyzeRequest, HttpAnalysisBoundary, MissingAnalysisBoundary,
};
pub use preview::{HandleId, PreviewHandle, PreviewRegistry};
pub use selection::{
    CandidateFile, ImagePayload, SelectedImage, SelectionController, SelectionRejection,
};

/// Lifecycle of the current submission. Exactly one variant holds at any
/// time; entering `Submitting` discards the previous terminal payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    Submitting,
    Succeeded(AnalyzeResponse),
    Failed(AnalysisFailure),
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Submitting => "submitting",
            RequestState::Succeeded(_) => "succeeded",
            RequestState::Failed(_) => "failed",
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, RequestState::Submitting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Succeeded(_) | RequestState::Failed(_))
    }
}

/// What became of a submit action. Anything but `Accepted` means no state
/// transition happened and no request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitDisposition {
    Accepted,
    AlreadyInFlight,
    NoImageSelected,
    IneligiblePrompt,
}

/// Notify-on-change contract for state consumers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StateChanged(RequestState),
}

struct SubmissionInner {
    request_state: RequestState,
    /// Sequence of the most recently issued request. Outcomes tagged with
    /// an older sequence are discarded, never applied.
    latest_seq: u64,
}

/// Gates and executes the single outbound analysis request.
///
/// At most one request is in flight per controller; a submit during
/// `Submitting` is a no-op. Consumers observe transitions through
/// [`SubmissionController::subscribe_events`] or poll
/// [`SubmissionController::state`].
pub struct SubmissionController {
    boundary: Arc<dyn AnalysisBoundary>,
    selection: Arc<SelectionController>,
    max_new_tokens: Option<u32>,
    inner: Mutex<SubmissionInner>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl SubmissionController {
    pub fn new(
        boundary: Arc<dyn AnalysisBoundary>,
        selection: Arc<SelectionController>,
    ) -> Arc<Self> {
        Self::with_max_new_tokens(boundary, selection, None)
    }

    pub fn with_max_new_tokens(
        boundary: Arc<dyn AnalysisBoundary>,
        selection: Arc<SelectionController>,
        max_new_tokens: Option<u32>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            boundary,
            selection,
            max_new_tokens,
            inner: Mutex::new(SubmissionInner {
                request_state: RequestState::Idle,
                latest_seq: 0,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> RequestState {
        self.inner.lock().await.request_state.clone()
    }

    /// The predicate behind the submit affordance. Must agree with
    /// [`SubmissionController::submit`]: whenever this is false, submit is
    /// a no-op.
    pub async fn can_submit(&self, prompt: &str) -> bool {
        domain::prompt_within_bounds(prompt)
            && self.selection.snapshot().is_some()
            && !self.inner.lock().await.request_state.is_submitting()
    }

    /// Issues the analysis request for the current selection and prompt.
    ///
    /// Returns without transitioning when the precondition is unmet or a
    /// request is already outstanding. On acceptance the state moves to
    /// `Submitting` immediately and the request runs on a spawned task;
    /// the caller is never blocked on the boundary.
    pub async fn submit(self: &Arc<Self>, prompt: &str) -> SubmitDisposition {
        if !domain::prompt_within_bounds(prompt) {
            return SubmitDisposition::IneligiblePrompt;
        }
        let Some(payload) = self.selection.snapshot() else {
            return SubmitDisposition::NoImageSelected;
        };

        let seq = {
            let mut inner = self.inner.lock().await;
            if inner.request_state.is_submitting() {
                return SubmitDisposition::AlreadyInFlight;
            }
            inner.latest_seq += 1;
            inner.request_state = RequestState::Submitting;
            inner.latest_seq
        };
        let _ = self
            .events
            .send(WorkflowEvent::StateChanged(RequestState::Submitting));
        info!(
            seq,
            filename = %payload.filename,
            size = payload.byte_size(),
            "analysis: request submitted"
        );

        let request = AnalyzeRequest {
            filename: payload.filename,
            media_type: payload.media_type,
            bytes: payload.bytes,
            prompt: prompt.to_string(),
            max_new_tokens: self.max_new_tokens,
        };
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = controller.boundary.analyze(request).await;
            controller.apply_outcome(seq, outcome).await;
        });

        SubmitDisposition::Accepted
    }

    async fn apply_outcome(
        &self,
        seq: u64,
        outcome: Result<AnalyzeResponse, AnalysisFailure>,
    ) {
        let next = {
            let mut inner = self.inner.lock().await;
            if seq != inner.latest_seq {
                warn!(
                    seq,
                    latest_seq = inner.latest_seq,
                    "analysis: discarding superseded response"
                );
                return;
            }
            inner.request_state = match outcome {
                Ok(response) => {
                    info!(seq, "analysis: request succeeded");
                    RequestState::Succeeded(response)
                }
                Err(failure) => {
                    warn!(seq, kind = ?failure.kind, message = %failure.message, "analysis: request failed");
                    RequestState::Failed(failure)
                }
            };
            inner.request_state.clone()
        };
        let _ = self.events.send(WorkflowEvent::StateChanged(next));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
