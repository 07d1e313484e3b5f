// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pagewright event bus: typed run events from every component.
//!
//! The EventBus is a `tokio::sync::broadcast` channel carrying
//! [`RunEvent`] values. Control flow only emits; consumers such as the
//! JSONL audit log subscribe independently. With no subscribers, events
//! are dropped.

use pagewright::{
    AttemptResult, InteractionObserver, InteractionOutcome, InteractionRequest, SelectorAttempt,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every event Pagewright emits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    // ── Session Events ────────────────────
    /// A page session was opened.
    SessionOpened { session_id: String, backend: String },
    /// A page session was released.
    SessionClosed {
        session_id: String,
        success: bool,
        elapsed_ms: u64,
    },
    /// A diagnostic screenshot was captured after a failure.
    DiagnosticCaptured { session_id: String, path: String },
    /// Navigation finished.
    Navigated {
        url: String,
        final_url: String,
        elapsed_ms: u64,
    },

    // ── Interaction Events ────────────────
    /// One selector was tried.
    SelectorAttempt {
        action: String,
        selector: String,
        index: usize,
        status: String,
        reason: Option<String>,
        elapsed_ms: u64,
    },
    /// An interaction finished, successfully or not.
    InteractionComplete {
        action: String,
        succeeded: bool,
        matched_selector: Option<String>,
        attempts: usize,
        elapsed_ms: u64,
    },

    // ── Extraction Events ─────────────────
    /// A field extraction finished.
    FieldExtracted {
        field: String,
        url: String,
        value: Option<String>,
        method: Option<String>,
        failure: Option<String>,
    },

    // ── CAPTCHA Events ────────────────────
    /// A CAPTCHA solve was attempted.
    CaptchaAttempt {
        kind: String,
        solved: bool,
        error: Option<String>,
        elapsed_ms: u64,
    },

    // ── Messaging Events ──────────────────
    /// A message delivery finished (after retries).
    DeliveryComplete {
        to: String,
        success: bool,
        attempts: u32,
        message_id: Option<String>,
        error: Option<String>,
    },
    /// Running tally during a batch.
    BatchProgress {
        processed: usize,
        sent: usize,
        failed: usize,
        invalid: usize,
    },
    /// A batch finished.
    BatchComplete {
        total: usize,
        sent: usize,
        failed: usize,
        invalid: usize,
        elapsed_ms: u64,
    },
}

impl RunEvent {
    /// Short name of the variant, used as the audit `method` column.
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::SessionOpened { .. } => "session_opened",
            RunEvent::SessionClosed { .. } => "session_closed",
            RunEvent::DiagnosticCaptured { .. } => "diagnostic_captured",
            RunEvent::Navigated { .. } => "navigated",
            RunEvent::SelectorAttempt { .. } => "selector_attempt",
            RunEvent::InteractionComplete { .. } => "interaction_complete",
            RunEvent::FieldExtracted { .. } => "field_extracted",
            RunEvent::CaptchaAttempt { .. } => "captcha_attempt",
            RunEvent::DeliveryComplete { .. } => "delivery_complete",
            RunEvent::BatchProgress { .. } => "batch_progress",
            RunEvent::BatchComplete { .. } => "batch_complete",
        }
    }
}

/// The central event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl InteractionObserver for EventBus {
    fn on_attempt(&self, request: &InteractionRequest, attempt: &SelectorAttempt) {
        let (status, reason) = match &attempt.result {
            AttemptResult::Succeeded => ("succeeded", None),
            AttemptResult::NotFound => ("not_found", None),
            AttemptResult::Failed { reason } => ("failed", Some(reason.clone())),
        };
        self.emit(RunEvent::SelectorAttempt {
            action: request.action.to_string(),
            selector: attempt.selector.clone(),
            index: attempt.index,
            status: status.to_string(),
            reason,
            elapsed_ms: attempt.elapsed.as_millis() as u64,
        });
    }

    fn on_outcome(&self, request: &InteractionRequest, outcome: &InteractionOutcome) {
        self.emit(RunEvent::InteractionComplete {
            action: request.action.to_string(),
            succeeded: outcome.succeeded,
            matched_selector: outcome.matched_selector.clone(),
            attempts: outcome.attempts.len(),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        });
    }
}
