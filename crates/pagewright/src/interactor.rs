//! Selector-fallback interactor.
//!
//! Performs one logical UI action against a page that may render any one
//! of several DOM structures. Selectors are tried strictly in order; the
//! first that locates an element and completes the action wins and no
//! later selector is touched. Running out of selectors is a normal
//! outcome, reported in [`InteractionOutcome`], never an error.

use crate::error::{PageError, PagewrightError, Result};
use crate::page::{PageContext, PageResult};
use crate::types::{
    Action, AttemptResult, InteractionOutcome, InteractionRequest, SelectorAttempt,
};
use crate::typing::TypingCadence;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Receives a structured record of every attempt and outcome.
pub trait InteractionObserver: Send + Sync {
    fn on_attempt(&self, request: &InteractionRequest, attempt: &SelectorAttempt);
    fn on_outcome(&self, request: &InteractionRequest, outcome: &InteractionOutcome);
}

/// Executes [`InteractionRequest`]s against a page.
#[derive(Clone, Default)]
pub struct Interactor {
    cadence: TypingCadence,
    observer: Option<Arc<dyn InteractionObserver>>,
}

impl Interactor {
    pub fn new(cadence: TypingCadence) -> Self {
        Self {
            cadence,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn InteractionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cadence(&self) -> TypingCadence {
        self.cadence
    }

    /// Reject requests that can never be satisfied.
    pub fn validate(&self, request: &InteractionRequest) -> Result<()> {
        self.cadence.validate()?;
        if request.action == Action::Type
            && request.value.as_deref().map_or(true, str::is_empty)
        {
            return Err(PagewrightError::InvalidInput(
                "type action requires a non-empty value".to_string(),
            ));
        }
        if request.required && request.selectors.is_empty() {
            return Err(PagewrightError::InvalidInput(format!(
                "required {} step has no selectors",
                request.action
            )));
        }
        if request.timeout.is_zero() {
            return Err(PagewrightError::InvalidInput(
                "selector timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the request. Returns `Err` only for invalid input.
    pub async fn interact(
        &self,
        page: &mut dyn PageContext,
        request: &InteractionRequest,
    ) -> Result<InteractionOutcome> {
        self.validate(request)?;
        let start = Instant::now();
        let mut attempts = Vec::with_capacity(request.selectors.len());

        if request.selectors.is_empty() {
            tracing::debug!(action = %request.action, "no selectors to try");
        }

        for (index, selector) in request.selectors.iter().enumerate() {
            let attempt_start = Instant::now();
            let result = self.attempt(page, request, selector).await;
            let attempt = SelectorAttempt {
                index,
                selector: selector.to_string(),
                result,
                elapsed: attempt_start.elapsed(),
            };
            self.record_attempt(request, &attempt);

            let matched = attempt.result == AttemptResult::Succeeded;
            attempts.push(attempt);

            if matched {
                if !request.settle.is_zero() {
                    tokio::time::sleep(request.settle).await;
                }
                let outcome = InteractionOutcome {
                    succeeded: true,
                    matched_selector: Some(selector.to_string()),
                    elapsed: start.elapsed(),
                    attempts,
                };
                self.record_outcome(request, &outcome);
                return Ok(outcome);
            }
        }

        let outcome = InteractionOutcome::failed(start.elapsed(), attempts);
        self.record_outcome(request, &outcome);
        Ok(outcome)
    }

    async fn attempt(
        &self,
        page: &mut dyn PageContext,
        request: &InteractionRequest,
        selector: &str,
    ) -> AttemptResult {
        let located = tokio::time::timeout(
            request.timeout,
            page.wait_for_element(selector, request.require_visible, request.timeout),
        )
        .await;

        match located {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) | Err(_) => return AttemptResult::NotFound,
            Ok(Err(e)) => {
                return AttemptResult::Failed {
                    reason: e.to_string(),
                }
            }
        }

        match self.perform(page, request, selector).await {
            Ok(()) => AttemptResult::Succeeded,
            Err(e) => AttemptResult::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn perform(
        &self,
        page: &mut dyn PageContext,
        request: &InteractionRequest,
        selector: &str,
    ) -> PageResult<()> {
        match request.action {
            Action::WaitPresent => Ok(()),
            Action::Click => bounded(request.timeout, page.click(selector)).await,
            Action::Type => {
                let value = request.value.as_deref().unwrap_or_default();
                bounded(request.timeout, page.focus(selector)).await?;
                let plan = {
                    let mut rng = rand::thread_rng();
                    self.cadence.plan(value, &mut rng)
                };
                let mut buf = [0u8; 4];
                for (ch, delay) in plan {
                    page.insert_text(selector, ch.encode_utf8(&mut buf)).await?;
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
        }
    }

    fn record_attempt(&self, request: &InteractionRequest, attempt: &SelectorAttempt) {
        let elapsed_ms = attempt.elapsed.as_millis() as u64;
        match &attempt.result {
            AttemptResult::Succeeded => tracing::debug!(
                action = %request.action,
                selector = %attempt.selector,
                index = attempt.index,
                elapsed_ms,
                "selector matched"
            ),
            AttemptResult::NotFound => tracing::debug!(
                action = %request.action,
                selector = %attempt.selector,
                index = attempt.index,
                elapsed_ms,
                "selector not found"
            ),
            AttemptResult::Failed { reason } => tracing::warn!(
                action = %request.action,
                selector = %attempt.selector,
                index = attempt.index,
                elapsed_ms,
                reason = %reason,
                "selector attempt failed"
            ),
        }
        if let Some(observer) = &self.observer {
            observer.on_attempt(request, attempt);
        }
    }

    fn record_outcome(&self, request: &InteractionRequest, outcome: &InteractionOutcome) {
        if outcome.succeeded {
            tracing::info!(
                action = %request.action,
                selector = outcome.matched_selector.as_deref().unwrap_or_default(),
                attempts = outcome.attempts.len(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "interaction succeeded"
            );
        } else {
            tracing::info!(
                action = %request.action,
                candidates = request.selectors.len(),
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "interaction exhausted all selectors"
            );
        }
        if let Some(observer) = &self.observer {
            observer.on_outcome(request, outcome);
        }
    }
}

async fn bounded<F>(timeout: Duration, fut: F) -> PageResult<()>
where
    F: std::future::Future<Output = PageResult<()>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(PageError::Timeout(timeout)))
}
