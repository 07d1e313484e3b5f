// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-step page flows built on the interactor.

pub mod extract;
pub mod login;

use crate::captcha::CaptchaSolver;
use crate::config::RunConfig;
use crate::events::{EventBus, RunEvent};
use anyhow::{Context, Result};
use pagewright::{InteractionRequest, Interactor, NavigationResult, PageContext};
use std::sync::Arc;
use std::time::Duration;

pub use extract::extract_phone;
pub use login::{LoginCredentials, LoginFlow, LoginReport, LoginStep};

/// Shared dependencies of every flow.
#[derive(Clone)]
pub struct FlowContext<'a> {
    pub interactor: Interactor,
    pub selector_timeout: Duration,
    pub settle: Duration,
    pub navigation_timeout: Duration,
    pub solver: Option<&'a dyn CaptchaSolver>,
    pub bus: &'a EventBus,
}

impl<'a> FlowContext<'a> {
    /// Build from configuration; interactor events go to `bus`.
    pub fn from_config(config: &RunConfig, bus: &'a EventBus) -> Self {
        Self {
            interactor: config
                .interaction
                .interactor()
                .with_observer(Arc::new(bus.clone())),
            selector_timeout: config.interaction.selector_timeout(),
            settle: config.interaction.settle(),
            navigation_timeout: config.browser.navigation_timeout(),
            solver: None,
            bus,
        }
    }

    pub fn with_solver(mut self, solver: &'a dyn CaptchaSolver) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Apply this context's timeout and settle delay to `request`.
    pub fn request(&self, request: InteractionRequest) -> InteractionRequest {
        request
            .with_timeout(self.selector_timeout)
            .with_settle(self.settle)
    }

    /// Navigate and emit a `Navigated` event.
    pub async fn navigate(
        &self,
        page: &mut dyn PageContext,
        url: &str,
    ) -> Result<NavigationResult> {
        let nav = page
            .navigate(url, self.navigation_timeout)
            .await
            .with_context(|| format!("failed to load {url}"))?;
        tracing::info!(url, final_url = %nav.final_url, load_ms = nav.load_time_ms, "page loaded");
        self.bus.emit(RunEvent::Navigated {
            url: url.to_string(),
            final_url: nav.final_url.clone(),
            elapsed_ms: nav.load_time_ms,
        });
        Ok(nav)
    }
}
