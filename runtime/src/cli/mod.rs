// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `pagewright` binary.

pub mod batch_cmd;
pub mod cookies_cmd;
pub mod db_cmd;
pub mod extract_cmd;
pub mod interact_cmd;
pub mod login_cmd;
pub mod output;

use crate::audit::{spawn_audit_writer, AuditLogger};
use crate::config::RunConfig;
use crate::events::EventBus;
use crate::flows::FlowContext;
use crate::live::Session;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Per-invocation state shared by every command.
pub struct App {
    pub config: RunConfig,
    pub bus: EventBus,
    pub run_id: String,
    pub json: bool,
    audit: Option<JoinHandle<()>>,
}

impl App {
    /// Build the event bus and attach the audit writer when enabled.
    pub fn start(config: RunConfig, json: bool) -> Result<Self> {
        let bus = EventBus::default();
        let run_id = uuid::Uuid::new_v4().to_string();
        let audit = match &config.audit_path {
            Some(path) => {
                let logger = AuditLogger::open(path, &run_id)?;
                Some(spawn_audit_writer(&bus, logger))
            }
            None => None,
        };
        tracing::debug!(run_id = %run_id, audit = audit.is_some(), "run started");
        Ok(Self {
            config,
            bus,
            run_id,
            json,
            audit,
        })
    }

    /// Launch or attach to the configured browser.
    pub async fn renderer(&self) -> Result<ChromiumRenderer> {
        ChromiumRenderer::start(&self.config.browser)
            .await
            .context("browser unavailable")
    }

    /// Shut the browser down once a command is done with it. Failures are
    /// logged; they never change the command's result.
    pub async fn release(&self, renderer: &dyn Renderer) {
        let open = renderer.active_contexts();
        if open > 0 {
            tracing::warn!(open, "pages still open at shutdown");
        }
        if let Err(e) = renderer.shutdown().await {
            tracing::warn!(backend = renderer.backend(), error = %e, "browser shutdown failed");
        }
    }

    pub async fn session(&self, renderer: &dyn Renderer) -> Result<Session> {
        Session::open(renderer, self.bus.clone(), &self.config.diagnostics_dir).await
    }

    pub fn flow_context(&self) -> FlowContext<'_> {
        FlowContext::from_config(&self.config, &self.bus)
    }

    /// Flush the audit log. Waits briefly for queued events.
    pub async fn finish(self) {
        let Self { bus, audit, .. } = self;
        drop(bus);
        if let Some(handle) = audit {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                tracing::warn!("audit writer did not drain in time");
            }
        }
    }
}
