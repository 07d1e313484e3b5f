// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! A session owns exactly one page for the duration of a task.
//!
//! Drive the page through [`Session::page_mut`], then pass the task's
//! result to [`Session::finish`]: it writes a diagnostic screenshot when
//! the task failed and closes the page on every path.

use crate::events::{EventBus, RunEvent};
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use pagewright::PageContext;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

/// One page plus the bookkeeping needed to release it.
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    page: Box<dyn PageContext>,
    bus: EventBus,
    diagnostics_dir: PathBuf,
    created_at: Instant,
}

impl Session {
    /// Open a page from `renderer`.
    ///
    /// Failing to obtain a page is a fatal-environment error for the run.
    pub async fn open(
        renderer: &dyn Renderer,
        bus: EventBus,
        diagnostics_dir: &Path,
    ) -> Result<Self> {
        let page = renderer
            .new_context()
            .await
            .with_context(|| format!("no page session available from {}", renderer.backend()))?;
        let session = Self::new(page, bus, diagnostics_dir);
        session.bus.emit(RunEvent::SessionOpened {
            session_id: session.id.clone(),
            backend: renderer.backend().to_string(),
        });
        Ok(session)
    }

    /// Wrap an already-open page.
    pub fn new(page: Box<dyn PageContext>, bus: EventBus, diagnostics_dir: &Path) -> Self {
        Self {
            id: format!("sess-{}", uuid::Uuid::new_v4().simple()),
            page,
            bus,
            diagnostics_dir: diagnostics_dir.to_path_buf(),
            created_at: Instant::now(),
        }
    }

    pub fn page_mut(&mut self) -> &mut dyn PageContext {
        self.page.as_mut()
    }

    /// Close the page after a task and hand its result back unchanged.
    ///
    /// On error a screenshot is written to the diagnostics directory before
    /// the page is closed.
    pub async fn finish<T>(self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!(session = %self.id, error = %e, "session task failed");
            self.capture_diagnostic().await;
        }
        self.close(result.is_ok()).await;
        result
    }

    /// Save a screenshot; never fails the caller.
    pub async fn capture_diagnostic(&self) -> Option<PathBuf> {
        let png = match self.page.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "diagnostic screenshot failed");
                return None;
            }
        };
        let name = format!(
            "{}-{}.png",
            self.id,
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f")
        );
        let path = self.diagnostics_dir.join(name);
        let written = std::fs::create_dir_all(&self.diagnostics_dir)
            .and_then(|_| std::fs::write(&path, &png));
        match written {
            Ok(()) => {
                tracing::info!(
                    session = %self.id,
                    path = %path.display(),
                    "diagnostic screenshot saved"
                );
                self.bus.emit(RunEvent::DiagnosticCaptured {
                    session_id: self.id.clone(),
                    path: path.display().to_string(),
                });
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.id,
                    error = %e,
                    "could not write diagnostic screenshot"
                );
                None
            }
        }
    }

    /// Close the page and report how the session ended.
    pub async fn close(self, success: bool) {
        let elapsed_ms = self.created_at.elapsed().as_millis() as u64;
        if let Err(e) = self.page.close().await {
            tracing::warn!(session = %self.id, error = %e, "page close failed");
        }
        self.bus.emit(RunEvent::SessionClosed {
            session_id: self.id,
            success,
            elapsed_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NoopRenderer;
    use pagewright::testing::{PageCall, ScriptedPage};

    #[tokio::test]
    async fn test_success_closes_without_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let page = ScriptedPage::new().with_html("<p>hi</p>");
        let log = page.log();
        let mut session = Session::new(Box::new(page), EventBus::default(), dir.path());

        let html = session.page_mut().html().await.map_err(anyhow::Error::from);
        let html = session.finish(html).await.unwrap();

        assert_eq!(html, "<p>hi</p>");
        assert!(log.contains(&PageCall::Close));
        assert!(!log.contains(&PageCall::Screenshot));
    }

    #[tokio::test]
    async fn test_failure_captures_screenshot_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let page = ScriptedPage::new();
        let log = page.log();
        let session = Session::new(Box::new(page), bus, dir.path());

        let err = session
            .finish(Err::<(), _>(anyhow::anyhow!("step failed")))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "step failed");
        assert!(log.contains(&PageCall::Screenshot));
        assert!(log.contains(&PageCall::Close));
        let shots: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(shots.len(), 1);

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["diagnostic_captured", "session_closed"]);
    }

    #[tokio::test]
    async fn test_screenshot_failure_still_closes() {
        let dir = tempfile::tempdir().unwrap();
        let page = ScriptedPage::new().failing_screenshot();
        let log = page.log();
        let session = Session::new(Box::new(page), EventBus::default(), dir.path());

        let result = session
            .finish(Err::<(), _>(anyhow::anyhow!("boom")))
            .await;

        assert!(result.is_err());
        assert!(log.contains(&PageCall::Close));
    }

    #[tokio::test]
    async fn test_open_without_browser_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::open(&NoopRenderer, EventBus::default(), dir.path())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no page session available"));
    }
}
