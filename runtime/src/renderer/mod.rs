// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser sessions.
//!
//! A `Renderer` hands out [`PageContext`]s. The Chromium implementation
//! either launches a local browser or attaches to a remote CDP endpoint
//! (a hosted headless-browser service).

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use pagewright::PageContext;

/// A browser engine that can create page contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new page (tab).
    async fn new_context(&self) -> Result<Box<dyn PageContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open pages.
    fn active_contexts(&self) -> usize;
    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;
}

/// A renderer whose `new_context` always fails.
#[cfg(test)]
pub struct NoopRenderer;

#[cfg(test)]
#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn PageContext>> {
        Err(anyhow::anyhow!("browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
    fn backend(&self) -> &'static str {
        "none"
    }
}
