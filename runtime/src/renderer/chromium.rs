// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::Renderer;
use crate::config::BrowserConfig as BrowserSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use pagewright::page::element_state_script;
use pagewright::{Cookie, NavigationResult, PageContext, PageError, PageResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// How often the element state script is re-evaluated while waiting.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // 2. ~/.pagewright/chromium/
    let home = crate::config::pagewright_home();
    let candidates = if cfg!(target_os = "macos") {
        vec![
            home.join("chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            home.join("chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            home.join("chromium/chrome"),
        ]
    } else {
        vec![
            home.join("chromium/chrome-linux64/chrome"),
            home.join("chromium/chrome"),
        ]
    };
    for c in candidates {
        if c.exists() {
            return Some(c);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer, local or remote.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    active_count: Arc<AtomicUsize>,
    remote: bool,
}

impl ChromiumRenderer {
    /// Launch a local browser, or attach to `ws_endpoint` when configured.
    pub async fn start(settings: &BrowserSettings) -> Result<Self> {
        match &settings.ws_endpoint {
            Some(endpoint) => Self::connect(endpoint).await,
            None => Self::launch(settings).await,
        }
    }

    /// Launch a local Chromium instance.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let chrome_path = find_chromium(settings.chromium_path.as_ref())
            .context("Chromium not found. Set PAGEWRIGHT_CHROMIUM_PATH or install Chrome.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled");
        builder = if settings.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;
        spawn_handler(handler);

        tracing::info!(headless = settings.headless, "launched local Chromium");
        Ok(Self {
            browser: Mutex::new(browser),
            active_count: Arc::new(AtomicUsize::new(0)),
            remote: false,
        })
    }

    /// Attach to a remote browser over its CDP websocket.
    pub async fn connect(ws_endpoint: &str) -> Result<Self> {
        let (browser, handler) = Browser::connect(ws_endpoint.to_string())
            .await
            .context("failed to connect to remote browser")?;
        spawn_handler(handler);

        tracing::info!("connected to remote browser");
        Ok(Self {
            browser: Mutex::new(browser),
            active_count: Arc::new(AtomicUsize::new(0)),
            remote: true,
        })
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!(error = %e, "CDP handler event error");
            }
        }
    });
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn PageContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumPage {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    /// Close a launched browser and reap its process. A remote browser is
    /// only detached from; its owner decides when it ends.
    async fn shutdown(&self) -> Result<()> {
        if self.remote {
            tracing::debug!("detaching from remote browser");
            return Ok(());
        }
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close Chromium")?;
        browser
            .wait()
            .await
            .context("failed to wait for Chromium to exit")?;
        tracing::debug!("local Chromium closed");
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    fn backend(&self) -> &'static str {
        if self.remote {
            "chromium-remote"
        } else {
            "chromium"
        }
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

fn element_error(selector: &str, e: impl std::fmt::Display) -> PageError {
    PageError::Element {
        selector: selector.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl PageContext for ChromiumPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> PageResult<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;
        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                let final_url = self
                    .page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => Err(PageError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(PageError::Timeout(timeout)),
        }
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        require_visible: bool,
        timeout: Duration,
    ) -> PageResult<bool> {
        let deadline = Instant::now() + timeout;
        let script = element_state_script(selector);
        loop {
            let state = self
                .page
                .evaluate(script.as_str())
                .await
                .map_err(|e| PageError::Script(e.to_string()))?;
            let value = state.value().cloned().unwrap_or_default();
            let present = value["present"].as_bool().unwrap_or(false);
            let visible = value["visible"].as_bool().unwrap_or(false);
            if present && (visible || !require_visible) {
                return Ok(true);
            }
            if Instant::now() + PROBE_INTERVAL > deadline {
                return Ok(false);
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    async fn click(&mut self, selector: &str) -> PageResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| element_error(selector, e))?;
        element
            .click()
            .await
            .map_err(|e| element_error(selector, e))?;
        Ok(())
    }

    async fn focus(&mut self, selector: &str) -> PageResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| element_error(selector, e))?;
        element
            .focus()
            .await
            .map_err(|e| element_error(selector, e))?;
        Ok(())
    }

    async fn insert_text(&mut self, selector: &str, text: &str) -> PageResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| element_error(selector, e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| element_error(selector, e))?;
        Ok(())
    }

    async fn execute_js(&mut self, script: &str) -> PageResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| PageError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or_default())
    }

    async fn html(&self) -> PageResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| PageError::Script(e.to_string()))
    }

    async fn url(&self) -> PageResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| PageError::Script(e.to_string()))?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn screenshot(&self) -> PageResult<Vec<u8>> {
        self.page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| PageError::Session(e.to_string()))
    }

    async fn cookies(&self) -> PageResult<Vec<Cookie>> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| PageError::Session(e.to_string()))?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: if c.session { None } else { Some(c.expires) },
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect())
    }

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> PageResult<()> {
        let params = cookies
            .iter()
            .map(|c| {
                let mut builder = CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .secure(c.secure)
                    .http_only(c.http_only);
                if let Some(expires) = c.expires {
                    builder = builder.expires(TimeSinceEpoch::new(expires));
                }
                builder.build().map_err(PageError::Session)
            })
            .collect::<PageResult<Vec<_>>>()?;
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| PageError::Session(e.to_string()))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> PageResult<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_wait_click_and_type() {
        let renderer = ChromiumRenderer::launch(&BrowserSettings::default())
            .await
            .expect("failed to create renderer");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<input id='q'><button id='go' style='display:none'>Go</button>",
            Duration::from_secs(10),
        )
        .await
        .expect("navigation failed");

        assert!(ctx
            .wait_for_element("#q", true, Duration::from_secs(2))
            .await
            .unwrap());
        assert!(!ctx
            .wait_for_element("#go", true, Duration::from_millis(300))
            .await
            .unwrap());
        assert!(ctx
            .wait_for_element("#go", false, Duration::from_millis(300))
            .await
            .unwrap());

        ctx.focus("#q").await.unwrap();
        ctx.insert_text("#q", "hi").await.unwrap();
        let value = ctx
            .execute_js("document.querySelector('#q').value")
            .await
            .unwrap();
        assert_eq!(value.as_str(), Some("hi"));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }
}
