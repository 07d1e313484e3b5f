//! In-memory [`PageContext`] for tests.
//!
//! `ScriptedPage` answers selector lookups from a fixed element table and
//! records every call so tests can assert on attempt order. Waits for
//! missing elements sleep for the full budget, so tests should run with
//! paused tokio time.

use crate::error::PageError;
use crate::page::{PageContext, PageResult};
use crate::types::{Cookie, NavigationResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call observed by a [`ScriptedPage`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Navigate(String),
    Wait(String),
    Click(String),
    Focus(String),
    Insert(String, String),
    Js(String),
    Screenshot,
    SetCookies(usize),
    Close,
}

/// Shared handle on the call log; survives `close(self: Box<Self>)`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<PageCall>>>);

impl CallLog {
    fn push(&self, call: PageCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn snapshot(&self) -> Vec<PageCall> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Selectors passed to `wait_for_element`, in call order.
    pub fn waited(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Wait(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text inserted into `selector`.
    pub fn typed_into(&self, selector: &str) -> String {
        self.snapshot()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::Insert(s, text) if s == selector => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, call: &PageCall) -> bool {
        self.snapshot().iter().any(|c| c == call)
    }
}

#[derive(Debug, Clone)]
struct ScriptedElement {
    visible: bool,
    appears_after: Duration,
    click_error: Option<String>,
}

/// Scripted page double.
#[derive(Debug, Default)]
pub struct ScriptedPage {
    elements: HashMap<String, ScriptedElement>,
    documents: HashMap<String, String>,
    html: String,
    url: String,
    cookies: Vec<Cookie>,
    js_results: VecDeque<serde_json::Value>,
    navigation_error: Option<String>,
    screenshot_error: bool,
    log: CallLog,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            ..Default::default()
        }
    }

    /// Register a visible element that is present immediately.
    pub fn with_element(mut self, selector: &str) -> Self {
        self.elements.insert(
            selector.to_string(),
            ScriptedElement {
                visible: true,
                appears_after: Duration::ZERO,
                click_error: None,
            },
        );
        self
    }

    /// Register an element present in the DOM but not visible.
    pub fn with_hidden_element(mut self, selector: &str) -> Self {
        self.elements.insert(
            selector.to_string(),
            ScriptedElement {
                visible: false,
                appears_after: Duration::ZERO,
                click_error: None,
            },
        );
        self
    }

    /// Register an element that only renders after `delay`.
    pub fn with_delayed_element(mut self, selector: &str, delay: Duration) -> Self {
        self.elements.insert(
            selector.to_string(),
            ScriptedElement {
                visible: true,
                appears_after: delay,
                click_error: None,
            },
        );
        self
    }

    /// Register an element whose click raises an error.
    pub fn with_broken_element(mut self, selector: &str, message: &str) -> Self {
        self.elements.insert(
            selector.to_string(),
            ScriptedElement {
                visible: true,
                appears_after: Duration::ZERO,
                click_error: Some(message.to_string()),
            },
        );
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    /// Document served after navigating to `url`.
    pub fn with_document(mut self, url: &str, html: &str) -> Self {
        self.documents.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Queue a result for the next `execute_js` call.
    pub fn with_js_result(mut self, value: serde_json::Value) -> Self {
        self.js_results.push_back(value);
        self
    }

    pub fn failing_navigation(mut self, message: &str) -> Self {
        self.navigation_error = Some(message.to_string());
        self
    }

    pub fn failing_screenshot(mut self) -> Self {
        self.screenshot_error = true;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl PageContext for ScriptedPage {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> PageResult<NavigationResult> {
        self.log.push(PageCall::Navigate(url.to_string()));
        if let Some(message) = &self.navigation_error {
            return Err(PageError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            });
        }
        self.url = url.to_string();
        if let Some(doc) = self.documents.get(url) {
            self.html = doc.clone();
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 0,
        })
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        require_visible: bool,
        timeout: Duration,
    ) -> PageResult<bool> {
        self.log.push(PageCall::Wait(selector.to_string()));
        match self.elements.get(selector) {
            Some(el) if (el.visible || !require_visible) && el.appears_after <= timeout => {
                tokio::time::sleep(el.appears_after).await;
                Ok(true)
            }
            _ => {
                tokio::time::sleep(timeout).await;
                Ok(false)
            }
        }
    }

    async fn click(&mut self, selector: &str) -> PageResult<()> {
        self.log.push(PageCall::Click(selector.to_string()));
        match self.elements.get(selector) {
            Some(ScriptedElement {
                click_error: Some(message),
                ..
            }) => Err(PageError::Element {
                selector: selector.to_string(),
                message: message.clone(),
            }),
            Some(_) => Ok(()),
            None => Err(PageError::Element {
                selector: selector.to_string(),
                message: "no such element".to_string(),
            }),
        }
    }

    async fn focus(&mut self, selector: &str) -> PageResult<()> {
        self.log.push(PageCall::Focus(selector.to_string()));
        if self.elements.contains_key(selector) {
            Ok(())
        } else {
            Err(PageError::Element {
                selector: selector.to_string(),
                message: "no such element".to_string(),
            })
        }
    }

    async fn insert_text(&mut self, selector: &str, text: &str) -> PageResult<()> {
        self.log
            .push(PageCall::Insert(selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn execute_js(&mut self, script: &str) -> PageResult<serde_json::Value> {
        self.log.push(PageCall::Js(script.to_string()));
        Ok(self.js_results.pop_front().unwrap_or(serde_json::Value::Null))
    }

    async fn html(&self) -> PageResult<String> {
        Ok(self.html.clone())
    }

    async fn url(&self) -> PageResult<String> {
        Ok(self.url.clone())
    }

    async fn screenshot(&self) -> PageResult<Vec<u8>> {
        self.log.push(PageCall::Screenshot);
        if self.screenshot_error {
            return Err(PageError::Session("screenshot unavailable".to_string()));
        }
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn cookies(&self) -> PageResult<Vec<Cookie>> {
        Ok(self.cookies.clone())
    }

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> PageResult<()> {
        self.log.push(PageCall::SetCookies(cookies.len()));
        self.cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn close(self: Box<Self>) -> PageResult<()> {
        self.log.push(PageCall::Close);
        Ok(())
    }
}
