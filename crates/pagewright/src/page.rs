//! Page abstraction consumed by the interactor and the extraction layer.
//!
//! A `PageContext` is one browser tab. Mutating methods take `&mut self`:
//! a page is driven by exactly one task at a time, and the borrow checker
//! enforces it.

use crate::error::PageError;
use crate::types::{Cookie, NavigationResult};
use async_trait::async_trait;
use std::time::Duration;

pub type PageResult<T> = std::result::Result<T, PageError>;

/// A single browser page driven through a headless-browser session.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Navigate to a URL and wait for the load, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> PageResult<NavigationResult>;

    /// Wait until `selector` matches an element (and it is visible when
    /// `require_visible`). Returns `Ok(false)` when the budget elapses.
    async fn wait_for_element(
        &mut self,
        selector: &str,
        require_visible: bool,
        timeout: Duration,
    ) -> PageResult<bool>;

    /// Pointer-activate the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> PageResult<()>;

    /// Give keyboard focus to the first element matching `selector`.
    async fn focus(&mut self, selector: &str) -> PageResult<()>;

    /// Send `text` as key input to the element matching `selector`.
    async fn insert_text(&mut self, selector: &str, text: &str) -> PageResult<()>;

    /// Evaluate JavaScript in the page and return its JSON result.
    async fn execute_js(&mut self, script: &str) -> PageResult<serde_json::Value>;

    /// Full serialized HTML of the current document.
    async fn html(&self) -> PageResult<String>;

    async fn url(&self) -> PageResult<String>;

    /// PNG screenshot of the viewport.
    async fn screenshot(&self) -> PageResult<Vec<u8>>;

    async fn cookies(&self) -> PageResult<Vec<Cookie>>;

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> PageResult<()>;

    /// Close the page and release its browser resources.
    async fn close(self: Box<Self>) -> PageResult<()>;
}

/// Escape a string for safe injection into a single-quoted JavaScript
/// string literal.
///
/// Escapes backslashes, quotes, backticks and line breaks, strips null
/// bytes, and hex-encodes angle brackets so a value can never close a
/// surrounding `<script>` element.
pub fn escape_js_str(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

/// Script that reports whether `selector` is present and visible.
///
/// Evaluates to `{ present: bool, visible: bool }`. An invalid selector
/// reports `present: false` instead of throwing.
pub fn element_state_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            let el;
            try {{ el = document.querySelector('{}'); }} catch (_) {{ return {{ present: false, visible: false }}; }}
            if (!el) return {{ present: false, visible: false }};
            const style = window.getComputedStyle(el);
            const rect = el.getBoundingClientRect();
            const visible = style.display !== 'none'
                && style.visibility !== 'hidden'
                && parseFloat(style.opacity || '1') > 0
                && rect.width > 0 && rect.height > 0;
            return {{ present: true, visible }};
        }})()"#,
        escape_js_str(selector)
    )
}
