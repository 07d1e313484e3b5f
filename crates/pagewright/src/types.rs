//! Core data types for interaction requests, outcomes, and browser state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-selector lookup budget.
pub const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Ordered candidate selectors. The first one that matches wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorList(Vec<String>);

impl SelectorList {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SelectorList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<&[&str]> for SelectorList {
    fn from(value: &[&str]) -> Self {
        Self::new(value.iter().copied())
    }
}

/// The UI action to perform once an element is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Pointer activation of the element.
    Click,
    /// Focus the element and type the request value character by character.
    Type,
    /// Only wait for the element to be present (and visible if required).
    WaitPresent,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Click => "click",
            Action::Type => "type",
            Action::WaitPresent => "wait_present",
        };
        f.write_str(s)
    }
}

/// One logical UI action against a page whose markup may vary.
#[derive(Debug, Clone)]
pub struct InteractionRequest {
    pub selectors: SelectorList,
    pub action: Action,
    /// Text to type. Required and non-empty for [`Action::Type`].
    pub value: Option<String>,
    pub require_visible: bool,
    /// Budget for each selector attempt, not for the whole request.
    pub timeout: Duration,
    /// Pause after a successful action so the page can update.
    pub settle: Duration,
    /// A required step treats an empty selector list as a programming error.
    pub required: bool,
}

impl InteractionRequest {
    pub fn new(selectors: impl Into<SelectorList>, action: Action) -> Self {
        Self {
            selectors: selectors.into(),
            action,
            value: None,
            require_visible: true,
            timeout: DEFAULT_SELECTOR_TIMEOUT,
            settle: Duration::ZERO,
            required: false,
        }
    }

    pub fn click(selectors: impl Into<SelectorList>) -> Self {
        Self::new(selectors, Action::Click)
    }

    pub fn type_text(selectors: impl Into<SelectorList>, value: impl Into<String>) -> Self {
        Self::new(selectors, Action::Type).with_value(value)
    }

    pub fn wait_present(selectors: impl Into<SelectorList>) -> Self {
        Self::new(selectors, Action::WaitPresent)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn visible(mut self, require_visible: bool) -> Self {
        self.require_visible = require_visible;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl From<Vec<String>> for SelectorList {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<const N: usize> From<[&str; N]> for SelectorList {
    fn from(value: [&str; N]) -> Self {
        Self::new(value)
    }
}

/// What happened when one selector was tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptResult {
    Succeeded,
    /// The element never appeared (or never became visible) within the budget.
    NotFound,
    /// The element was found but the lookup or action raised an error.
    Failed { reason: String },
}

/// Instrumentation record for a single selector attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorAttempt {
    pub index: usize,
    pub selector: String,
    pub result: AttemptResult,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

/// Result of an interaction. A failure here is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionOutcome {
    pub succeeded: bool,
    pub matched_selector: Option<String>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub attempts: Vec<SelectorAttempt>,
}

impl InteractionOutcome {
    pub fn failed(elapsed: Duration, attempts: Vec<SelectorAttempt>) -> Self {
        Self {
            succeeded: false,
            matched_selector: None,
            elapsed,
            attempts,
        }
    }
}

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser cookie in a backend-neutral shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Expiry as seconds since the Unix epoch. `None` for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Serialize a `Duration` as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
