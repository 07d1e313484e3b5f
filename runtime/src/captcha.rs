// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Best-effort CAPTCHA handling through an external solving service.
//!
//! Detection looks for `data-sitekey` widgets (reCAPTCHA v2, hCaptcha) and
//! captcha images in the current document. Solving is delegated to an HTTP
//! service; a failure is reported and the flow continues.

use crate::config::CaptchaConfig;
use crate::events::{EventBus, RunEvent};
use async_trait::async_trait;
use base64::Engine;
use pagewright::page::escape_js_str;
use pagewright::PageContext;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// A challenge found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptchaChallenge {
    RecaptchaV2 { site_key: String, page_url: String },
    Hcaptcha { site_key: String, page_url: String },
    /// A captcha image, base64-encoded PNG.
    Image { image_base64: String, page_url: String },
}

impl CaptchaChallenge {
    pub fn kind(&self) -> &'static str {
        match self {
            CaptchaChallenge::RecaptchaV2 { .. } => "recaptcha_v2",
            CaptchaChallenge::Hcaptcha { .. } => "hcaptcha",
            CaptchaChallenge::Image { .. } => "image",
        }
    }

    pub fn image(png: &[u8], page_url: &str) -> Self {
        CaptchaChallenge::Image {
            image_base64: base64::engine::general_purpose::STANDARD.encode(png),
            page_url: page_url.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CaptchaError {
    #[error("captcha request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("captcha service returned HTTP {0}")]
    Status(u16),

    #[error("captcha not solved: {0}")]
    Unsolved(String),

    #[error("captcha solve timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Something that turns a challenge into a response token.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, CaptchaError>;
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    #[serde(default)]
    solved: bool,
    token: Option<String>,
    error: Option<String>,
}

/// Solver backed by an HTTP service.
///
/// Posts the challenge as JSON and expects `{solved, token, error}` back.
#[derive(Clone)]
pub struct HttpCaptchaSolver {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpCaptchaSolver {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }

    /// Build a solver when an endpoint is configured.
    pub fn from_config(config: &CaptchaConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_ref()?;
        Some(Self::new(
            endpoint.clone(),
            config.api_key.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }
}

#[async_trait]
impl CaptchaSolver for HttpCaptchaSolver {
    async fn solve(&self, challenge: &CaptchaChallenge) -> Result<String, CaptchaError> {
        let mut request = self.client.post(&self.endpoint).json(challenge);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| CaptchaError::Timeout(self.timeout))??;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptchaError::Status(status.as_u16()));
        }

        let body: SolveResponse = response.json().await?;
        match (body.solved, body.token) {
            (true, Some(token)) if !token.is_empty() => Ok(token),
            _ => Err(CaptchaError::Unsolved(
                body.error.unwrap_or_else(|| "no token returned".to_string()),
            )),
        }
    }
}

/// Widget-based challenge in `html`, if any.
///
/// Image captchas need a screenshot, so they are reported by
/// [`has_image_captcha`] instead.
pub fn detect_challenge(html: &str, page_url: &str) -> Option<CaptchaChallenge> {
    let doc = Html::parse_document(html);
    let sitekey = Selector::parse("[data-sitekey]").expect("sitekey selector is valid");

    let el = doc.select(&sitekey).next()?;
    let site_key = el.value().attr("data-sitekey")?.trim().to_string();
    if site_key.is_empty() {
        return None;
    }
    let is_hcaptcha = el.value().classes().any(|c| c == "h-captcha")
        || html.contains("hcaptcha.com/1/api.js");
    let page_url = page_url.to_string();
    Some(if is_hcaptcha {
        CaptchaChallenge::Hcaptcha { site_key, page_url }
    } else {
        CaptchaChallenge::RecaptchaV2 { site_key, page_url }
    })
}

/// Whether the page shows a captcha image with an answer field.
pub fn has_image_captcha(html: &str) -> bool {
    let doc = Html::parse_document(html);
    let image = Selector::parse(
        "img[id*='captcha'], img[id*='Captcha'], img[class*='captcha'], img[alt*='aptcha']",
    )
    .expect("captcha image selector is valid");
    let input =
        Selector::parse("input[name*='captcha']").expect("captcha input selector is valid");
    doc.select(&image).next().is_some() && doc.select(&input).next().is_some()
}

/// Script that writes `token` where the page's widget reads it.
pub fn token_injection_script(challenge: &CaptchaChallenge, token: &str) -> String {
    let token = escape_js_str(token);
    let target = match challenge {
        CaptchaChallenge::RecaptchaV2 { .. } => "textarea[name=\"g-recaptcha-response\"]",
        CaptchaChallenge::Hcaptcha { .. } => {
            "textarea[name=\"h-captcha-response\"], textarea[name=\"g-recaptcha-response\"]"
        }
        CaptchaChallenge::Image { .. } => "input[name*=\"captcha\"]",
    };
    format!(
        r#"(() => {{
    const els = document.querySelectorAll('{target}');
    els.forEach(el => {{ el.value = '{token}'; el.dispatchEvent(new Event('input', {{ bubbles: true }})); }});
    return els.length;
}})()"#
    )
}

/// What happened during a best-effort attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptchaOutcome {
    NoChallenge,
    /// A challenge was found but no solver is configured.
    Skipped { kind: String },
    Solved { kind: String },
    Failed { kind: String, error: String },
}

/// Detect, solve and inject. Never fails the caller.
pub async fn solve_best_effort(
    page: &mut dyn PageContext,
    solver: Option<&dyn CaptchaSolver>,
    bus: &EventBus,
) -> CaptchaOutcome {
    let html = match page.html().await {
        Ok(html) => html,
        Err(e) => {
            tracing::debug!(error = %e, "could not read page for captcha detection");
            return CaptchaOutcome::NoChallenge;
        }
    };
    let url = page.url().await.unwrap_or_default();

    let challenge = match detect_challenge(&html, &url) {
        Some(c) => c,
        None if has_image_captcha(&html) => match page.screenshot().await {
            Ok(png) => CaptchaChallenge::image(&png, &url),
            Err(e) => {
                tracing::warn!(error = %e, "captcha image capture failed");
                return CaptchaOutcome::Failed {
                    kind: "image".to_string(),
                    error: e.to_string(),
                };
            }
        },
        None => return CaptchaOutcome::NoChallenge,
    };
    let kind = challenge.kind().to_string();

    let Some(solver) = solver else {
        tracing::warn!(kind = %kind, "captcha present but no solver configured");
        return CaptchaOutcome::Skipped { kind };
    };

    let start = Instant::now();
    let result = match solver.solve(&challenge).await {
        Ok(token) => page
            .execute_js(&token_injection_script(&challenge, &token))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    bus.emit(RunEvent::CaptchaAttempt {
        kind: kind.clone(),
        solved: result.is_ok(),
        error: result.as_ref().err().cloned(),
        elapsed_ms,
    });

    match result {
        Ok(()) => {
            tracing::info!(kind = %kind, elapsed_ms, "captcha solved");
            CaptchaOutcome::Solved { kind }
        }
        Err(error) => {
            tracing::warn!(kind = %kind, error = %error, "captcha solve failed, continuing");
            CaptchaOutcome::Failed { kind, error }
        }
    }
}
