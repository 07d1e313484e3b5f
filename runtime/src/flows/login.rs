// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Form login: username, password, optional CAPTCHA, submit.

use super::FlowContext;
use crate::captcha::{solve_best_effort, CaptchaOutcome};
use anyhow::Result;
use pagewright::{InteractionOutcome, InteractionRequest, PageContext, SelectorList};
use serde::Serialize;

const USERNAME_SELECTORS: &[&str] = &[
    "input[type='email']",
    "input[name='email']",
    "input[name='username']",
    "input[id='username']",
    "input[autocomplete='username']",
    "form input[type='text']",
];

const PASSWORD_SELECTORS: &[&str] = &[
    "input[type='password']",
    "input[name='password']",
    "input[autocomplete='current-password']",
];

const SUBMIT_SELECTORS: &[&str] = &[
    "button[type='submit']",
    "input[type='submit']",
    "form button",
    "[role='button'][data-action='login']",
];

pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoginFlow {
    pub url: String,
    pub username_selectors: SelectorList,
    pub password_selectors: SelectorList,
    pub submit_selectors: SelectorList,
    /// Element expected after a successful login. Unchecked when `None`.
    pub success_selectors: Option<SelectorList>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginStep {
    pub name: String,
    pub outcome: InteractionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginReport {
    pub succeeded: bool,
    pub steps: Vec<LoginStep>,
    pub captcha: CaptchaOutcome,
    pub final_url: String,
}

impl LoginFlow {
    /// Login at `url` with the stock selector lists.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username_selectors: SelectorList::from(USERNAME_SELECTORS),
            password_selectors: SelectorList::from(PASSWORD_SELECTORS),
            submit_selectors: SelectorList::from(SUBMIT_SELECTORS),
            success_selectors: None,
        }
    }

    pub fn username_selectors(mut self, selectors: impl Into<SelectorList>) -> Self {
        self.username_selectors = selectors.into();
        self
    }

    pub fn password_selectors(mut self, selectors: impl Into<SelectorList>) -> Self {
        self.password_selectors = selectors.into();
        self
    }

    pub fn submit_selectors(mut self, selectors: impl Into<SelectorList>) -> Self {
        self.submit_selectors = selectors.into();
        self
    }

    pub fn expect_after_login(mut self, selectors: impl Into<SelectorList>) -> Self {
        self.success_selectors = Some(selectors.into());
        self
    }

    /// Run the flow. Navigation failures are errors; a step whose
    /// selectors all miss ends the flow with `succeeded: false`.
    pub async fn run(
        &self,
        page: &mut dyn PageContext,
        ctx: &FlowContext<'_>,
        credentials: &LoginCredentials,
    ) -> Result<LoginReport> {
        ctx.navigate(page, &self.url).await?;

        let mut steps = Vec::new();
        let mut captcha = CaptchaOutcome::NoChallenge;
        let plan = [
            (
                "username",
                InteractionRequest::type_text(
                    self.username_selectors.clone(),
                    &credentials.username,
                )
                .required(),
            ),
            (
                "password",
                InteractionRequest::type_text(
                    self.password_selectors.clone(),
                    &credentials.password,
                )
                .required(),
            ),
            (
                "submit",
                InteractionRequest::click(self.submit_selectors.clone()).required(),
            ),
        ];

        for (name, request) in plan {
            if name == "submit" {
                captcha = solve_best_effort(page, ctx.solver, ctx.bus).await;
            }
            let outcome = ctx.interactor.interact(page, &ctx.request(request)).await?;
            let ok = outcome.succeeded;
            steps.push(LoginStep {
                name: name.to_string(),
                outcome,
            });
            if !ok {
                tracing::warn!(step = name, url = %self.url, "login step failed");
                return Ok(self.report(page, false, steps, captcha).await);
            }
        }

        let mut succeeded = true;
        if let Some(selectors) = &self.success_selectors {
            let outcome = ctx
                .interactor
                .interact(page, &ctx.request(InteractionRequest::wait_present(selectors.clone())))
                .await?;
            succeeded = outcome.succeeded;
            steps.push(LoginStep {
                name: "verify".to_string(),
                outcome,
            });
        }

        Ok(self.report(page, succeeded, steps, captcha).await)
    }

    async fn report(
        &self,
        page: &dyn PageContext,
        succeeded: bool,
        steps: Vec<LoginStep>,
        captcha: CaptchaOutcome,
    ) -> LoginReport {
        let final_url = page.url().await.unwrap_or_else(|_| self.url.clone());
        tracing::info!(succeeded, final_url = %final_url, "login flow finished");
        LoginReport {
            succeeded,
            steps,
            captcha,
            final_url,
        }
    }
}
