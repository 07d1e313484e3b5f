// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pagewright login <url>`: run the form login flow.

use super::{output, App};
use crate::captcha::HttpCaptchaSolver;
use crate::cookies::export_cookies;
use crate::flows::{LoginCredentials, LoginFlow};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable read when `--password` is not given.
pub const PASSWORD_ENV: &str = "PAGEWRIGHT_LOGIN_PASSWORD";

#[derive(Debug, Clone, clap::Args)]
pub struct LoginArgs {
    /// Login page URL
    pub url: String,
    #[arg(long, short = 'u')]
    pub username: String,
    /// Password (prefer PAGEWRIGHT_LOGIN_PASSWORD; flags are visible in `ps`)
    #[arg(long)]
    pub password: Option<String>,
    /// Username field selector. Repeatable; replaces the stock list.
    #[arg(long = "username-selector")]
    pub username_selectors: Vec<String>,
    /// Password field selector. Repeatable; replaces the stock list.
    #[arg(long = "password-selector")]
    pub password_selectors: Vec<String>,
    /// Submit control selector. Repeatable; replaces the stock list.
    #[arg(long = "submit-selector")]
    pub submit_selectors: Vec<String>,
    /// Element that only exists after a successful login. Repeatable.
    #[arg(long = "expect")]
    pub expect: Vec<String>,
    /// Save the session cookies here after login
    #[arg(long)]
    pub cookies_out: Option<PathBuf>,
}

/// Apply selector overrides to the stock flow.
pub fn build_flow(args: &LoginArgs) -> LoginFlow {
    let mut flow = LoginFlow::new(args.url.clone());
    if !args.username_selectors.is_empty() {
        flow = flow.username_selectors(args.username_selectors.clone());
    }
    if !args.password_selectors.is_empty() {
        flow = flow.password_selectors(args.password_selectors.clone());
    }
    if !args.submit_selectors.is_empty() {
        flow = flow.submit_selectors(args.submit_selectors.clone());
    }
    if !args.expect.is_empty() {
        flow = flow.expect_after_login(args.expect.clone());
    }
    flow
}

pub async fn run(app: &App, args: &LoginArgs) -> Result<()> {
    let password = match &args.password {
        Some(p) => p.clone(),
        None => std::env::var(PASSWORD_ENV)
            .with_context(|| format!("no password given; pass --password or set {PASSWORD_ENV}"))?,
    };
    let credentials = LoginCredentials {
        username: args.username.clone(),
        password,
    };
    let flow = build_flow(args);

    let solver = HttpCaptchaSolver::from_config(&app.config.captcha);
    let mut ctx = app.flow_context();
    if let Some(solver) = &solver {
        ctx = ctx.with_solver(solver);
    }

    let renderer = app.renderer().await?;
    let mut session = app.session(&renderer).await?;

    let result = async {
        let report = flow.run(session.page_mut(), &ctx, &credentials).await?;
        if let Some(path) = &args.cookies_out {
            if report.succeeded {
                export_cookies(session.page_mut(), path).await?;
            } else {
                tracing::warn!("login did not succeed, cookies not exported");
            }
        }
        Ok::<_, anyhow::Error>(report)
    }
    .await;
    let result = session.finish(result).await;
    app.release(&renderer).await;
    let report = result?;

    if app.json {
        output::print_json(&report);
    } else {
        for step in &report.steps {
            output::print_outcome(&step.name, &step.outcome);
        }
        println!(
            "Login {}; final URL {}",
            if report.succeeded { "succeeded" } else { "FAILED" },
            report.final_url
        );
    }
    if !report.succeeded {
        anyhow::bail!("login flow did not complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: LoginArgs,
    }

    #[test]
    fn test_selector_overrides() {
        let h = Harness::parse_from([
            "login",
            "https://example.com/login",
            "-u",
            "ana",
            "--submit-selector",
            "#go",
            "--expect",
            ".account",
        ]);
        let flow = build_flow(&h.args);
        assert_eq!(flow.submit_selectors.iter().collect::<Vec<_>>(), vec!["#go"]);
        assert!(flow.success_selectors.is_some());
        assert!(flow.username_selectors.len() > 1);
    }
}
