// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pagewright interact <url>`: run one selector-fallback interaction.

use super::{output, App};
use crate::config::InteractionConfig;
use crate::flows::FlowContext;
use crate::renderer::Renderer;
use anyhow::{bail, Result};
use pagewright::{Action, InteractionOutcome, InteractionRequest, SelectorList};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ActionArg {
    Click,
    Type,
    Wait,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Click => Action::Click,
            ActionArg::Type => Action::Type,
            ActionArg::Wait => Action::WaitPresent,
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct InteractArgs {
    /// Page to load first
    pub url: String,
    /// What to do with the matched element
    #[arg(long, value_enum, default_value = "click")]
    pub action: ActionArg,
    /// Candidate selector, tried in the order given. Repeatable.
    #[arg(long = "selector", short = 's', required = true)]
    pub selectors: Vec<String>,
    /// Text to type (required for --action type)
    #[arg(long)]
    pub value: Option<String>,
    /// Per-selector wait budget in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Delay after a successful action in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,
    /// Accept elements that are present but not visible
    #[arg(long)]
    pub allow_hidden: bool,
}

/// Build the request, letting flags override configured defaults.
pub fn build_request(
    args: &InteractArgs,
    defaults: &InteractionConfig,
) -> Result<InteractionRequest> {
    let action = Action::from(args.action);
    if action == Action::Type && args.value.is_none() {
        bail!("--value is required with --action type");
    }
    let mut request = defaults
        .apply(InteractionRequest::new(
            SelectorList::from(args.selectors.clone()),
            action,
        ))
        .visible(!args.allow_hidden)
        .required();
    if let Some(value) = &args.value {
        request = request.with_value(value.clone());
    }
    if let Some(ms) = args.timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.settle_ms {
        request = request.with_settle(Duration::from_millis(ms));
    }
    Ok(request)
}

pub async fn run(app: &App, args: &InteractArgs) -> Result<()> {
    let request = build_request(args, &app.config.interaction)?;
    let ctx = app.flow_context();
    ctx.interactor.validate(&request)?;

    let renderer = app.renderer().await?;
    let result = interact_once(app, &renderer, &ctx, args, &request).await;
    app.release(&renderer).await;
    let outcome = result?;

    if app.json {
        output::print_json(&outcome);
    } else {
        output::print_outcome(&request.action.to_string(), &outcome);
    }
    Ok(())
}

async fn interact_once(
    app: &App,
    renderer: &dyn Renderer,
    ctx: &FlowContext<'_>,
    args: &InteractArgs,
    request: &InteractionRequest,
) -> Result<InteractionOutcome> {
    let mut session = app.session(renderer).await?;
    let result = async {
        ctx.navigate(session.page_mut(), &args.url).await?;
        let outcome = ctx.interactor.interact(session.page_mut(), request).await?;
        if !outcome.succeeded {
            tracing::warn!(url = %args.url, "no selector matched");
        }
        Ok::<_, anyhow::Error>(outcome)
    }
    .await;
    session.finish(result).await
}
