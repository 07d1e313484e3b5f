// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pagewright extract-phone <url>...`: phone numbers from listing pages.
//!
//! Each URL gets its own session; sessions run concurrently up to
//! `--concurrency`. A failing URL is reported and the rest continue.

use super::{output, App};
use crate::flows::{extract_phone, FlowContext};
use crate::renderer::Renderer;
use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use pagewright::SelectorList;
use serde::Serialize;

#[derive(Debug, Clone, clap::Args)]
pub struct ExtractArgs {
    /// Pages to scan
    #[arg(required = true)]
    pub urls: Vec<String>,
    /// Selector to wait for before scanning. Repeatable; first match wins.
    #[arg(long = "ready")]
    pub ready: Vec<String>,
    /// Maximum number of pages open at once
    #[arg(long, default_value = "4")]
    pub concurrency: usize,
    /// Country code for ten-digit numbers (defaults to config)
    #[arg(long)]
    pub country_code: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneRow {
    pub url: String,
    pub phone: Option<String>,
    pub method: Option<String>,
    pub failure: Option<String>,
    pub error: Option<String>,
}

async fn scan_one(
    app: &App,
    renderer: &dyn Renderer,
    ctx: &FlowContext<'_>,
    url: String,
    ready: Option<&SelectorList>,
    country_code: u8,
) -> PhoneRow {
    let mut session = match app.session(renderer).await {
        Ok(s) => s,
        Err(e) => {
            return PhoneRow {
                url,
                phone: None,
                method: None,
                failure: None,
                error: Some(format!("{e:#}")),
            }
        }
    };
    let result = extract_phone(session.page_mut(), ctx, &url, ready, country_code).await;
    match session.finish(result).await {
        Ok(r) => PhoneRow {
            url,
            phone: r.final_value.clone(),
            method: r.selected.as_ref().map(|s| s.method.clone()),
            failure: r.failure.as_ref().map(|f| f.to_string()),
            error: None,
        },
        Err(e) => PhoneRow {
            url,
            phone: None,
            method: None,
            failure: None,
            error: Some(format!("{e:#}")),
        },
    }
}

pub async fn run(app: &App, args: &ExtractArgs) -> Result<()> {
    if args.concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }
    let country_code = args.country_code.unwrap_or(app.config.default_country_code);
    if !(1..=9).contains(&country_code) {
        bail!("--country-code must be a single digit 1-9");
    }
    let ready = (!args.ready.is_empty()).then(|| SelectorList::from(args.ready.clone()));

    let renderer = app.renderer().await?;
    let ctx = app.flow_context();

    let mut rows: Vec<PhoneRow> = stream::iter(args.urls.iter().cloned())
        .map(|url| scan_one(app, &renderer, &ctx, url, ready.as_ref(), country_code))
        .buffer_unordered(args.concurrency)
        .collect()
        .await;
    app.release(&renderer).await;
    rows.sort_by_key(|r| args.urls.iter().position(|u| *u == r.url));

    if app.json {
        output::print_json(&rows);
    } else {
        for row in &rows {
            match (&row.phone, &row.error) {
                (Some(phone), _) => println!(
                    "{}  {}  ({})",
                    row.url,
                    phone,
                    row.method.as_deref().unwrap_or("-")
                ),
                (None, Some(err)) => println!("{}  error: {err}", row.url),
                (None, None) => println!(
                    "{}  -  {}",
                    row.url,
                    row.failure.as_deref().unwrap_or("not found")
                ),
            }
        }
    }

    let found = rows.iter().filter(|r| r.phone.is_some()).count();
    tracing::info!(pages = rows.len(), found, "extraction run complete");
    Ok(())
}
