// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! `pagewright send-batch <csv>`: one SMS per CSV row.

use super::{output, App};
use crate::events::{EventBus, RunEvent};
use crate::messaging::{BatchOptions, BatchReport, BatchSender, RowStatus, TwilioGateway};
use crate::store::Store;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, clap::Args)]
pub struct BatchArgs {
    /// CSV with a header row: name, phone, aux
    pub csv: PathBuf,
    /// Message body; `{name}` and `{aux}` are filled per row
    #[arg(long, conflicts_with = "template_file")]
    pub template: Option<String>,
    /// Read the message body from a file
    #[arg(long)]
    pub template_file: Option<PathBuf>,
    /// Sender number (defaults to TWILIO_FROM_NUMBER)
    #[arg(long)]
    pub from: Option<String>,
    /// Validate and render every row without sending
    #[arg(long)]
    pub dry_run: bool,
    /// Do not record messages in the store
    #[arg(long)]
    pub no_store: bool,
}

fn load_template(args: &BatchArgs) -> Result<String> {
    let template = match (&args.template, &args.template_file) {
        (Some(t), _) => t.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read template: {}", path.display()))?,
        (None, None) => bail!("pass --template or --template-file"),
    };
    let template = template.trim().to_string();
    if template.is_empty() {
        bail!("message template is empty");
    }
    Ok(template)
}

async fn send(app: &App, args: &BatchArgs, options: BatchOptions) -> Result<BatchReport> {
    if args.dry_run {
        return BatchSender::dry_run(&app.bus, options)
            .send_file(&args.csv)
            .await;
    }
    let gateway = TwilioGateway::from_config(&app.config.messaging)?;
    let store = if args.no_store {
        None
    } else {
        Some(Store::open(&app.config.store_path)?)
    };
    let mut sender = BatchSender::new(&gateway, &app.bus, options);
    if let Some(store) = &store {
        sender = sender.with_store(store);
    }
    sender.send_file(&args.csv).await
}

fn tally_line(processed: usize, sent: usize, failed: usize, invalid: usize) -> String {
    format!("{processed} row(s): {sent} sent, {failed} failed, {invalid} invalid")
}

/// Keep a running tally from batch events until the batch completes.
///
/// Falls back to one stderr line per row when the bar is hidden (no
/// terminal). Resolves to the last tally shown.
fn spawn_tally(bus: &EventBus, bar: ProgressBar) -> JoinHandle<Option<String>> {
    let mut rx = bus.subscribe();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    tokio::spawn(async move {
        let mut last = None;
        loop {
            match rx.recv().await {
                Ok(RunEvent::BatchProgress {
                    processed,
                    sent,
                    failed,
                    invalid,
                }) => {
                    let line = tally_line(processed, sent, failed, invalid);
                    if bar.is_hidden() {
                        eprintln!("  {line}");
                    } else {
                        bar.set_message(line.clone());
                        bar.tick();
                    }
                    last = Some(line);
                }
                Ok(RunEvent::BatchComplete { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        bar.finish_and_clear();
        last
    })
}

pub async fn run(app: &App, args: &BatchArgs) -> Result<()> {
    let template = load_template(args)?;
    let messaging = &app.config.messaging;

    let from = match args.from.clone().or_else(|| messaging.from_number.clone()) {
        Some(from) => from,
        None if args.dry_run => String::new(),
        None => bail!("no sender number; pass --from or set TWILIO_FROM_NUMBER"),
    };
    let options = BatchOptions {
        template,
        from,
        country_code: app.config.default_country_code,
        retry: messaging.retry,
        dry_run: args.dry_run,
    };

    let bar = if app.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    let tally = spawn_tally(&app.bus, bar);
    let report = send(app, args, options).await;
    match &report {
        Ok(_) => {
            let _ = tally.await;
        }
        Err(_) => tally.abort(),
    }
    let report = report?;

    if app.json {
        output::print_json(&report);
        return Ok(());
    }
    for row in &report.rows {
        let detail = match &row.status {
            RowStatus::Sent { message_id, attempts } => format!(
                "sent {} ({attempts} attempt(s))",
                message_id.as_deref().unwrap_or("-")
            ),
            RowStatus::Failed { error, attempts } => {
                format!("FAILED after {attempts} attempt(s): {error}")
            }
            RowStatus::Invalid { reason } => format!("skipped: {reason}"),
            RowStatus::DryRun => format!("would send: {}", row.body.as_deref().unwrap_or("")),
        };
        println!("  row {:>4}  {:<16} {}", row.row, row.phone, detail);
    }
    let s = &report.summary;
    println!(
        "{}{}",
        tally_line(s.total, s.sent, s.failed, s.invalid),
        if s.dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}
