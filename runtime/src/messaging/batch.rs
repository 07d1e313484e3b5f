// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! CSV-driven batch sending.
//!
//! Rows are processed in file order. A row whose phone is blank or cannot
//! be canonicalized is counted as invalid and never reaches the gateway.
//! A failed delivery is counted and the batch moves on.

use super::delivery::{deliver, DeliveryReport};
use super::gateway::{MessageGateway, OutboundMessage};
use crate::events::{EventBus, RunEvent};
use crate::store::{NewMessage, Store};
use anyhow::{Context, Result};
use pagewright::{canonicalize_phone, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Instant;

/// One CSV row. Header names are matched case-sensitively, with common aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRow {
    #[serde(default, alias = "Name", alias = "client_name", alias = "full_name")]
    pub name: String,
    #[serde(
        default,
        alias = "Phone",
        alias = "phone_number",
        alias = "Phone Number",
        alias = "mobile"
    )]
    pub phone: String,
    #[serde(default, alias = "Aux", alias = "appointment", alias = "date")]
    pub aux: String,
}

/// Fill `{name}` and `{aux}` placeholders.
pub fn render_template(template: &str, row: &BatchRow) -> String {
    template
        .replace("{name}", row.name.trim())
        .replace("{aux}", row.aux.trim())
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub template: String,
    pub from: String,
    pub country_code: u8,
    pub retry: RetryPolicy,
    /// Render and validate every row without contacting the gateway.
    pub dry_run: bool,
}

/// What happened to one row.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Sent { message_id: Option<String>, attempts: u32 },
    Failed { error: String, attempts: u32 },
    Invalid { reason: String },
    DryRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub name: String,
    pub phone: String,
    pub body: Option<String>,
    #[serde(flatten)]
    pub status: RowStatus,
}

/// Totals for a batch; `sent + failed + invalid == total` outside dry runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub invalid: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub rows: Vec<RowOutcome>,
}

/// Sends one message per CSV row through a gateway.
pub struct BatchSender<'a> {
    /// `None` only for dry runs.
    gateway: Option<&'a dyn MessageGateway>,
    bus: &'a EventBus,
    store: Option<&'a Store>,
    options: BatchOptions,
}

impl<'a> BatchSender<'a> {
    pub fn new(gateway: &'a dyn MessageGateway, bus: &'a EventBus, options: BatchOptions) -> Self {
        Self {
            gateway: Some(gateway),
            bus,
            store: None,
            options,
        }
    }

    /// A sender that renders and validates rows but never sends.
    pub fn dry_run(bus: &'a EventBus, mut options: BatchOptions) -> Self {
        options.dry_run = true;
        Self {
            gateway: None,
            bus,
            store: None,
            options,
        }
    }

    /// Record every delivery attempt in `store`.
    pub fn with_store(mut self, store: &'a Store) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn send_file(&self, path: &Path) -> Result<BatchReport> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open CSV: {}", path.display()))?;
        self.send_csv(file).await
    }

    pub async fn send_csv<R: std::io::Read>(&self, input: R) -> Result<BatchReport> {
        let start = Instant::now();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(input);
        reader.headers().context("failed to read CSV header")?;

        let mut summary = BatchSummary {
            dry_run: self.options.dry_run,
            ..Default::default()
        };
        let mut rows = Vec::new();

        for (i, record) in reader.deserialize::<BatchRow>().enumerate() {
            let row_no = i + 1;
            summary.total += 1;

            let outcome = match record {
                Ok(row) => self.process_row(row_no, row).await,
                Err(e) => {
                    tracing::warn!(row = row_no, error = %e, "unreadable CSV row");
                    RowOutcome {
                        row: row_no,
                        name: String::new(),
                        phone: String::new(),
                        body: None,
                        status: RowStatus::Invalid {
                            reason: e.to_string(),
                        },
                    }
                }
            };

            match &outcome.status {
                RowStatus::Sent { .. } => summary.sent += 1,
                RowStatus::Failed { .. } => summary.failed += 1,
                RowStatus::Invalid { .. } => summary.invalid += 1,
                RowStatus::DryRun => {}
            }
            rows.push(outcome);

            self.bus.emit(RunEvent::BatchProgress {
                processed: summary.total,
                sent: summary.sent,
                failed: summary.failed,
                invalid: summary.invalid,
            });
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            total = summary.total,
            sent = summary.sent,
            failed = summary.failed,
            invalid = summary.invalid,
            dry_run = summary.dry_run,
            elapsed_ms,
            "batch complete"
        );
        self.bus.emit(RunEvent::BatchComplete {
            total: summary.total,
            sent: summary.sent,
            failed: summary.failed,
            invalid: summary.invalid,
            elapsed_ms,
        });

        Ok(BatchReport { summary, rows })
    }

    async fn process_row(&self, row_no: usize, row: BatchRow) -> RowOutcome {
        let Some(phone) = canonicalize_phone(&row.phone, self.options.country_code) else {
            let reason = if row.phone.trim().is_empty() {
                "missing phone".to_string()
            } else {
                format!("unrecognized phone {:?}", row.phone)
            };
            tracing::warn!(row = row_no, reason = %reason, "skipping row");
            return RowOutcome {
                row: row_no,
                name: row.name,
                phone: row.phone,
                body: None,
                status: RowStatus::Invalid { reason },
            };
        };

        let body = render_template(&self.options.template, &row);
        let gateway = match self.gateway {
            Some(gateway) if !self.options.dry_run => gateway,
            _ => return RowOutcome {
                row: row_no,
                name: row.name,
                phone,
                body: Some(body),
                status: RowStatus::DryRun,
            },
        };

        let message = OutboundMessage {
            from: self.options.from.clone(),
            to: phone.clone(),
            body,
        };
        let report = deliver(gateway, &message, &self.options.retry, self.bus).await;
        self.record(&row.name, &phone, &message.body, &report);

        let status = if report.success {
            RowStatus::Sent {
                message_id: report.message_id,
                attempts: report.attempts,
            }
        } else {
            RowStatus::Failed {
                error: report.error.unwrap_or_default(),
                attempts: report.attempts,
            }
        };
        RowOutcome {
            row: row_no,
            name: row.name,
            phone,
            body: Some(message.body),
            status,
        }
    }

    fn record(&self, name: &str, phone: &str, body: &str, report: &DeliveryReport) {
        let Some(store) = self.store else {
            return;
        };
        let result = store.upsert_client(name, phone).and_then(|client_id| {
            store.record_message(
                client_id,
                &NewMessage {
                    body,
                    provider_id: report.message_id.as_deref(),
                    status: if report.success { "sent" } else { "failed" },
                    attempts: report.attempts,
                    error: report.error.as_deref(),
                },
            )
        });
        if let Err(e) = result {
            tracing::warn!(phone = %phone, error = %e, "could not record message");
        }
    }
}
