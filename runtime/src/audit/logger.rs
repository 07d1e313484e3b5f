// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSONL audit logger: append-only log of run events.
//!
//! Features:
//! - Append-only JSONL format for easy parsing
//! - Automatic log rotation when file exceeds `MAX_LOG_SIZE` (50MB)
//! - Rotated files named `.1`, `.2`, etc. (max 5 rotations)

use crate::events::{EventBus, RunEvent};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Maximum audit log size before rotation (50 MB).
const MAX_LOG_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 5;

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub run_id: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

/// Append-only JSONL audit logger with automatic rotation.
pub struct AuditLogger {
    file: File,
    path: PathBuf,
    run_id: String,
    max_size: u64,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
}

impl AuditLogger {
    /// Open or create the audit log file.
    pub fn open(path: &Path, run_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            run_id: run_id.to_string(),
            max_size: MAX_LOG_SIZE,
            current_size,
        })
    }

    /// Override the rotation threshold.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Append one event.
    pub fn log(&mut self, event: &RunEvent) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id.clone(),
            event: event.clone(),
        };
        let json = serde_json::to_string(&record)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to write audit log: {}", self.path.display()))?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Rotate log files: audit.jsonl → audit.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        // Drop the oldest first so the shift below has room
        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }

        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            let to = rotation_path(&self.path, i + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }

        let first_rotation = rotation_path(&self.path, 1);
        let _ = std::fs::rename(&self.path, &first_rotation);

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| "failed to reopen audit log after rotation")?;
        self.current_size = 0;

        Ok(())
    }
}

/// Build path for a rotated log file: `audit.jsonl.1`, `audit.jsonl.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audit.jsonl")
    );
    base.with_file_name(name)
}

/// Subscribe `logger` to `bus` and write every event until the bus closes.
pub fn spawn_audit_writer(bus: &EventBus, mut logger: AuditLogger) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = logger.log(&event) {
                        tracing::warn!(error = %e, "audit write failed");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "audit writer lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
