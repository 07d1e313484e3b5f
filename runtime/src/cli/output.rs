// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal output helpers.

use pagewright::{AttemptResult, InteractionOutcome};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// One line per selector attempt, then the verdict.
pub fn print_outcome(label: &str, outcome: &InteractionOutcome) {
    for attempt in &outcome.attempts {
        let status = match &attempt.result {
            AttemptResult::Succeeded => "ok".to_string(),
            AttemptResult::NotFound => "not found".to_string(),
            AttemptResult::Failed { reason } => format!("failed: {reason}"),
        };
        println!(
            "  [{}] {:<40} {:>6}ms  {}",
            attempt.index,
            attempt.selector,
            attempt.elapsed.as_millis(),
            status
        );
    }
    match &outcome.matched_selector {
        Some(sel) => println!("{label}: matched {sel} in {}ms", outcome.elapsed.as_millis()),
        None => println!("{label}: no selector matched"),
    }
}
