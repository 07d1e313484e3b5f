//! Field-extraction aggregator.
//!
//! A logical field (a contact phone number, say) is often exposed by a
//! page in several redundant ways, none reliable across all variants.
//! [`FieldExtractor`] runs every registered heuristic over a parsed
//! [`Snapshot`], keeps every finding for diagnostics, then selects the
//! first candidate of the highest-priority heuristic that matched and
//! passes it through a [`Canonicalizer`].
//!
//! Selection follows heuristic priority, not document order.

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parsed page and its visible text.
///
/// Not `Send`: build one where it is consumed and drop it before awaiting.
pub struct Snapshot {
    document: Html,
    text: String,
}

impl Snapshot {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        Self { document, text }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Whitespace-joined text content outside `head`, `script`, `style`,
    /// `noscript` and `template`.
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value().as_element().map_or(false, |e| {
                matches!(e.name(), "head" | "script" | "style" | "noscript" | "template")
            })
        });
        if hidden {
            continue;
        }
        let t = text.trim();
        if !t.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(t);
        }
    }
    out
}

/// A raw match plus the text the heuristic looked at to produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub raw: String,
    pub context: String,
}

impl Candidate {
    pub fn new(raw: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            context: context.into(),
        }
    }
}

/// One independent way of locating a field in a page.
pub trait ExtractionHeuristic: Send + Sync {
    /// Stable method name used in reports.
    fn name(&self) -> &str;
    fn scan(&self, snapshot: &Snapshot) -> Vec<Candidate>;
}

/// Normalizes a selected raw string into the field's standard form.
/// Returns `None` when the raw value cannot be represented.
pub trait Canonicalizer: Send + Sync {
    fn canonicalize(&self, raw: &str) -> Option<String>;
}

/// Findings of one heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicReport {
    pub method: String,
    pub candidates: Vec<Candidate>,
}

/// The candidate chosen by priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCandidate {
    pub method: String,
    pub raw: String,
    pub context: String,
}

/// Why no final value was produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExtractionFailure {
    #[error("no heuristic produced a candidate")]
    NoCandidates,
    #[error("candidate {raw:?} from {method} failed canonicalization")]
    Rejected { method: String, raw: String },
}

/// Everything an extraction run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub field: String,
    pub final_value: Option<String>,
    pub selected: Option<SelectedCandidate>,
    pub failure: Option<ExtractionFailure>,
    /// One report per heuristic, in priority order.
    pub reports: Vec<HeuristicReport>,
}

impl ExtractionResult {
    pub fn is_found(&self) -> bool {
        self.final_value.is_some()
    }

    pub fn candidates_by_method(&self) -> BTreeMap<&str, &[Candidate]> {
        self.reports
            .iter()
            .map(|r| (r.method.as_str(), r.candidates.as_slice()))
            .collect()
    }
}

/// Runs a priority-ordered set of heuristics for one field.
pub struct FieldExtractor {
    field: String,
    heuristics: Vec<Box<dyn ExtractionHeuristic>>,
    canonicalizer: Box<dyn Canonicalizer>,
}

impl FieldExtractor {
    pub fn new(field: impl Into<String>, canonicalizer: impl Canonicalizer + 'static) -> Self {
        Self {
            field: field.into(),
            heuristics: Vec::new(),
            canonicalizer: Box::new(canonicalizer),
        }
    }

    /// Append a heuristic at the lowest priority so far.
    pub fn heuristic(mut self, heuristic: impl ExtractionHeuristic + 'static) -> Self {
        self.heuristics.push(Box::new(heuristic));
        self
    }

    pub fn methods(&self) -> Vec<&str> {
        self.heuristics.iter().map(|h| h.name()).collect()
    }

    pub fn extract_html(&self, html: &str) -> ExtractionResult {
        self.extract(&Snapshot::parse(html))
    }

    pub fn extract(&self, snapshot: &Snapshot) -> ExtractionResult {
        let reports: Vec<HeuristicReport> = self
            .heuristics
            .iter()
            .map(|h| {
                let candidates = h.scan(snapshot);
                tracing::debug!(
                    field = %self.field,
                    method = h.name(),
                    found = candidates.len(),
                    "heuristic scanned"
                );
                HeuristicReport {
                    method: h.name().to_string(),
                    candidates,
                }
            })
            .collect();

        let selected = reports.iter().find_map(|r| {
            r.candidates
                .iter()
                .find(|c| !c.raw.trim().is_empty())
                .map(|c| SelectedCandidate {
                    method: r.method.clone(),
                    raw: c.raw.clone(),
                    context: c.context.clone(),
                })
        });

        let (final_value, failure) = match &selected {
            None => (None, Some(ExtractionFailure::NoCandidates)),
            Some(sel) => match self.canonicalizer.canonicalize(&sel.raw) {
                Some(value) => (Some(value), None),
                None => (
                    None,
                    Some(ExtractionFailure::Rejected {
                        method: sel.method.clone(),
                        raw: sel.raw.clone(),
                    }),
                ),
            },
        };

        match (&final_value, &failure) {
            (Some(value), _) => tracing::info!(
                field = %self.field,
                value = %value,
                method = selected.as_ref().map(|s| s.method.as_str()).unwrap_or_default(),
                "field extracted"
            ),
            (None, Some(reason)) => tracing::info!(
                field = %self.field,
                reason = %reason,
                "field not extracted"
            ),
            (None, None) => {}
        }

        ExtractionResult {
            field: self.field.clone(),
            final_value,
            selected,
            failure,
            reports,
        }
    }
}
