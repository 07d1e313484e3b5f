//! Pagewright: resilient page interaction and field extraction.
//!
//! Two components make up the core:
//!
//! - [`Interactor`] performs one logical UI action (click, type, wait)
//!   by trying an ordered list of selectors until one works.
//! - [`FieldExtractor`] runs several independent heuristics for one
//!   field, picks a value by heuristic priority and canonicalizes it.
//!
//! Both treat "nothing found" as a normal outcome. Only malformed input
//! is an error.

pub mod error;
pub mod extraction;
pub mod interactor;
pub mod page;
pub mod phone;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod typing;

pub use error::{ErrorKind, PageError, PagewrightError};
pub use extraction::{
    Candidate, Canonicalizer, ExtractionFailure, ExtractionHeuristic, ExtractionResult,
    FieldExtractor, HeuristicReport, SelectedCandidate, Snapshot,
};
pub use interactor::{InteractionObserver, Interactor};
pub use page::{PageContext, PageResult};
pub use phone::{canonicalize_phone, phone_extractor, PhoneCanonicalizer, DEFAULT_COUNTRY_CODE};
pub use retry::{retry_with_backoff, retry_with_backoff_if, Retried, RetryExhausted, RetryPolicy};
pub use types::*;
pub use typing::TypingCadence;
