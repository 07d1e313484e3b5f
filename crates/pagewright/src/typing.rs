//! Randomized inter-character typing delays.

use crate::error::PagewrightError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive bounds for the pause between typed characters.
///
/// Each character samples its own delay so keystrokes never arrive at a
/// fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingCadence {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self {
            min_ms: 70,
            max_ms: 130,
        }
    }
}

impl TypingCadence {
    pub fn new(min_ms: u64, max_ms: u64) -> Result<Self, PagewrightError> {
        let cadence = Self { min_ms, max_ms };
        cadence.validate()?;
        Ok(cadence)
    }

    pub fn validate(&self) -> Result<(), PagewrightError> {
        if self.min_ms > self.max_ms {
            return Err(PagewrightError::InvalidInput(format!(
                "typing delay min ({}ms) exceeds max ({}ms)",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }

    /// Sample the delay before the next character.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    /// One delay per character of `text`.
    pub fn plan<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Vec<(char, Duration)> {
        text.chars().map(|ch| (ch, self.sample(rng))).collect()
    }
}
