//! N-gram fitness scoring of candidate decryptions.

use crate::error::{DecryptError, DecryptResult};
use std::collections::{HashMap, HashSet};

/// Characters removed before scoring: brackets, spacing, lowercase Latin
/// letters and digits. Only "cipher-looking" output contributes to a score.
fn is_stripped(c: char) -> bool {
    matches!(c, '[' | ']' | ' ' | '\r' | '\n') || c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// Strip every character the scorer ignores
pub fn sanitise(text: &str) -> String {
    text.chars().filter(|&c| !is_stripped(c)).collect()
}

/// Whether sanitised output carries enough distinct characters to be
/// considered: at least 10 when longer than 20 characters, else at least 5.
pub fn is_diverse(sanitised: &str) -> bool {
    let length = sanitised.chars().count();
    let distinct: HashSet<char> = sanitised.chars().collect();
    let required = if length > 20 { 10 } else { 5 };
    distinct.len() >= required
}

/// Log-probability n-gram model with a fixed window width
#[derive(Debug, Clone)]
pub struct LanguageModel {
    width: usize,
    base_score: f64,
    statistics: HashMap<String, f64>,
}

impl LanguageModel {
    /// Parse `<ngram><separator><frequency>` lines.
    ///
    /// Frequencies are converted once to `log10(frequency / total)`. N-grams
    /// missing from the table score `log10(0.01 / total)`.
    ///
    /// # Errors
    /// - An n-gram whose length is not `width`
    /// - A missing or non-integer frequency
    /// - A table with no frequency mass
    pub fn parse(source: &str, width: usize, separator: char) -> DecryptResult<Self> {
        if width == 0 {
            return Err(DecryptError::NgramError(
                "n-gram width must be at least 1".to_string(),
            ));
        }

        let mut counts: HashMap<String, u64> = HashMap::new();
        for (line_number, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let mut parts = line.split(separator);
            let ngram = parts.next().unwrap_or_default();
            let frequency = parts.next().ok_or_else(|| {
                DecryptError::NgramError(format!(
                    "line {}: expected '<ngram>{}<frequency>'",
                    line_number + 1,
                    separator
                ))
            })?;

            if ngram.chars().count() != width {
                return Err(DecryptError::NgramError(format!(
                    "line {}: '{}' does not match the selected n-gram width {}; \
                     ensure the width matches the data file",
                    line_number + 1,
                    ngram,
                    width
                )));
            }

            let frequency = frequency.trim().parse::<u64>().map_err(|e| {
                DecryptError::NgramError(format!(
                    "line {}: invalid frequency '{}': {}",
                    line_number + 1,
                    frequency,
                    e
                ))
            })?;

            counts.insert(ngram.to_string(), frequency);
        }

        let total: u64 = counts.values().sum();
        if total == 0 {
            return Err(DecryptError::NgramError(
                "n-gram statistics contain no frequency mass".to_string(),
            ));
        }
        let total = total as f64;

        let statistics = counts
            .into_iter()
            .map(|(ngram, count)| (ngram, (count as f64 / total).log10()))
            .collect();

        Ok(LanguageModel {
            width,
            base_score: (0.01 / total).log10(),
            statistics,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Score assigned to n-grams absent from the table
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn len(&self) -> usize {
        self.statistics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty()
    }

    /// Score text after sanitising it with [`sanitise`]
    pub fn score(&self, text: &str) -> f64 {
        self.score_sanitised(&sanitise(text))
    }

    /// Score text that has already been sanitised.
    ///
    /// The summed window scores are divided by the character count of the
    /// text, not by the number of windows. Empty text scores `-∞`.
    pub fn score_sanitised(&self, text: &str) -> f64 {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let length = boundaries.len() - 1;
        if length == 0 {
            return f64::NEG_INFINITY;
        }

        let mut total = 0.0;
        for start in 0..length.saturating_sub(self.width - 1) {
            let window = &text[boundaries[start]..boundaries[start + self.width]];
            total += self
                .statistics
                .get(window)
                .copied()
                .unwrap_or(self.base_score);
        }

        total / length as f64
    }
}
