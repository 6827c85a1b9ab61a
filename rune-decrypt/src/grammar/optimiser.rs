//! Logical replacements: textual clean-up of generated attempts.
//!
//! Each `<pattern>;<replacement>` pair is applied in file order as a plain,
//! global substring replacement. Nothing here understands postfix
//! semantics, so the file order is part of the output contract.

use crate::error::{DecryptError, DecryptResult};
use crate::gematria::COMMENT_DELIMITER;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Optimiser {
    replacements: Vec<(String, String)>,
}

impl Optimiser {
    /// An optimiser that leaves attempts untouched
    pub fn identity() -> Self {
        Optimiser::default()
    }

    /// Parse `<pattern>;<replacement>` lines.
    ///
    /// Blank lines and `//` comments are skipped. A pattern seen twice keeps
    /// its first position and takes the later replacement text. Anything
    /// after a second `;` is ignored.
    ///
    /// # Errors
    /// Returns `ReplacementError` for a line without `;` or with an empty pattern.
    pub fn parse(source: &str) -> DecryptResult<Self> {
        let mut optimiser = Optimiser::default();

        for (line_number, line) in source.lines().enumerate() {
            if line.starts_with(COMMENT_DELIMITER) || line.trim().is_empty() {
                continue;
            }

            let mut parts = line.split(';');
            let pattern = parts.next().unwrap_or_default();
            let replacement = parts.next().ok_or_else(|| {
                DecryptError::ReplacementError(format!(
                    "line {}: expected '<pattern>;<replacement>', found '{}'",
                    line_number + 1,
                    line
                ))
            })?;

            if pattern.is_empty() {
                return Err(DecryptError::ReplacementError(format!(
                    "line {}: pattern must not be empty",
                    line_number + 1
                )));
            }

            optimiser.add(pattern, replacement);
        }

        Ok(optimiser)
    }

    /// Append a replacement, or update the text of an existing pattern in place
    pub fn add(&mut self, pattern: &str, replacement: &str) -> &mut Self {
        match self.replacements.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, existing)) => *existing = replacement.to_string(),
            None => self
                .replacements
                .push((pattern.to_string(), replacement.to_string())),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Apply every replacement, in order, to `attempt`
    pub fn optimise(&self, attempt: &str) -> String {
        let mut result = attempt.to_string();
        for (pattern, replacement) in &self.replacements {
            if result.contains(pattern.as_str()) {
                result = result.replace(pattern.as_str(), replacement);
            }
        }
        result
    }
}
