//! Gematria table: translation between runes, indices, primes and Latin plaintext.

use crate::error::{DecryptError, DecryptResult};
use std::collections::HashMap;

/// Marks a comment line in every data file read by this crate
pub const COMMENT_DELIMITER: &str = "//";

/// One row of the gematria table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuneDefinition {
    pub rune: char,
    pub index: usize,
    pub prime: i32,
    pub plaintext: String,
}

impl RuneDefinition {
    /// Parse a `<rune> <index> <prime> <plaintext>` line
    fn parse(line: &str, line_number: usize) -> DecryptResult<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(DecryptError::GematriaError(format!(
                "line {}: expected 4 fields '<rune> <index> <prime> <plaintext>', found {}",
                line_number,
                fields.len()
            )));
        }

        let mut chars = fields[0].chars();
        let rune = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(DecryptError::GematriaError(format!(
                    "line {}: rune '{}' must be a single character",
                    line_number, fields[0]
                )));
            }
        };

        let index = fields[1].parse::<usize>().map_err(|e| {
            DecryptError::GematriaError(format!(
                "line {}: invalid index '{}': {}",
                line_number, fields[1], e
            ))
        })?;
        let prime = fields[2].parse::<i32>().map_err(|e| {
            DecryptError::GematriaError(format!(
                "line {}: invalid prime '{}': {}",
                line_number, fields[2], e
            ))
        })?;

        Ok(RuneDefinition {
            rune,
            index,
            prime,
            plaintext: fields[3].to_string(),
        })
    }
}

/// Bidirectional rune ↔ index lookup
#[derive(Debug, Clone)]
pub struct Gematria {
    rune_lookup: HashMap<char, RuneDefinition>,
    index_lookup: Vec<RuneDefinition>,
}

impl Gematria {
    /// Parse a gematria table.
    ///
    /// Lines starting with `//` and blank lines are skipped. When a rune or an
    /// index appears twice the later row wins and a warning is logged.
    ///
    /// # Errors
    /// - Malformed rows
    /// - An empty table
    /// - Indices that do not cover `0..N` contiguously
    pub fn parse(source: &str) -> DecryptResult<Self> {
        let mut by_index: HashMap<usize, RuneDefinition> = HashMap::new();
        let mut by_rune: HashMap<char, RuneDefinition> = HashMap::new();

        for (line_number, line) in source.lines().enumerate() {
            if line.starts_with(COMMENT_DELIMITER) || line.trim().is_empty() {
                continue;
            }

            let definition = RuneDefinition::parse(line, line_number + 1)?;

            if let Some(previous) = by_rune.insert(definition.rune, definition.clone()) {
                tracing::warn!(
                    rune = %definition.rune,
                    previous_index = previous.index,
                    index = definition.index,
                    "rune defined twice; keeping the later definition"
                );
            }
            let (index, rune) = (definition.index, definition.rune);
            if let Some(previous) = by_index.insert(index, definition) {
                tracing::warn!(
                    index,
                    previous_rune = %previous.rune,
                    rune = %rune,
                    "index defined twice; keeping the later definition"
                );
            }
        }

        if by_index.is_empty() {
            return Err(DecryptError::GematriaError(
                "table contains no rune definitions".to_string(),
            ));
        }

        let mut index_lookup = Vec::with_capacity(by_index.len());
        for index in 0..by_index.len() {
            let definition = by_index.remove(&index).ok_or_else(|| {
                DecryptError::GematriaError(format!(
                    "indices must be contiguous from 0; index {} is missing",
                    index
                ))
            })?;
            index_lookup.push(definition);
        }

        Ok(Gematria {
            rune_lookup: by_rune,
            index_lookup,
        })
    }

    /// Build a table directly from definitions (used by tests and callers that
    /// already hold parsed rows)
    pub fn from_definitions(definitions: Vec<RuneDefinition>) -> DecryptResult<Self> {
        let source: String = definitions
            .iter()
            .map(|d| format!("{} {} {} {}\n", d.rune, d.index, d.prime, d.plaintext))
            .collect();
        Gematria::parse(&source)
    }

    pub fn rune_exists(&self, rune: char) -> bool {
        self.rune_lookup.contains_key(&rune)
    }

    pub fn by_rune(&self, rune: char) -> Option<&RuneDefinition> {
        self.rune_lookup.get(&rune)
    }

    pub fn by_index(&self, index: usize) -> Option<&RuneDefinition> {
        self.index_lookup.get(index)
    }

    /// Alphabet size: the modulus for every computed index
    pub fn len(&self) -> usize {
        self.index_lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_lookup.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuneDefinition> {
        self.index_lookup.iter()
    }

    /// Rows ordered by index
    pub fn definitions(&self) -> &[RuneDefinition] {
        &self.index_lookup
    }
}
