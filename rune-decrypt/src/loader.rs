//! File loading for every table, rule set and document a job reads.
//!
//! Each loader reads the whole file and hands the text to the matching
//! parser. Read failures surface as `IoError` naming the path; parse
//! failures keep the parser's own error variant.

use crate::decryptor::Document;
use crate::error::{DecryptError, DecryptResult};
use crate::fitness::LanguageModel;
use crate::gematria::Gematria;
use crate::grammar::{Optimiser, ProductionRule, parse_rules};
use crate::maths::{Maths, PI_DIGITS};
use crate::settings::JobSettings;
use std::fs;
use std::path::Path;

/// Read a UTF-8 file into a string
pub fn read_text(path: &Path) -> DecryptResult<String> {
    fs::read_to_string(path).map_err(|e| {
        DecryptError::IoError(format!("Failed to read file '{}': {}", path.display(), e))
    })
}

pub fn load_gematria(path: &Path) -> DecryptResult<Gematria> {
    let gematria = Gematria::parse(&read_text(path)?)?;
    tracing::debug!(path = %path.display(), runes = gematria.len(), "loaded gematria");
    Ok(gematria)
}

pub fn load_rules(path: &Path) -> DecryptResult<Vec<ProductionRule>> {
    parse_rules(&read_text(path)?)
}

pub fn load_replacements(path: &Path) -> DecryptResult<Optimiser> {
    Optimiser::parse(&read_text(path)?)
}

/// Load n-gram statistics separated by a single space
pub fn load_language_model(path: &Path, width: usize) -> DecryptResult<LanguageModel> {
    let model = LanguageModel::parse(&read_text(path)?, width, ' ')?;
    tracing::debug!(path = %path.display(), ngrams = model.len(), "loaded n-gram statistics");
    Ok(model)
}

/// Build the prime and π tables. `None` uses the built-in π digits.
pub fn load_maths(pi_path: Option<&Path>, sieve_limit: i32) -> DecryptResult<Maths> {
    match pi_path {
        Some(path) => Maths::generate(sieve_limit, &read_text(path)?),
        None => Maths::generate(sieve_limit, PI_DIGITS),
    }
}

pub fn load_document(path: &Path) -> DecryptResult<Document> {
    Document::parse(&read_text(path)?)
}

pub fn load_job_settings(path: &Path) -> DecryptResult<JobSettings> {
    JobSettings::from_json(&read_text(path)?)
}

/// Write settings as pretty-printed JSON
pub fn save_job_settings(path: &Path, settings: &JobSettings) -> DecryptResult<()> {
    fs::write(path, settings.to_json()?).map_err(|e| {
        DecryptError::IoError(format!("Failed to write file '{}': {}", path.display(), e))
    })?;
    tracing::info!(path = %path.display(), "saved job settings");
    Ok(())
}
