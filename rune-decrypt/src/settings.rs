//! Job settings: the value bag a decryption job runs from.
//!
//! Settings are stored as PascalCase JSON so that job files written by
//! earlier tooling load unchanged. Every field is described once in
//! [`JOB_SETTINGS_SCHEMA`], which supplies defaults, validation and the
//! `Name=value` override syntax.

use crate::error::{DecryptError, DecryptResult};
use serde::{Deserialize, Serialize};

/// Separator for list values in `Name=value` overrides
pub const LIST_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// Path relative to the data directory
    Path,
    /// Path that may be left empty to use a built-in source
    OptionalPath,
    Integer,
    Boolean,
    /// Comma separated in overrides, a JSON array on disk
    List,
}

/// One entry of the settings schema
#[derive(Debug, Clone, Copy)]
pub struct SettingSchema {
    pub name: &'static str,
    pub kind: SettingKind,
    pub default: &'static str,
    pub validate: fn(&str) -> Result<(), String>,
}

fn any_value(_: &str) -> Result<(), String> {
    Ok(())
}

fn non_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn positive_integer(value: &str) -> Result<(), String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(_) => Ok(()),
        Err(e) => Err(format!("'{}' is not a positive integer: {}", value, e)),
    }
}

fn sieve_limit(value: &str) -> Result<(), String> {
    match value.trim().parse::<i32>() {
        Ok(limit) if limit >= 3 => Ok(()),
        Ok(limit) => Err(format!("{} leaves no primes to look up", limit)),
        Err(e) => Err(format!("'{}' is not an integer: {}", value, e)),
    }
}

fn boolean(value: &str) -> Result<(), String> {
    value
        .trim()
        .parse::<bool>()
        .map(|_| ())
        .map_err(|_| format!("'{}' is not 'true' or 'false'", value))
}

fn non_empty_list(value: &str) -> Result<(), String> {
    if split_list(value).is_empty() {
        Err("must contain at least one entry".to_string())
    } else {
        Ok(())
    }
}

/// Every job setting in display order
pub static JOB_SETTINGS_SCHEMA: [SettingSchema; 9] = [
    SettingSchema {
        name: "GematriaPath",
        kind: SettingKind::Path,
        default: "GematriaPrimus.txt",
        validate: non_empty,
    },
    SettingSchema {
        name: "NgramWidth",
        kind: SettingKind::Integer,
        default: "3",
        validate: positive_integer,
    },
    SettingSchema {
        name: "NgramStatisticsPath",
        kind: SettingKind::Path,
        default: "ngrams/Trigrams.txt",
        validate: non_empty,
    },
    SettingSchema {
        name: "IsShiftMode",
        kind: SettingKind::Boolean,
        default: "false",
        validate: boolean,
    },
    SettingSchema {
        name: "DatafileDirectory",
        kind: SettingKind::Path,
        default: "sections/",
        validate: non_empty,
    },
    SettingSchema {
        name: "FileNamesToDecrypt",
        kind: SettingKind::List,
        default: "",
        validate: any_value,
    },
    SettingSchema {
        name: "Attempts",
        kind: SettingKind::List,
        default: "p i prime 1 - -,p",
        validate: non_empty_list,
    },
    SettingSchema {
        name: "PiPath",
        kind: SettingKind::OptionalPath,
        default: "Pi.txt",
        validate: any_value,
    },
    SettingSchema {
        name: "SieveLimit",
        kind: SettingKind::Integer,
        default: "900000",
        validate: sieve_limit,
    },
];

/// Look up a schema entry by its JSON name
pub fn schema_entry(name: &str) -> Option<&'static SettingSchema> {
    JOB_SETTINGS_SCHEMA.iter().find(|entry| entry.name == name)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// `NgramStatisticsPath` → `Ngram Statistics Path`
pub fn display_name(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            spaced.push(' ');
        }
        spaced.push(c);
    }
    spaced
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobSettings {
    pub gematria_path: String,
    pub ngram_width: usize,
    pub ngram_statistics_path: String,
    pub is_shift_mode: bool,
    pub datafile_directory: String,
    pub file_names_to_decrypt: Vec<String>,
    pub attempts: Vec<String>,
    /// Empty selects the built-in π digits
    pub pi_path: String,
    pub sieve_limit: i32,
}

impl Default for JobSettings {
    fn default() -> Self {
        let mut settings = JobSettings {
            gematria_path: String::new(),
            ngram_width: 0,
            ngram_statistics_path: String::new(),
            is_shift_mode: false,
            datafile_directory: String::new(),
            file_names_to_decrypt: Vec::new(),
            attempts: Vec::new(),
            pi_path: String::new(),
            sieve_limit: 0,
        };
        for entry in &JOB_SETTINGS_SCHEMA {
            // Schema defaults always pass their own validators.
            let _ = settings.assign(entry.name, entry.default);
        }
        settings
    }
}

impl JobSettings {
    /// Parse a job file. Missing fields take their schema default.
    pub fn from_json(json: &str) -> DecryptResult<Self> {
        let settings: JobSettings = serde_json::from_str(json)
            .map_err(|e| DecryptError::SettingsError(format!("invalid job settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> DecryptResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DecryptError::SettingsError(format!("cannot serialise settings: {}", e)))
    }

    /// Override one setting from its textual form.
    ///
    /// # Errors
    /// Returns `SettingsError` for an unknown name or a value its schema
    /// entry rejects.
    pub fn set(&mut self, name: &str, value: &str) -> DecryptResult<()> {
        let entry = schema_entry(name)
            .ok_or_else(|| DecryptError::SettingsError(format!("unknown setting '{}'", name)))?;
        (entry.validate)(value)
            .map_err(|msg| DecryptError::SettingsError(format!("{}: {}", name, msg)))?;
        self.assign(name, value)
    }

    /// Apply a `Name=value` override
    pub fn apply_override(&mut self, assignment: &str) -> DecryptResult<()> {
        let (name, value) = assignment.split_once('=').ok_or_else(|| {
            DecryptError::SettingsError(format!(
                "override '{}' must have the form Name=value",
                assignment
            ))
        })?;
        self.set(name.trim(), value)
    }

    /// Check every field against its schema entry
    pub fn validate(&self) -> DecryptResult<()> {
        for entry in &JOB_SETTINGS_SCHEMA {
            let value = self.value_of(entry.name).unwrap_or_default();
            (entry.validate)(&value)
                .map_err(|msg| DecryptError::SettingsError(format!("{}: {}", entry.name, msg)))?;
        }
        Ok(())
    }

    /// The textual form of a setting, as accepted by [`JobSettings::set`]
    pub fn value_of(&self, name: &str) -> Option<String> {
        let separator = LIST_SEPARATOR.to_string();
        let value = match name {
            "GematriaPath" => self.gematria_path.clone(),
            "NgramWidth" => self.ngram_width.to_string(),
            "NgramStatisticsPath" => self.ngram_statistics_path.clone(),
            "IsShiftMode" => self.is_shift_mode.to_string(),
            "DatafileDirectory" => self.datafile_directory.clone(),
            "FileNamesToDecrypt" => self.file_names_to_decrypt.join(&separator),
            "Attempts" => self.attempts.join(&separator),
            "PiPath" => self.pi_path.clone(),
            "SieveLimit" => self.sieve_limit.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Human readable `(label, value)` pairs in schema order. Lists are
    /// summarised by their length.
    pub fn describe(&self) -> Vec<(String, String)> {
        JOB_SETTINGS_SCHEMA
            .iter()
            .map(|entry| {
                let value = match entry.name {
                    "FileNamesToDecrypt" => format!("{} file(s)", self.file_names_to_decrypt.len()),
                    "Attempts" => format!("{} attempt(s)", self.attempts.len()),
                    name => self.value_of(name).unwrap_or_default(),
                };
                (display_name(entry.name), value)
            })
            .collect()
    }

    fn assign(&mut self, name: &str, value: &str) -> DecryptResult<()> {
        let invalid = |e: String| {
            DecryptError::SettingsError(format!("{}: invalid value '{}': {}", name, value, e))
        };
        match name {
            "GematriaPath" => self.gematria_path = value.to_string(),
            "NgramWidth" => {
                self.ngram_width = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| invalid(e.to_string()))?
            }
            "NgramStatisticsPath" => self.ngram_statistics_path = value.to_string(),
            "IsShiftMode" => {
                self.is_shift_mode = value
                    .trim()
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?
            }
            "DatafileDirectory" => self.datafile_directory = value.to_string(),
            "FileNamesToDecrypt" => self.file_names_to_decrypt = split_list(value),
            "Attempts" => self.attempts = split_list(value),
            "PiPath" => self.pi_path = value.to_string(),
            "SieveLimit" => {
                self.sieve_limit = value
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| invalid(e.to_string()))?
            }
            _ => {
                return Err(DecryptError::SettingsError(format!("unknown setting '{}'", name)));
            }
        }
        Ok(())
    }
}
