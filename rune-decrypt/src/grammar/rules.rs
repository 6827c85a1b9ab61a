//! Production rule parsing: `<Name>::=<a><b>|<c>`

use crate::error::{DecryptError, DecryptResult};
use crate::gematria::COMMENT_DELIMITER;
use regex::Regex;
use std::sync::LazyLock;

static HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([^<>|]+)>$").expect("head pattern is valid"));
static ALTERNATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:<[^<>|]+>)+$").expect("alternative pattern is valid"));
static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>|]+)>").expect("reference pattern is valid"));

/// One production rule: a nonterminal and its ordered alternatives, each an
/// ordered list of referenced nonterminal names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRule {
    pub name: String,
    pub alternatives: Vec<Vec<String>>,
}

impl ProductionRule {
    /// Parse a single rule. Whitespace anywhere in the rule is ignored.
    pub fn parse(rule: &str) -> DecryptResult<Self> {
        let compact: String = rule.chars().filter(|c| !c.is_whitespace()).collect();

        let (head, body) = compact.split_once("::=").ok_or_else(|| {
            DecryptError::GrammarError(format!("rule '{}' has no '::='", rule.trim()))
        })?;
        if body.contains("::=") {
            return Err(DecryptError::GrammarError(format!(
                "rule '{}' has more than one '::='",
                rule.trim()
            )));
        }

        let name = HEAD
            .captures(head)
            .map(|cap| cap[1].to_string())
            .ok_or_else(|| {
                DecryptError::GrammarError(format!(
                    "rule head '{}' must be a single <nonterminal>",
                    head
                ))
            })?;

        let mut alternatives = Vec::new();
        for alternative in body.split('|') {
            if !ALTERNATIVE.is_match(alternative) {
                return Err(DecryptError::GrammarError(format!(
                    "alternative '{}' of <{}> must be a sequence of <nonterminal> references",
                    alternative, name
                )));
            }
            alternatives.push(
                REFERENCE
                    .captures_iter(alternative)
                    .map(|cap| cap[1].to_string())
                    .collect(),
            );
        }

        Ok(ProductionRule { name, alternatives })
    }
}

/// Parse a production rule file, skipping `//` comments and blank lines
pub fn parse_rules(source: &str) -> DecryptResult<Vec<ProductionRule>> {
    source
        .lines()
        .filter(|line| !line.trim_start().starts_with(COMMENT_DELIMITER))
        .filter(|line| !line.trim().is_empty())
        .map(ProductionRule::parse)
        .collect()
}
