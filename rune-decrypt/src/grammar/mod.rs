//! Grammar compiler: production rules → ordered attempt list.
//!
//! Compilation resolves rules strictly in declaration order, seeding the
//! token nonterminals from the enabled pools. The result is an
//! [`AttemptSet`], a lazy view over the full cartesian expansion of
//! `<decryption>` with logical replacements applied on the way out.
//!
//! ```
//! use rune_decrypt::grammar::{GrammarCompiler, TokenPools};
//!
//! let pools = TokenPools::from_selection(&["+", "-", "p"]).unwrap();
//! let compiler =
//!     GrammarCompiler::from_sources(pools, "<decryption>::=<single><single><op>", "").unwrap();
//! let attempts = compiler.compile().unwrap();
//!
//! assert_eq!(attempts.iter().collect::<Vec<_>>(), vec!["p p +", "p p -"]);
//! ```
//!
//! Factors are joined in the order the rule declares them, so an infix-shaped
//! rule such as `<single><op><single>` yields `"p + p"`, which fails to
//! evaluate as postfix.

pub mod dedup;
pub mod expansion;
pub mod optimiser;
pub mod rules;

pub use dedup::{
    DedupOptions, EquivalenceProbe, Fingerprint, SamplePoint, SampledProbe, eliminate_equivalent,
};
pub use expansion::{Alternative, Production};
pub use optimiser::Optimiser;
pub use rules::{ProductionRule, parse_rules};

use crate::error::{DecryptError, DecryptResult};
use crate::evaluator::{Formula, TokenCategory, supported_tokens};
use std::collections::HashMap;
use std::sync::Arc;

/// Nonterminal whose expansion is the attempt list
pub const ROOT_NONTERMINAL: &str = "decryption";

/// Enabled grammar tokens, split by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPools {
    pub operations: Vec<String>,
    pub singles: Vec<String>,
    pub specials: Vec<String>,
}

impl TokenPools {
    /// Every supported token
    pub fn all() -> Self {
        let tokens: Vec<&str> = supported_tokens().into_iter().map(|(t, _)| t).collect();
        // The registry only yields known tokens.
        TokenPools::from_selection(&tokens).unwrap_or_default()
    }

    /// Build pools from a token selection, keeping selection order within
    /// each category. Repeated tokens are kept once.
    pub fn from_selection<S: AsRef<str>>(selection: &[S]) -> DecryptResult<Self> {
        let registry = supported_tokens();
        let mut pools = TokenPools::default();

        for token in selection {
            let token = token.as_ref();
            let category = registry
                .iter()
                .find(|(symbol, _)| *symbol == token)
                .map(|(_, category)| *category)
                .ok_or_else(|| {
                    DecryptError::GrammarError(format!("unsupported grammar token '{}'", token))
                })?;

            let pool = match category {
                TokenCategory::Operation => &mut pools.operations,
                TokenCategory::Single => &mut pools.singles,
                TokenCategory::Special => &mut pools.specials,
            };
            if !pool.iter().any(|t| t == token) {
                pool.push(token.to_string());
            }
        }

        Ok(pools)
    }

    fn seeds(&self) -> [(&'static str, &[String]); 4] {
        [
            ("op", &self.operations),
            ("operation", &self.operations),
            ("single", &self.singles),
            ("special", &self.specials),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct GrammarCompiler {
    pools: TokenPools,
    rules: Vec<ProductionRule>,
    optimiser: Optimiser,
}

impl GrammarCompiler {
    pub fn new(pools: TokenPools, rules: Vec<ProductionRule>, optimiser: Optimiser) -> Self {
        GrammarCompiler {
            pools,
            rules,
            optimiser,
        }
    }

    /// Parse the rule and replacement texts and build a compiler
    pub fn from_sources(
        pools: TokenPools,
        rules_source: &str,
        replacements_source: &str,
    ) -> DecryptResult<Self> {
        Ok(GrammarCompiler::new(
            pools,
            parse_rules(rules_source)?,
            Optimiser::parse(replacements_source)?,
        ))
    }

    /// Resolve every rule and return the attempts of `<decryption>`.
    ///
    /// A nonterminal is defined once: the token nonterminals come from the
    /// pools, and a later rule with an already defined head is dropped with a
    /// warning. A rule may reference itself, which stands for the
    /// alternatives accumulated before the reference.
    ///
    /// # Errors
    /// - A reference to a nonterminal that is not defined yet
    /// - A self-reference in the first alternative
    /// - No `<decryption>` rule
    /// - An attempt count that overflows `usize`
    pub fn compile(&self) -> DecryptResult<AttemptSet> {
        let mut resolved: HashMap<String, Arc<Production>> = HashMap::new();
        for (name, tokens) in self.pools.seeds() {
            resolved.insert(
                name.to_string(),
                Arc::new(Production::Terminals(tokens.to_vec())),
            );
        }

        for rule in &self.rules {
            if resolved.contains_key(&rule.name) {
                tracing::warn!(
                    nonterminal = %rule.name,
                    "nonterminal already defined; ignoring redefinition"
                );
                continue;
            }

            let mut alternatives: Vec<Alternative> = Vec::with_capacity(rule.alternatives.len());
            for references in &rule.alternatives {
                let mut factors = Vec::with_capacity(references.len());
                for reference in references {
                    let factor = if *reference == rule.name {
                        if alternatives.is_empty() {
                            return Err(DecryptError::GrammarError(format!(
                                "<{}> references itself before any alternative is defined",
                                rule.name
                            )));
                        }
                        Arc::new(Production::from_alternatives(alternatives.clone())?)
                    } else {
                        resolved.get(reference).cloned().ok_or_else(|| {
                            DecryptError::GrammarError(format!(
                                "<{}> references undefined nonterminal <{}>",
                                rule.name, reference
                            ))
                        })?
                    };
                    factors.push(factor);
                }
                alternatives.push(Alternative::new(factors)?);
            }

            let production = Production::from_alternatives(alternatives)?;
            tracing::debug!(
                nonterminal = %rule.name,
                attempts = production.len(),
                "resolved nonterminal"
            );
            resolved.insert(rule.name.clone(), Arc::new(production));
        }

        let root = resolved.remove(ROOT_NONTERMINAL).ok_or_else(|| {
            DecryptError::GrammarError(format!("no <{}> rule defined", ROOT_NONTERMINAL))
        })?;

        tracing::info!(attempts = root.len(), "generated decryption attempts");
        Ok(AttemptSet {
            root,
            optimiser: Arc::new(self.optimiser.clone()),
        })
    }
}

/// The ordered, optimised attempt list of a compiled grammar.
///
/// Attempts are decoded on demand. Cloning is cheap and every call to
/// [`AttemptSet::iter`] restarts from the first attempt.
#[derive(Debug, Clone)]
pub struct AttemptSet {
    root: Arc<Production>,
    optimiser: Arc<Optimiser>,
}

impl AttemptSet {
    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The optimised attempt at `index`
    pub fn get(&self, index: usize) -> Option<String> {
        self.root
            .item(index)
            .map(|attempt| self.optimiser.optimise(&attempt))
    }

    pub fn iter(&self) -> Attempts<'_> {
        Attempts {
            set: self,
            next: 0,
            buffer: String::new(),
        }
    }

    /// Tokenise every attempt
    pub fn to_formulas(&self) -> Vec<Formula> {
        self.iter().map(Formula::new).collect()
    }
}

impl<'a> IntoIterator for &'a AttemptSet {
    type Item = String;
    type IntoIter = Attempts<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over an [`AttemptSet`] in enumeration order
#[derive(Debug)]
pub struct Attempts<'a> {
    set: &'a AttemptSet,
    next: usize,
    buffer: String,
}

impl Iterator for Attempts<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.set.len() {
            return None;
        }
        self.buffer.clear();
        self.set.root.write_item(self.next, &mut self.buffer);
        self.next += 1;
        Some(self.set.optimiser.optimise(&self.buffer))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Attempts<'_> {}
