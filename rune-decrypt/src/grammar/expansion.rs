//! Lazy cartesian expansion of production rules.
//!
//! A nonterminal is kept as a tree of alternatives whose factors point at
//! previously resolved nonterminals. Nothing is materialised: the i-th
//! string of a production is decoded on demand by mixed-radix indexing, so
//! a search space of billions of attempts costs no more memory than the
//! rules themselves.
//!
//! Enumeration order matches an iterative cartesian product: alternatives in
//! declaration order, and within an alternative the rightmost factor varies
//! fastest.
//!
//! ```text
//! <decryption> ::= <single> <op> | <single>
//!   single = [p, i], op = [+, -]
//!
//! index 0 → "p +"   (alternative 0, factors [0, 0])
//! index 1 → "p -"   (alternative 0, factors [0, 1])
//! index 2 → "i +"
//! index 3 → "i -"
//! index 4 → "p"     (alternative 1)
//! index 5 → "i"
//! ```

use crate::error::{DecryptError, DecryptResult};
use std::sync::Arc;

/// The resolved candidate list of one nonterminal
#[derive(Debug)]
pub enum Production {
    /// Token pool seeded from the enabled grammar tokens
    Terminals(Vec<String>),
    /// Concatenation of every alternative's cartesian product
    Alternatives { alternatives: Vec<Alternative>, len: usize },
}

/// One alternative: the cartesian product of its factors
#[derive(Debug, Clone)]
pub struct Alternative {
    factors: Vec<Arc<Production>>,
    /// `strides[j]` is the product of the lengths of factors right of `j`
    strides: Vec<usize>,
    len: usize,
}

impl Alternative {
    /// # Errors
    /// Returns `GrammarError` when the product size overflows `usize`.
    pub fn new(factors: Vec<Arc<Production>>) -> DecryptResult<Self> {
        let mut strides = vec![1usize; factors.len()];
        let mut len = 1usize;
        for (j, factor) in factors.iter().enumerate().rev() {
            strides[j] = len;
            len = len
                .checked_mul(factor.len())
                .ok_or_else(|| DecryptError::GrammarError("attempt count overflow".to_string()))?;
        }
        Ok(Alternative {
            factors,
            strides,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn write_item(&self, index: usize, out: &mut String) {
        for (j, factor) in self.factors.iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            factor.write_item((index / self.strides[j]) % factor.len(), out);
        }
    }
}

impl Production {
    /// # Errors
    /// Returns `GrammarError` when the total size overflows `usize`.
    pub fn from_alternatives(alternatives: Vec<Alternative>) -> DecryptResult<Self> {
        let mut len = 0usize;
        for alternative in &alternatives {
            len = len
                .checked_add(alternative.len())
                .ok_or_else(|| DecryptError::GrammarError("attempt count overflow".to_string()))?;
        }
        Ok(Production::Alternatives { alternatives, len })
    }

    pub fn len(&self) -> usize {
        match self {
            Production::Terminals(tokens) => tokens.len(),
            Production::Alternatives { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the `index`-th string of this production to `out`.
    ///
    /// `index` must be below [`Production::len`].
    pub fn write_item(&self, index: usize, out: &mut String) {
        match self {
            Production::Terminals(tokens) => out.push_str(&tokens[index]),
            Production::Alternatives { alternatives, .. } => {
                let mut offset = index;
                for alternative in alternatives {
                    if offset < alternative.len() {
                        alternative.write_item(offset, out);
                        return;
                    }
                    offset -= alternative.len();
                }
            }
        }
    }

    /// The `index`-th string, or `None` past the end
    pub fn item(&self, index: usize) -> Option<String> {
        if index >= self.len() {
            return None;
        }
        let mut out = String::new();
        self.write_item(index, &mut out);
        Some(out)
    }
}
