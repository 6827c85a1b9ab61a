//! Postfix decryption grammar: token registry, compiled formulas and the
//! stack machine that turns one formula plus a rune context into an index.
//!
//! # Example
//!
//! ```
//! use rune_decrypt::evaluator::{Evaluator, Formula};
//! use rune_decrypt::gematria::RuneDefinition;
//! use rune_decrypt::maths::Maths;
//!
//! let maths = Maths::with_builtin_pi(200);
//! let rune = RuneDefinition { rune: 'ᚳ', index: 5, prime: 13, plaintext: "C".to_string() };
//! let mut evaluator = Evaluator::new(&maths);
//!
//! let formula = Formula::new("p i +");
//! assert_eq!(evaluator.evaluate(&formula, &rune, &rune, 10), Ok(15));
//! ```

use crate::error::EvalError;
use crate::gematria::RuneDefinition;
use crate::maths::{self, Maths};

/// Which grammar pool a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCategory {
    /// Binary operators `(a, b) -> a ⊙ b`
    Operation,
    /// Context functions of (rune, previous rune, position)
    Single,
    /// Unary functions applied to the top of the stack
    Special,
}

impl TokenCategory {
    pub fn label(self) -> &'static str {
        match self {
            TokenCategory::Operation => "decryption operation",
            TokenCategory::Single => "decryption single",
            TokenCategory::Special => "decryption special",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Xor,
    Divide,
    Remainder,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Xor,
        Operation::Divide,
        Operation::Remainder,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Xor => "^",
            Operation::Divide => "/",
            Operation::Remainder => "%",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Operation::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Apply with wrapping `i32` arithmetic. Division and remainder truncate
    /// toward zero.
    pub fn apply(self, a: i32, b: i32) -> Result<i32, EvalError> {
        match self {
            Operation::Add => Ok(a.wrapping_add(b)),
            Operation::Subtract => Ok(a.wrapping_sub(b)),
            Operation::Multiply => Ok(a.wrapping_mul(b)),
            Operation::Xor => Ok(a ^ b),
            Operation::Divide if b == 0 => Err(EvalError::DivisionByZero),
            Operation::Divide => Ok(a.wrapping_div(b)),
            Operation::Remainder if b == 0 => Err(EvalError::DivisionByZero),
            Operation::Remainder => Ok(a.wrapping_rem(b)),
        }
    }
}

/// Functions of the rune being decrypted and its context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Single {
    Index,
    Prime,
    PreviousIndex,
    PreviousPrime,
    Position,
}

impl Single {
    pub const ALL: [Single; 5] = [
        Single::Index,
        Single::Prime,
        Single::PreviousIndex,
        Single::PreviousPrime,
        Single::Position,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Single::Index => "p",
            Single::Prime => "pr",
            Single::PreviousIndex => "prevp",
            Single::PreviousPrime => "prevpr",
            Single::Position => "i",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Single::ALL.into_iter().find(|s| s.symbol() == symbol)
    }

    pub fn apply(self, current: &RuneDefinition, previous: &RuneDefinition, position: i32) -> i32 {
        match self {
            Single::Index => current.index as i32,
            Single::Prime => current.prime,
            Single::PreviousIndex => previous.index as i32,
            Single::PreviousPrime => previous.prime,
            Single::Position => position,
        }
    }
}

/// Unary number-theoretic functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Prime,
    Totient,
    Pi,
}

impl Special {
    pub const ALL: [Special; 3] = [Special::Prime, Special::Totient, Special::Pi];

    pub fn symbol(self) -> &'static str {
        match self {
            Special::Prime => "prime",
            Special::Totient => "φ",
            Special::Pi => "π",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Special::ALL.into_iter().find(|s| s.symbol() == symbol)
    }

    pub fn apply(self, argument: i32, maths: &Maths) -> Result<i32, EvalError> {
        let value = match self {
            Special::Prime => maths.prime(argument),
            Special::Totient => Some(maths::totient(argument)),
            Special::Pi => maths.pi(argument),
        };
        value.ok_or_else(|| EvalError::OutOfRange {
            function: self.symbol().to_string(),
            argument,
        })
    }
}

/// Every supported grammar token with its category, in registry order
pub fn supported_tokens() -> Vec<(&'static str, TokenCategory)> {
    let operations = Operation::ALL
        .into_iter()
        .map(|op| (op.symbol(), TokenCategory::Operation));
    let singles = Single::ALL
        .into_iter()
        .map(|s| (s.symbol(), TokenCategory::Single));
    let specials = Special::ALL
        .into_iter()
        .map(|s| (s.symbol(), TokenCategory::Special));
    operations.chain(singles).chain(specials).collect()
}

/// A classified formula token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(i32),
    Single(Single),
    Special(Special),
    Operation(Operation),
    Unknown(String),
}

impl Token {
    pub fn classify(word: &str) -> Self {
        if let Some(single) = Single::from_symbol(word) {
            Token::Single(single)
        } else if let Some(special) = Special::from_symbol(word) {
            Token::Special(special)
        } else if let Some(operation) = Operation::from_symbol(word) {
            Token::Operation(operation)
        } else if let Ok(value) = word.parse::<i32>() {
            Token::Literal(value)
        } else {
            Token::Unknown(word.to_string())
        }
    }

    fn word(&self) -> String {
        match self {
            Token::Literal(value) => value.to_string(),
            Token::Single(single) => single.symbol().to_string(),
            Token::Special(special) => special.symbol().to_string(),
            Token::Operation(operation) => operation.symbol().to_string(),
            Token::Unknown(word) => word.clone(),
        }
    }
}

/// A postfix decryption attempt, tokenised once and shared read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    text: String,
    tokens: Vec<Token>,
}

impl Formula {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = text.split_whitespace().map(Token::classify).collect();
        Formula { text, tokens }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl From<&str> for Formula {
    fn from(text: &str) -> Self {
        Formula::new(text)
    }
}

/// Stack machine for formula evaluation.
///
/// The operand stack is reused between calls, so evaluating the same
/// formula repeatedly does not allocate.
#[derive(Debug)]
pub struct Evaluator<'m> {
    maths: &'m Maths,
    stack: Vec<i32>,
}

impl<'m> Evaluator<'m> {
    pub fn new(maths: &'m Maths) -> Self {
        Evaluator {
            maths,
            stack: Vec::with_capacity(16),
        }
    }

    /// Evaluate `formula` for one rune and return the raw (unreduced) index.
    ///
    /// Singles resolve against `current`, `previous` and `position`. Operators
    /// take the most recently pushed operand as their right-hand side.
    pub fn evaluate(
        &mut self,
        formula: &Formula,
        current: &RuneDefinition,
        previous: &RuneDefinition,
        position: i32,
    ) -> Result<i32, EvalError> {
        self.stack.clear();

        for token in &formula.tokens {
            match token {
                Token::Literal(value) => self.stack.push(*value),
                Token::Single(single) => self.stack.push(single.apply(current, previous, position)),
                Token::Special(special) => {
                    let argument = self.pop(token)?;
                    self.stack.push(special.apply(argument, self.maths)?);
                }
                Token::Operation(operation) => {
                    let b = self.pop(token)?;
                    let a = self.pop(token)?;
                    self.stack.push(operation.apply(a, b)?);
                }
                Token::Unknown(word) => return Err(EvalError::UnknownToken(word.clone())),
            }
        }

        match self.stack.as_slice() {
            [value] => Ok(*value),
            other => Err(EvalError::UnbalancedStack { depth: other.len() }),
        }
    }

    /// Evaluate and reduce into `0..alphabet_size` with the non-negative modulo
    pub fn target_index(
        &mut self,
        formula: &Formula,
        current: &RuneDefinition,
        previous: &RuneDefinition,
        position: i32,
        alphabet_size: usize,
    ) -> Result<usize, EvalError> {
        let raw = self.evaluate(formula, current, previous, position)?;
        Ok(maths::modulo(raw, alphabet_size as i32) as usize)
    }

    fn pop(&mut self, token: &Token) -> Result<i32, EvalError> {
        self.stack
            .pop()
            .ok_or_else(|| EvalError::StackUnderflow { token: token.word() })
    }
}
