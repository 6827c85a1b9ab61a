//! Formula-search cryptanalysis for index-based substitution ciphers
//!
//! Each rune of a cipher text is mapped to a new gematria index by a postfix
//! formula. The correct formula is unknown, so this crate enumerates every
//! formula a small grammar can produce, applies each one to the document
//! and ranks the outputs with an n-gram language model.
//!
//! # Workflow Example
//!
//! ```
//! use rune_decrypt::{
//!     Decryptor, Document, Gematria, GrammarCompiler, LanguageModel, Maths, NoProgress,
//!     TokenPools, TranslationOutcome,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Load the tables
//! let gematria = Gematria::parse("A 0 2 A\nB 1 3 B\nC 2 5 C\nD 3 7 D\nE 4 11 E\nF 5 13 F\n")?;
//! let model = LanguageModel::parse("AB 5\nBC 4\nCD 3\nDE 2\nEF 1\n", 2, ' ')?;
//! let maths = Maths::with_builtin_pi(1000);
//!
//! // 2. Compile the attempts
//! let pools = TokenPools::from_selection(&["+", "-", "p", "i"])?;
//! let attempts = GrammarCompiler::from_sources(pools, "<decryption>::=<single><single><op>", "")?
//!     .compile()?
//!     .to_formulas();
//!
//! // 3. Rank them against a document
//! let decryptor = Decryptor::new(gematria, maths, model, false);
//! let document = Document::parse("AAAAAA")?;
//! match decryptor.attempt(&attempts, &document, &mut NoProgress) {
//!     TranslationOutcome::Found(candidate) => assert_eq!(candidate.formula, "p i +"),
//!     TranslationOutcome::NoAcceptableResult => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

pub mod decryptor;
pub mod error;
pub mod evaluator;
pub mod fitness;
pub mod gematria;
pub mod grammar;
pub mod loader;
pub mod maths;
pub mod settings;


// Re-export main types for convenient access
pub use decryptor::{
    Candidate, Decryptor, Document, NoProgress, ProgressSink, SKIPS_PREFIX, TranslationOutcome,
};
pub use error::{DecryptError, DecryptResult, EvalError};
pub use evaluator::{Evaluator, Formula, Token, TokenCategory, supported_tokens};
pub use fitness::{LanguageModel, is_diverse, sanitise};
pub use gematria::{Gematria, RuneDefinition};
pub use grammar::{
    AttemptSet, DedupOptions, EquivalenceProbe, GrammarCompiler, Optimiser, SampledProbe,
    TokenPools, eliminate_equivalent,
};
pub use maths::Maths;
pub use settings::{JOB_SETTINGS_SCHEMA, JobSettings, SettingKind, SettingSchema};
