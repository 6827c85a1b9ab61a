//! Whole-document translation: every attempt, every shift, best score wins.

use crate::error::{DecryptError, DecryptResult, EvalError};
use crate::evaluator::{Evaluator, Formula};
use crate::fitness::{self, LanguageModel};
use crate::gematria::{Gematria, RuneDefinition};
use crate::maths::Maths;
use std::collections::BTreeSet;

/// Lines starting with this word declare positions that pass through
pub const SKIPS_PREFIX: &str = "skips";

/// A cipher text split into lines, with its declared skip positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
    skips: BTreeSet<usize>,
}

impl Document {
    pub fn parse(source: &str) -> DecryptResult<Self> {
        Document::from_lines(source.lines().map(str::to_string).collect())
    }

    /// Build a document from its lines.
    ///
    /// The first `skips` line may list comma or space separated positions,
    /// counted over evaluated runes only. Every `skips` line is excluded
    /// from the translated content.
    pub fn from_lines(lines: Vec<String>) -> DecryptResult<Self> {
        let skips = match lines.iter().find(|line| line.starts_with(SKIPS_PREFIX)) {
            Some(line) => parse_skips(&line[SKIPS_PREFIX.len()..])?,
            None => BTreeSet::new(),
        };
        Ok(Document { lines, skips })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn skips(&self) -> &BTreeSet<usize> {
        &self.skips
    }

    fn content_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|line| !line.starts_with(SKIPS_PREFIX))
    }
}

fn parse_skips(declaration: &str) -> DecryptResult<BTreeSet<usize>> {
    declaration
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<usize>().map_err(|e| {
                DecryptError::DocumentError(format!("invalid skip position '{}': {}", entry, e))
            })
        })
        .collect()
}

/// Receives the fraction of attempts processed, after each attempt
pub trait ProgressSink {
    fn report(&mut self, fraction: f64);
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn report(&mut self, fraction: f64) {
        self(fraction)
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _fraction: f64) {}
}

/// The best scoring translation of a document
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub formula: String,
    pub shift: usize,
    pub score: f64,
    pub text: String,
    /// Skip positions declared by the document
    pub skips: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    Found(Candidate),
    NoAcceptableResult,
}

/// One output unit of a translated document, before shifting
#[derive(Debug)]
enum Piece<'g> {
    Literal(char),
    LineBreak,
    /// A skipped rune, emitted as its own plaintext
    Passthrough(&'g RuneDefinition),
    /// A computed index into the gematria table
    Computed(usize),
}

/// Applies attempts to documents and keeps the best scoring result
#[derive(Debug, Clone)]
pub struct Decryptor {
    gematria: Gematria,
    maths: Maths,
    model: LanguageModel,
    shift_mode: bool,
}

impl Decryptor {
    pub fn new(gematria: Gematria, maths: Maths, model: LanguageModel, shift_mode: bool) -> Self {
        Decryptor {
            gematria,
            maths,
            model,
            shift_mode,
        }
    }

    pub fn gematria(&self) -> &Gematria {
        &self.gematria
    }

    pub fn maths(&self) -> &Maths {
        &self.maths
    }

    pub fn model(&self) -> &LanguageModel {
        &self.model
    }

    pub fn shift_mode(&self) -> bool {
        self.shift_mode
    }

    /// Number of cyclic shifts tried per attempt
    pub fn shift_count(&self) -> usize {
        if self.shift_mode {
            self.gematria.len()
        } else {
            1
        }
    }

    /// Translate `document` with a single attempt and shift
    pub fn render(
        &self,
        formula: &Formula,
        document: &Document,
        shift: usize,
    ) -> Result<String, EvalError> {
        let mut evaluator = Evaluator::new(&self.maths);
        let pieces = self.translate(formula, document, &mut evaluator)?;
        Ok(self.assemble(&pieces, shift))
    }

    /// Try every attempt (and every shift in shift mode) against `document`.
    ///
    /// An attempt that fails to evaluate on any rune is dropped for this
    /// document. A candidate replaces the current best only when it scores
    /// strictly higher and its sanitised text is diverse enough, so ties keep
    /// the earlier attempt.
    pub fn attempt(
        &self,
        formulas: &[Formula],
        document: &Document,
        progress: &mut dyn ProgressSink,
    ) -> TranslationOutcome {
        let mut evaluator = Evaluator::new(&self.maths);
        let mut best: Option<Candidate> = None;
        let mut best_score = f64::NEG_INFINITY;
        let mut rejected = 0usize;

        for (i, formula) in formulas.iter().enumerate() {
            match self.translate(formula, document, &mut evaluator) {
                Ok(pieces) => {
                    for shift in 0..self.shift_count() {
                        let text = self.assemble(&pieces, shift);
                        let sanitised = fitness::sanitise(&text);
                        let score = self.model.score_sanitised(&sanitised);

                        if score > best_score && fitness::is_diverse(&sanitised) {
                            best_score = score;
                            best = Some(Candidate {
                                formula: formula.text().to_string(),
                                shift,
                                score,
                                text,
                                skips: document.skips().iter().copied().collect(),
                            });
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    tracing::trace!(formula = %formula, error = %e, "attempt rejected");
                }
            }

            progress.report((i + 1) as f64 / formulas.len() as f64);
        }

        tracing::debug!(
            attempts = formulas.len(),
            rejected,
            found = best.is_some(),
            "document attempted"
        );

        match best {
            Some(candidate) => TranslationOutcome::Found(candidate),
            None => TranslationOutcome::NoAcceptableResult,
        }
    }

    /// Evaluate every rune of the document once
    fn translate(
        &self,
        formula: &Formula,
        document: &Document,
        evaluator: &mut Evaluator<'_>,
    ) -> Result<Vec<Piece<'_>>, EvalError> {
        let mut pieces = Vec::new();
        let mut pending_skips = document.skips().clone();
        let mut position = 0usize;
        let mut seeded = false;
        let Some(mut previous) = self.gematria.by_index(0) else {
            return Ok(pieces);
        };

        for line in document.content_lines() {
            if !seeded {
                let first = fitness::sanitise(line).trim().chars().next();
                if let Some(seed) = first.and_then(|c| self.gematria.by_rune(c)) {
                    previous = seed;
                    seeded = true;
                }
            }

            for c in line.chars() {
                let Some(current) = self.gematria.by_rune(c) else {
                    pieces.push(Piece::Literal(c));
                    continue;
                };

                if pending_skips.remove(&position) {
                    pieces.push(Piece::Passthrough(current));
                    continue;
                }

                let index = evaluator.target_index(
                    formula,
                    current,
                    previous,
                    position as i32,
                    self.gematria.len(),
                )?;
                pieces.push(Piece::Computed(index));
                previous = current;
                position += 1;
            }

            pieces.push(Piece::LineBreak);
        }

        Ok(pieces)
    }

    fn assemble(&self, pieces: &[Piece<'_>], shift: usize) -> String {
        let size = self.gematria.len();
        let mut text = String::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                Piece::Literal(c) => text.push(*c),
                Piece::LineBreak => text.push('\n'),
                Piece::Passthrough(rune) => text.push_str(&rune.plaintext),
                Piece::Computed(index) => {
                    if let Some(definition) = self.gematria.by_index((index + shift) % size) {
                        text.push_str(&definition.plaintext);
                    }
                }
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC: &str = "A 0 2 A\nB 1 3 B\nC 2 5 C\n";
    const TEN: &str = "A 0 2 A\nB 1 3 B\nC 2 5 C\nD 3 7 D\nE 4 11 E\n\
                       F 5 13 F\nG 6 17 G\nH 7 19 H\nI 8 23 I\nJ 9 29 J\n";
    const BIGRAMS: &str = "AB 40\nBC 30\nCD 20\nDE 10\nEF 5\n";

    fn decryptor(table: &str, shift_mode: bool) -> Decryptor {
        Decryptor::new(
            Gematria::parse(table).unwrap(),
            Maths::with_builtin_pi(1000),
            LanguageModel::parse(BIGRAMS, 2, ' ').unwrap(),
            shift_mode,
        )
    }

    fn formulas(texts: &[&str]) -> Vec<Formula> {
        texts.iter().map(|t| Formula::new(*t)).collect()
    }

    // ========== Documents ==========

    #[test]
    fn test_document_skips() {
        let document = Document::parse("skips 1, 3\nABC\nskips 7\n").unwrap();
        assert_eq!(document.lines().len(), 3);
        assert_eq!(
            document.skips().iter().copied().collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(document.content_lines().collect::<Vec<_>>(), vec!["ABC"]);

        let spaced = Document::parse("skips 4 2\n").unwrap();
        assert_eq!(
            spaced.skips().iter().copied().collect::<Vec<_>>(),
            vec![2, 4]
        );

        assert!(Document::parse("skips\nABC").unwrap().skips().is_empty());
        assert!(Document::parse("ABC").unwrap().skips().is_empty());
    }

    #[test]
    fn test_bad_skip_entry_is_fatal() {
        for source in ["skips 1,x", "skips -1"] {
            assert!(
                matches!(Document::parse(source), Err(DecryptError::DocumentError(_))),
                "expected failure for {:?}",
                source
            );
        }
    }

    // ========== Rendering ==========

    #[test]
    fn test_render_with_shift() {
        let decryptor = decryptor(ABC, true);
        let document = Document::parse("ABC").unwrap();
        let formula = Formula::new("p");
        assert_eq!(decryptor.render(&formula, &document, 0).unwrap(), "ABC\n");
        assert_eq!(decryptor.render(&formula, &document, 1).unwrap(), "BCA\n");
    }

    #[test]
    fn test_skipped_rune_does_not_advance_position() {
        let decryptor = decryptor(ABC, false);
        let document = Document::parse("skips 1\nABC").unwrap();
        assert_eq!(
            decryptor.render(&Formula::new("i"), &document, 0).unwrap(),
            "ABB\n"
        );
    }

    #[test]
    fn test_skipped_rune_is_not_shifted() {
        let decryptor = decryptor(ABC, true);
        let document = Document::parse("skips 1\nABC").unwrap();
        assert_eq!(
            decryptor.render(&Formula::new("p"), &document, 1).unwrap(),
            "BBA\n"
        );
    }

    #[test]
    fn test_non_alphabet_characters_pass_through() {
        let decryptor = decryptor(ABC, false);
        let document = Document::parse("A-B c\n\nC").unwrap();
        assert_eq!(
            decryptor.render(&Formula::new("p"), &document, 0).unwrap(),
            "A-B c\n\nC\n"
        );
    }

    #[test]
    fn test_previous_rune_seeding() {
        let decryptor = decryptor(ABC, false);
        let formula = Formula::new("prevp");

        let document = Document::parse("  CAB").unwrap();
        assert_eq!(decryptor.render(&formula, &document, 0).unwrap(), "  CCA\n");

        // "x" sanitises to nothing, so seeding waits for the next line
        let document = Document::parse("x\nBA").unwrap();
        assert_eq!(decryptor.render(&formula, &document, 0).unwrap(), "x\nBB\n");

        // a line starting with a non-rune leaves the default seed in place
        // until a later line starts with a rune
        let document = Document::parse("-BA\nCA").unwrap();
        assert_eq!(
            decryptor.render(&formula, &document, 0).unwrap(),
            "-AB\nCC\n"
        );
    }

    #[test]
    fn test_evaluation_failure_rejects_document() {
        let decryptor = decryptor(ABC, false);
        let document = Document::parse("ABC").unwrap();
        assert_eq!(
            decryptor.render(&Formula::new("1 p /"), &document, 0),
            Err(EvalError::DivisionByZero)
        );
    }

    // ========== Selection ==========

    #[test]
    fn test_best_attempt_is_selected() {
        let decryptor = decryptor(TEN, false);
        let document = Document::parse("ABCDEF").unwrap();
        let mut fractions: Vec<f64> = Vec::new();

        let outcome = decryptor.attempt(
            &formulas(&["1 p /", "p 1 +", "p"]),
            &document,
            &mut |fraction: f64| fractions.push(fraction),
        );

        match outcome {
            TranslationOutcome::Found(candidate) => {
                assert_eq!(candidate.formula, "p");
                assert_eq!(candidate.shift, 0);
                assert_eq!(candidate.text, "ABCDEF\n");
                assert!(candidate.skips.is_empty());
            }
            other => panic!("Expected Found, got {:?}", other),
        }
        assert_eq!(fractions.len(), 3);
        assert!((fractions[2] - 1.0).abs() < f64::EPSILON);
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_shift_mode_recovers_offset() {
        let decryptor = decryptor(TEN, true);
        let document = Document::parse("ABCDEF").unwrap();

        let outcome = decryptor.attempt(&formulas(&["p 1 +"]), &document, &mut NoProgress);
        match outcome {
            TranslationOutcome::Found(candidate) => {
                assert_eq!(candidate.shift, 9);
                assert_eq!(candidate.text, "ABCDEF\n");
            }
            other => panic!("Expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_ties_keep_earlier_attempt() {
        let decryptor = decryptor(TEN, false);
        let document = Document::parse("ABCDEF").unwrap();
        let outcome = decryptor.attempt(&formulas(&["p", "p 0 +"]), &document, &mut NoProgress);
        match outcome {
            TranslationOutcome::Found(candidate) => assert_eq!(candidate.formula, "p"),
            other => panic!("Expected Found, got {:?}", other),
        }
    }

    #[test]
    fn test_low_diversity_is_not_acceptable() {
        let decryptor = decryptor(TEN, true);
        let document = Document::parse("AB").unwrap();
        assert_eq!(
            decryptor.attempt(&formulas(&["p"]), &document, &mut NoProgress),
            TranslationOutcome::NoAcceptableResult
        );
    }

    #[test]
    fn test_all_attempts_failing() {
        let decryptor = decryptor(TEN, false);
        let document = Document::parse("ABCDEF").unwrap();
        assert_eq!(
            decryptor.attempt(&formulas(&["1 p /", "p +"]), &document, &mut NoProgress),
            TranslationOutcome::NoAcceptableResult
        );
    }
}
