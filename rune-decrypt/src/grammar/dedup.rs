//! Probabilistic elimination of equivalent attempts.
//!
//! Two formulas are treated as equivalent when they produce the same raw
//! values over a random sample of (rune, position) pairs. This is a
//! heuristic, not a proof:
//!
//! - formulas that only differ outside the sampled points are merged even
//!   though they are distinct (false positive);
//! - fingerprints hold raw values before the alphabet modulo, so formulas
//!   that always agree modulo the alphabet size (`p 29 +` and `p` over a
//!   29-rune table) decrypt identically but are kept apart (false negative).
//!
//! The default sample is drawn from entropy, so two runs over the same
//! attempts can keep different formulas. Pass a seed in [`DedupOptions`] for
//! reproducible output.

use crate::evaluator::{Evaluator, Formula};
use crate::gematria::{Gematria, RuneDefinition};
use crate::maths::Maths;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Raw evaluation results over a sample; `None` marks a failed evaluation
pub type Fingerprint = Vec<Option<i32>>;

/// One sampled evaluation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePoint {
    pub rune: RuneDefinition,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOptions {
    pub sample_size: usize,
    /// Positions are drawn from `0..max_position`
    pub max_position: i32,
    /// `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for DedupOptions {
    fn default() -> Self {
        DedupOptions {
            sample_size: 40,
            max_position: 1000,
            seed: None,
        }
    }
}

/// Strategy that reduces a formula to a comparable fingerprint
pub trait EquivalenceProbe {
    fn fingerprint(&self, formula: &Formula, evaluator: &mut Evaluator<'_>) -> Fingerprint;
}

/// Fingerprints a formula by evaluating it at fixed sample points.
///
/// The previous rune for sample `j` is the rune of sample `j - 1`; the
/// first sample is its own predecessor.
#[derive(Debug, Clone)]
pub struct SampledProbe {
    samples: Vec<SamplePoint>,
}

impl SampledProbe {
    pub fn new(samples: Vec<SamplePoint>) -> Self {
        SampledProbe { samples }
    }

    /// Draw a random sample from the gematria table
    pub fn random(gematria: &Gematria, options: &DedupOptions) -> Self {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let definitions = gematria.definitions();
        let mut samples = Vec::with_capacity(options.sample_size);
        if !definitions.is_empty() {
            for _ in 0..options.sample_size {
                let rune = definitions[rng.gen_range(0..definitions.len())].clone();
                let position = rng.gen_range(0..options.max_position.max(1));
                samples.push(SamplePoint { rune, position });
            }
        }

        tracing::debug!(
            samples = samples.len(),
            seeded = options.seed.is_some(),
            "drew equivalence sample"
        );
        SampledProbe { samples }
    }

    pub fn samples(&self) -> &[SamplePoint] {
        &self.samples
    }
}

impl EquivalenceProbe for SampledProbe {
    fn fingerprint(&self, formula: &Formula, evaluator: &mut Evaluator<'_>) -> Fingerprint {
        self.samples
            .iter()
            .enumerate()
            .map(|(j, sample)| {
                let previous = &self.samples[j.saturating_sub(1)].rune;
                evaluator
                    .evaluate(formula, &sample.rune, previous, sample.position)
                    .ok()
            })
            .collect()
    }
}

/// Lazily drop every attempt whose fingerprint matches an earlier one.
///
/// The earliest occurrence of each fingerprint is kept and the input order
/// is preserved. See the module docs for the false positive and false
/// negative cases; with an unseeded [`SampledProbe`] the survivors differ
/// from run to run.
pub fn eliminate_equivalent<'a, I, P>(
    attempts: I,
    probe: &'a P,
    maths: &'a Maths,
) -> impl Iterator<Item = Formula> + 'a
where
    I: IntoIterator<Item = String>,
    I::IntoIter: 'a,
    P: EquivalenceProbe + ?Sized,
{
    let mut evaluator = Evaluator::new(maths);
    let mut seen: HashSet<Fingerprint> = HashSet::new();

    attempts.into_iter().filter_map(move |text| {
        let formula = Formula::new(text);
        let fingerprint = probe.fingerprint(&formula, &mut evaluator);
        if seen.insert(fingerprint) {
            Some(formula)
        } else {
            tracing::trace!(formula = %formula, "dropped equivalent attempt");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Gematria {
        Gematria::parse("A 0 2 A\nB 1 3 B\nC 2 5 C\nD 3 7 D\nE 4 11 E\n").unwrap()
    }

    fn texts(formulas: &[&str]) -> Vec<String> {
        formulas.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_default_options() {
        let options = DedupOptions::default();
        assert_eq!(options.sample_size, 40);
        assert_eq!(options.max_position, 1000);
        assert_eq!(options.seed, None);
    }

    #[test]
    fn test_seeded_sample_is_reproducible() {
        let gematria = table();
        let options = DedupOptions {
            seed: Some(7),
            ..DedupOptions::default()
        };
        let first = SampledProbe::random(&gematria, &options);
        let second = SampledProbe::random(&gematria, &options);
        assert_eq!(first.samples(), second.samples());
        assert_eq!(first.samples().len(), 40);
        assert!(
            first
                .samples()
                .iter()
                .all(|s| (0..1000).contains(&s.position) && gematria.rune_exists(s.rune.rune))
        );
    }

    #[test]
    fn test_equivalent_formulas_are_merged() {
        let gematria = table();
        let maths = Maths::with_builtin_pi(1000);
        let probe = SampledProbe::random(
            &gematria,
            &DedupOptions {
                seed: Some(42),
                ..DedupOptions::default()
            },
        );

        let kept: Vec<String> = eliminate_equivalent(
            texts(&["p p +", "p 2 *", "p i +", "i p +", "p"]),
            &probe,
            &maths,
        )
        .map(|f| f.text().to_string())
        .collect();

        assert_eq!(kept, vec!["p p +", "p i +", "p"]);
    }

    #[test]
    fn test_fixed_samples_fingerprint() {
        let gematria = table();
        let maths = Maths::with_builtin_pi(1000);
        let probe = SampledProbe::new(vec![
            SamplePoint {
                rune: gematria.by_index(1).unwrap().clone(),
                position: 4,
            },
            SamplePoint {
                rune: gematria.by_index(3).unwrap().clone(),
                position: 0,
            },
        ]);
        let mut evaluator = Evaluator::new(&maths);

        assert_eq!(
            probe.fingerprint(&Formula::new("p prevp +"), &mut evaluator),
            vec![Some(2), Some(4)]
        );
        assert_eq!(
            probe.fingerprint(&Formula::new("p i /"), &mut evaluator),
            vec![Some(0), None]
        );
    }

    #[test]
    fn test_failures_share_a_marker() {
        let gematria = table();
        let maths = Maths::with_builtin_pi(1000);
        let probe = SampledProbe::new(vec![SamplePoint {
            rune: gematria.by_index(0).unwrap().clone(),
            position: 0,
        }]);

        // Both always fail at index 0 / position 0, so they collapse together.
        let kept: Vec<Formula> =
            eliminate_equivalent(texts(&["1 p /", "1 i %", "p"]), &probe, &maths).collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].text(), "1 p /");
        assert_eq!(kept[1].text(), "p");
    }

    #[test]
    fn test_congruent_formulas_are_kept_apart() {
        let gematria = table();
        let maths = Maths::with_builtin_pi(1000);
        let probe = SampledProbe::random(
            &gematria,
            &DedupOptions {
                seed: Some(11),
                ..DedupOptions::default()
            },
        );

        // Same index after reduction into the 5-rune table, different raw values
        let kept: Vec<Formula> =
            eliminate_equivalent(texts(&["p", "p 5 +"]), &probe, &maths).collect();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_false_positive_on_narrow_sample() {
        let gematria = table();
        let maths = Maths::with_builtin_pi(1000);
        let probe = SampledProbe::new(vec![SamplePoint {
            rune: gematria.by_index(2).unwrap().clone(),
            position: 2,
        }]);

        // p and i agree at the single sampled point, so "i" is discarded.
        let kept: Vec<Formula> =
            eliminate_equivalent(texts(&["p", "i"]), &probe, &maths).collect();
        assert_eq!(kept.len(), 1);
    }
}
