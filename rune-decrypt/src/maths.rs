//! Number-theory helpers used by the special decryption functions.
//!
//! The prime table and the π digits are built once through [`Maths::generate`]
//! and then passed by reference to every evaluator. Nothing here is
//! initialised lazily.

use crate::error::{DecryptError, DecryptResult};
use rayon::prelude::*;

/// Upper bound (exclusive) for the prime sieve used by decryption jobs
pub const DEFAULT_SIEVE_LIMIT: i32 = 900_000;

/// π to 200 decimal places, leading `3` included
pub const PI_DIGITS: &str = concat!(
    "3",
    "14159265358979323846264338327950288419716939937510",
    "58209749445923078164062862089986280348253421170679",
    "82148086513282306647093844609550582231725359408128",
    "48111745028410270193852110555964462294895493038196",
);

/// Precomputed primes and π digits
#[derive(Debug, Clone)]
pub struct Maths {
    primes: Vec<i32>,
    pi: Vec<u8>,
}

impl Maths {
    /// Build the prime table below `sieve_limit` and read π digits from `pi_source`.
    ///
    /// Any character of `pi_source` that is not an ASCII digit (the decimal
    /// point, line breaks) is ignored.
    ///
    /// # Errors
    /// Returns `SettingsError` if `pi_source` holds no digits at all.
    pub fn generate(sieve_limit: i32, pi_source: &str) -> DecryptResult<Self> {
        let pi: Vec<u8> = pi_source
            .bytes()
            .filter(|b| b.is_ascii_digit())
            .map(|b| b - b'0')
            .collect();

        if pi.is_empty() {
            return Err(DecryptError::SettingsError(
                "π digit source contains no digits".to_string(),
            ));
        }

        let primes = sieve(sieve_limit);
        tracing::debug!(
            primes = primes.len(),
            pi_digits = pi.len(),
            "generated mathematical data"
        );

        Ok(Maths { primes, pi })
    }

    /// Same as [`Maths::generate`] with the built-in [`PI_DIGITS`]
    pub fn with_builtin_pi(sieve_limit: i32) -> Self {
        Maths {
            primes: sieve(sieve_limit),
            pi: PI_DIGITS.bytes().map(|b| b - b'0').collect(),
        }
    }

    /// The `n`-th prime, 0-indexed (`prime(0) == 2`)
    pub fn prime(&self, n: i32) -> Option<i32> {
        usize::try_from(n)
            .ok()
            .and_then(|n| self.primes.get(n).copied())
    }

    /// The `n`-th decimal digit of π, 0-indexed (`pi(0) == 3`)
    pub fn pi(&self, n: i32) -> Option<i32> {
        usize::try_from(n)
            .ok()
            .and_then(|n| self.pi.get(n).map(|&d| d as i32))
    }

    pub fn prime_count(&self) -> usize {
        self.primes.len()
    }

    pub fn pi_digit_count(&self) -> usize {
        self.pi.len()
    }
}

/// All primes below `limit`, ascending.
///
/// Each candidate is tested independently on the rayon pool; the final sort
/// restores a deterministic order regardless of scheduling.
pub fn sieve(limit: i32) -> Vec<i32> {
    if limit <= 2 {
        return Vec::new();
    }

    let mut primes: Vec<i32> = (2..limit).into_par_iter().filter(|&n| is_prime(n)).collect();
    primes.sort_unstable();
    primes
}

/// Trial-division primality test
pub fn is_prime(n: i32) -> bool {
    if n < 2 {
        return false;
    }

    let n = n as i64;
    let mut divisor = 2i64;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

/// Euler's totient by trial-division factorisation.
///
/// Values below 2 are returned unchanged (`totient(1) == 1`, `totient(0) == 0`).
pub fn totient(n: i32) -> i32 {
    let mut remaining = n as i64;
    let mut result = remaining;

    let mut p = 2i64;
    while p * p <= remaining {
        if remaining % p == 0 {
            while remaining % p == 0 {
                remaining /= p;
            }
            result -= result / p;
        }
        p += 1;
    }

    if remaining > 1 {
        result -= result / remaining;
    }

    result as i32
}

/// Mathematical modulo: the result is always in `[0, n)` for `n > 0`,
/// unlike the truncating `%` operator.
pub fn modulo(m: i32, n: i32) -> i32 {
    m.rem_euclid(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulo_is_never_negative() {
        for n in 1..40 {
            for m in -200..200 {
                let r = modulo(m, n);
                assert!((0..n).contains(&r), "modulo({}, {}) = {}", m, n, r);
                assert_eq!((r - m) % n, 0);
            }
        }
        assert_eq!(modulo(-1, 29), 28);
        assert_eq!(modulo(-29, 29), 0);
        assert_eq!(modulo(i32::MIN, 29), i32::MIN.rem_euclid(29));
    }

    #[test]
    fn test_totient_known_values() {
        assert_eq!(totient(1), 1);
        assert_eq!(totient(9), 6);
        assert_eq!(totient(10), 4);
        assert_eq!(totient(36), 12);
        assert_eq!(totient(97), 96);
    }

    #[test]
    fn test_totient_of_primes() {
        for p in sieve(500) {
            assert_eq!(totient(p), p - 1);
        }
    }

    #[test]
    fn test_totient_is_multiplicative() {
        let coprime = [(3, 4), (5, 9), (7, 10), (8, 15), (11, 13), (16, 27)];
        for (a, b) in coprime {
            assert_eq!(totient(a * b), totient(a) * totient(b), "a={} b={}", a, b);
        }
    }

    #[test]
    fn test_sieve_is_sorted_and_prime() {
        let primes = sieve(10_000);
        assert_eq!(&primes[..10], &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(primes.len(), 1229);
        assert!(primes.windows(2).all(|w| w[0] < w[1]));
        assert!(primes.iter().all(|&p| is_prime(p)));
    }

    #[test]
    fn test_sieve_small_limits() {
        assert!(sieve(0).is_empty());
        assert!(sieve(2).is_empty());
        assert_eq!(sieve(3), vec![2]);
    }

    #[test]
    fn test_prime_lookup() {
        let maths = Maths::with_builtin_pi(1000);
        assert_eq!(maths.prime(0), Some(2));
        assert_eq!(maths.prime(1), Some(3));
        assert_eq!(maths.prime(28), Some(109));
        assert_eq!(maths.prime(-1), None);
        assert_eq!(maths.prime(maths.prime_count() as i32), None);
    }

    #[test]
    fn test_pi_lookup() {
        let maths = Maths::with_builtin_pi(100);
        assert_eq!(maths.pi_digit_count(), 201);
        assert_eq!(maths.pi(0), Some(3));
        assert_eq!(maths.pi(1), Some(1));
        assert_eq!(maths.pi(5), Some(9));
        assert_eq!(maths.pi(200), Some(6));
        assert_eq!(maths.pi(201), None);
        assert_eq!(maths.pi(-3), None);
    }

    #[test]
    fn test_generate_ignores_non_digits() {
        let maths = Maths::generate(100, "3.14\n15").unwrap();
        assert_eq!(maths.pi_digit_count(), 5);
        assert_eq!(maths.pi(4), Some(5));
        assert_eq!(maths.prime_count(), 25);
    }

    #[test]
    fn test_generate_rejects_empty_pi_source() {
        let result = Maths::generate(100, "no digits here");
        assert!(matches!(result, Err(DecryptError::SettingsError(_))));
    }
}
