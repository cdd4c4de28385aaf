use std::sync::atomic::{AtomicU64, Ordering};

use enum_dispatch::enum_dispatch;
use legacy_rand::LegacyRand;
use serde::{Deserialize, Serialize};
use xoroshiro128::Xoroshiro;

mod gaussian;
pub mod legacy_rand;
pub mod xoroshiro128;

static SEED_UNIQUIFIER: AtomicU64 = AtomicU64::new(8682522807148012u64);

/// Produces a fresh seed, mixing a process-wide uniquifier with OS entropy.
pub fn get_seed() -> u64 {
    let mut current = SEED_UNIQUIFIER.load(Ordering::Relaxed);
    loop {
        let next = current.wrapping_mul(1181783497276652981u64);
        match SEED_UNIQUIFIER.compare_exchange_weak(
            current,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next ^ rand::random::<u64>(),
            Err(actual) => current = actual,
        }
    }
}

/// Which generator family to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RandomKind {
    #[default]
    Xoroshiro,
    Legacy,
}

#[enum_dispatch(RandomImpl)]
#[derive(Debug, Clone)]
pub enum RandomGenerator {
    Xoroshiro(Xoroshiro),
    Legacy(LegacyRand),
}

impl RandomGenerator {
    pub fn from_kind(kind: RandomKind, seed: u64) -> Self {
        match kind {
            RandomKind::Xoroshiro => Self::Xoroshiro(Xoroshiro::from_seed(seed)),
            RandomKind::Legacy => Self::Legacy(LegacyRand::from_seed(seed)),
        }
    }

    /// A xoroshiro generator seeded from [`get_seed`].
    pub fn from_entropy() -> Self {
        Self::Xoroshiro(Xoroshiro::from_seed(get_seed()))
    }
}

#[enum_dispatch]
pub trait RandomImpl {
    /// A new generator seeded from this one's output.
    fn split(&mut self) -> RandomGenerator;

    fn next_i32(&mut self) -> i32;

    /// A value in `[0, bound)`. `bound` must be positive.
    fn next_bounded_i32(&mut self, bound: i32) -> i32;

    fn next_inbetween_i32(&mut self, min: i32, max: i32) -> i32 {
        self.next_bounded_i32(max - min + 1) + min
    }

    fn next_i64(&mut self) -> i64;

    /// A value in `[0, bound)`. `bound` must be positive.
    fn next_bounded_i64(&mut self, bound: i64) -> i64 {
        // same rejection scheme as java.util.random.RandomSupport#boundedNextLong
        let m = bound - 1;
        let mut r = self.next_i64();
        if bound & m == 0 {
            r & m
        } else {
            let mut u = ((r as u64) >> 1) as i64;
            loop {
                r = u % bound;
                if u.wrapping_add(m).wrapping_sub(r) >= 0 {
                    return r;
                }
                u = ((self.next_i64() as u64) >> 1) as i64;
            }
        }
    }

    /// A value in `[origin, bound)`. `origin` must be below `bound`. Ranges
    /// wider than `i64::MAX` redraw until the value lands inside.
    fn next_ranged_i64(&mut self, origin: i64, bound: i64) -> i64 {
        match bound.checked_sub(origin) {
            Some(width) if width > 0 => origin + self.next_bounded_i64(width),
            _ => loop {
                let r = self.next_i64();
                if (origin..bound).contains(&r) {
                    return r;
                }
            },
        }
    }

    /// A value in `[min, max]`.
    fn next_inbetween_i64(&mut self, min: i64, max: i64) -> i64 {
        match max.checked_add(1) {
            Some(bound) => self.next_ranged_i64(min, bound),
            None => loop {
                let r = self.next_i64();
                if r >= min {
                    return r;
                }
            },
        }
    }

    fn next_bool(&mut self) -> bool;

    fn next_f32(&mut self) -> f32;

    fn next_f64(&mut self) -> f64;

    fn next_gaussian(&mut self) -> f64;

    fn next_triangular(&mut self, mode: f64, deviation: f64) -> f64 {
        mode + deviation * (self.next_f64() - self.next_f64())
    }

    fn skip(&mut self, count: i32) {
        for _ in 0..count {
            self.next_i64();
        }
    }

    fn next_inbetween_i32_exclusive(&mut self, min: i32, max: i32) -> i32 {
        min + self.next_bounded_i32(max - min)
    }
}

#[cfg(test)]
mod test {
    use super::{RandomGenerator, RandomImpl, RandomKind};

    #[test]
    fn bounded_long_stays_in_range() {
        for kind in [RandomKind::Xoroshiro, RandomKind::Legacy] {
            let mut random = RandomGenerator::from_kind(kind, 42);
            for bound in [1i64, 2, 7, 64, 1000, i64::MAX / 3] {
                for _ in 0..200 {
                    let value = random.next_bounded_i64(bound);
                    assert!((0..bound).contains(&value));
                }
            }
        }
    }

    #[test]
    fn inbetween_is_inclusive() {
        let mut random = RandomGenerator::from_kind(RandomKind::Xoroshiro, 7);
        let mut seen = [false; 3];
        for _ in 0..500 {
            let value = random.next_inbetween_i64(-1, 1);
            seen[(value + 1) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn ranges_wider_than_i64_redraw() {
        let mut random = RandomGenerator::from_kind(RandomKind::Xoroshiro, 3);
        let (min, max) = (-5_000_000_000_000_000_000i64, 5_000_000_000_000_000_000i64);
        for _ in 0..200 {
            let value = random.next_inbetween_i64(min, max);
            assert!((min..=max).contains(&value));
            let value = random.next_ranged_i64(min, max);
            assert!((min..max).contains(&value));
        }
        for _ in 0..50 {
            random.next_inbetween_i64(i64::MIN, i64::MAX);
            assert!(random.next_inbetween_i64(0, i64::MAX) >= 0);
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomGenerator::from_kind(RandomKind::Legacy, 99);
        let mut b = RandomGenerator::from_kind(RandomKind::Legacy, 99);
        for _ in 0..16 {
            assert_eq!(a.next_i64(), b.next_i64());
        }
    }

    #[test]
    fn kind_from_config_text() {
        let kind: RandomKind = serde_json::from_str("\"legacy\"").unwrap();
        assert_eq!(kind, RandomKind::Legacy);
    }
}
