use super::{gaussian::GaussianGenerator, RandomGenerator, RandomImpl};

const MODULUS_BITS: u32 = 48;
const MODULUS_MASK: u64 = (1 << MODULUS_BITS) - 1;
const MULTIPLIER: u64 = 0x5DEECE66D;
const INCREMENT: u64 = 11;

/// The linear congruential generator of `java.util.Random`.
#[derive(Debug, Clone)]
pub struct LegacyRand {
    seed: u64,
    next_gaussian: Option<f64>,
}

impl LegacyRand {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed: (seed ^ MULTIPLIER) & MODULUS_MASK,
            next_gaussian: None,
        }
    }

    fn next(&mut self, bits: u32) -> i32 {
        self.seed = self.seed.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT) & MODULUS_MASK;
        (self.seed >> (MODULUS_BITS - bits)) as i32
    }
}

impl GaussianGenerator for LegacyRand {
    fn stored_next_gaussian(&self) -> Option<f64> {
        self.next_gaussian
    }

    fn set_stored_next_gaussian(&mut self, value: Option<f64>) {
        self.next_gaussian = value;
    }
}

impl RandomImpl for LegacyRand {
    fn split(&mut self) -> RandomGenerator {
        RandomGenerator::Legacy(Self::from_seed(self.next_i64() as u64))
    }

    fn next_i32(&mut self) -> i32 {
        self.next(32)
    }

    fn next_bounded_i32(&mut self, bound: i32) -> i32 {
        if bound & bound.wrapping_sub(1) == 0 {
            return ((bound as i64).wrapping_mul(self.next(31) as i64) >> 31) as i32;
        }
        loop {
            let bits = self.next(31);
            let value = bits % bound;
            if bits.wrapping_sub(value).wrapping_add(bound - 1) >= 0 {
                return value;
            }
        }
    }

    fn next_i64(&mut self) -> i64 {
        let upper = self.next(32) as i64;
        let lower = self.next(32) as i64;
        (upper << 32).wrapping_add(lower)
    }

    fn next_bool(&mut self) -> bool {
        self.next(1) != 0
    }

    fn next_f32(&mut self) -> f32 {
        self.next(24) as f32 * 5.9604645E-8f32
    }

    fn next_f64(&mut self) -> f64 {
        let upper = self.next(26) as i64;
        let lower = self.next(27) as i64;
        ((upper << 27) + lower) as f64 * 1.110_223_024_625_156_5E-16f64
    }

    fn next_gaussian(&mut self) -> f64 {
        self.calculate_gaussian()
    }
}

#[cfg(test)]
mod test {
    use super::LegacyRand;
    use crate::{assert_eq_delta, random::RandomImpl};

    #[test]
    fn next_i32() {
        let mut random = LegacyRand::from_seed(123);
        for expected in [-1188957731, 1018954901, -39088943, 1295249578] {
            assert_eq!(random.next_i32(), expected);
        }
    }

    #[test]
    fn next_bounded_i32() {
        let mut random = LegacyRand::from_seed(123);
        assert_eq!(random.next_bounded_i32(256), 185);
        assert_eq!(random.next_bounded_i32(255), 200);
        assert_eq!(random.next_bounded_i32(254), 74);
    }

    #[test]
    fn next_floats() {
        let mut random = LegacyRand::from_seed(123);
        assert_eq!(random.next_f32(), 0.72317415);

        let mut random = LegacyRand::from_seed(123);
        assert_eq_delta!(random.next_f64(), 0.7231742029971469_f64, 1e-12);
    }

    #[test]
    fn gaussian_is_cached_in_pairs() {
        let mut a = LegacyRand::from_seed(5);
        let mut b = LegacyRand::from_seed(5);
        let first = a.next_gaussian();
        let second = a.next_gaussian();
        assert_eq!(first, b.next_gaussian());
        assert_eq!(second, b.next_gaussian());
        assert_ne!(first, second);
    }
}
