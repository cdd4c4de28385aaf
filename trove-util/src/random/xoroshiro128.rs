use super::{gaussian::GaussianGenerator, RandomGenerator, RandomImpl};

const STAFFORD_1: u64 = 0xbf58476d1ce4e5b9;
const STAFFORD_2: u64 = 0x94d049bb133111eb;
const SILVER_RATIO: u64 = 0x6a09e667f3bcc909;
const GOLDEN_RATIO: u64 = 0x9e3779b97f4a7c15;

/// xoroshiro128++ seeded the way the game upgrades 64-bit seeds.
#[derive(Debug, Clone)]
pub struct Xoroshiro {
    lo: u64,
    hi: u64,
    next_gaussian: Option<f64>,
}

fn mix_stafford_13(mut value: u64) -> u64 {
    value = (value ^ (value >> 30)).wrapping_mul(STAFFORD_1);
    value = (value ^ (value >> 27)).wrapping_mul(STAFFORD_2);
    value ^ (value >> 31)
}

impl Xoroshiro {
    pub fn from_seed(seed: u64) -> Self {
        let lo = seed ^ SILVER_RATIO;
        let hi = lo.wrapping_add(GOLDEN_RATIO);
        Self::new(mix_stafford_13(lo), mix_stafford_13(hi))
    }

    pub fn new(lo: u64, hi: u64) -> Self {
        let (lo, hi) = if lo | hi == 0 {
            (GOLDEN_RATIO, SILVER_RATIO)
        } else {
            (lo, hi)
        };
        Self {
            lo,
            hi,
            next_gaussian: None,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let lo = self.lo;
        let mut hi = self.hi;
        let result = lo.wrapping_add(hi).rotate_left(17).wrapping_add(lo);
        hi ^= lo;
        self.lo = lo.rotate_left(49) ^ hi ^ (hi << 21);
        self.hi = hi.rotate_left(28);
        result
    }

    fn next_bits(&mut self, bits: u32) -> u64 {
        self.next_u64() >> (64 - bits)
    }
}

impl GaussianGenerator for Xoroshiro {
    fn stored_next_gaussian(&self) -> Option<f64> {
        self.next_gaussian
    }

    fn set_stored_next_gaussian(&mut self, value: Option<f64>) {
        self.next_gaussian = value;
    }
}

impl RandomImpl for Xoroshiro {
    fn split(&mut self) -> RandomGenerator {
        let lo = self.next_u64();
        let hi = self.next_u64();
        RandomGenerator::Xoroshiro(Self::new(lo, hi))
    }

    fn next_i32(&mut self) -> i32 {
        self.next_u64() as i32
    }

    fn next_bounded_i32(&mut self, bound: i32) -> i32 {
        let bound = bound as u32;
        let mut product = (self.next_i32() as u32 as u64).wrapping_mul(bound as u64);
        let mut low = product as u32;
        if low < bound {
            let threshold = (!bound).wrapping_add(1) % bound;
            while low < threshold {
                product = (self.next_i32() as u32 as u64).wrapping_mul(bound as u64);
                low = product as u32;
            }
        }
        (product >> 32) as i32
    }

    fn next_i64(&mut self) -> i64 {
        self.next_u64() as i64
    }

    fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 != 0
    }

    fn next_f32(&mut self) -> f32 {
        self.next_bits(24) as f32 * 5.9604645E-8f32
    }

    fn next_f64(&mut self) -> f64 {
        self.next_bits(53) as f64 * 1.110_223_024_625_156_5E-16f64
    }

    fn next_gaussian(&mut self) -> f64 {
        self.calculate_gaussian()
    }
}
