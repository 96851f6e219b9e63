use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Per-session random source. Every session owns exactly one, seeded at
/// creation, so pellet placement, tile boards, hazard spawns and bot
/// tie-breaks replay identically under the same seed.
#[derive(Debug, Clone)]
pub struct SessionRng {
    rng: ChaCha20Rng,
}

impl SessionRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Derive a session seed from a tournament identifier. FNV-1a over the
    /// bytes; stability matters more than dispersion here.
    pub fn seed_for_tournament(tournament_id: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in tournament_id.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * (self.rng.next_u64() as f64 / u64::MAX as f64)
    }

    pub fn range_u64(&mut self, lo: u64, hi: u64) -> u64 {
        debug_assert!(hi > lo);
        lo + self.rng.next_u64() % (hi - lo)
    }

    pub fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.rng.next_u64() % len as u64) as usize
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        // Fisher-Yates, high to low, same walk every replay
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }
}

impl RngCore for SessionRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }
}
