//! Time-sortable record identifiers
//!
//! Identifiers follow the ULID layout: a 48-bit millisecond timestamp followed
//! by 80 random bits, rendered as 26 Crockford base32 characters. Identifiers
//! minted in later milliseconds sort after earlier ones.
//!
//! Randomness comes from a pool of independently seeded sources. A caller
//! borrows one source, mints an identifier and hands the source back, so
//! concurrent callers never share a source and never queue behind a single
//! generator for longer than the pool lock is held.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Length of an encoded identifier
pub const ID_LENGTH: usize = 26;

const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const TIMESTAMP_BITS: u32 = 48;
const RANDOM_BITS: u32 = 80;

/// Concurrent identifier generator backed by a pool of entropy sources
#[derive(Debug)]
pub struct IdGenerator {
    pool: Mutex<Vec<StdRng>>,
    capacity: usize,
    seed_base: u64,
    next_slot: AtomicU64,
}

/// A source borrowed from the pool, returned on drop
struct Borrowed<'a> {
    generator: &'a IdGenerator,
    rng: StdRng,
}

impl Deref for Borrowed<'_> {
    type Target = StdRng;

    fn deref(&self) -> &StdRng {
        &self.rng
    }
}

impl DerefMut for Borrowed<'_> {
    fn deref_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Drop for Borrowed<'_> {
    fn drop(&mut self) {
        // The returned copy carries the advanced state
        self.generator.give_back(self.rng.clone());
    }
}

impl IdGenerator {
    /// Create a generator with `capacity` pre-seeded sources
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let seed_base = Utc::now()
            .timestamp_nanos_opt()
            .map(|n| n as u64)
            .unwrap_or_default();

        let generator = Self {
            pool: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            seed_base,
            next_slot: AtomicU64::new(0),
        };

        {
            let mut pool = generator.pool.lock();
            for _ in 0..capacity {
                pool.push(generator.seed_source());
            }
        }

        generator
    }

    /// Mint an identifier for the current instant
    pub fn generate(&self) -> String {
        self.generate_at(&Utc::now())
    }

    /// Mint an identifier for a given instant
    pub fn generate_at(&self, timestamp: &DateTime<Utc>) -> String {
        let millis = timestamp.timestamp_millis().max(0) as u128 & ((1u128 << TIMESTAMP_BITS) - 1);

        let entropy = self.borrow().gen::<u128>() & ((1u128 << RANDOM_BITS) - 1);

        encode((millis << RANDOM_BITS) | entropy)
    }

    /// Number of idle sources in the pool
    pub fn idle_sources(&self) -> usize {
        self.pool.lock().len()
    }

    fn borrow(&self) -> Borrowed<'_> {
        // An empty pool grows with a freshly seeded source
        let rng = self.pool.lock().pop().unwrap_or_else(|| self.seed_source());
        Borrowed { generator: self, rng }
    }

    fn give_back(&self, rng: StdRng) {
        let mut pool = self.pool.lock();
        if pool.len() < self.capacity {
            pool.push(rng);
        }
    }

    fn seed_source(&self) -> StdRng {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        StdRng::seed_from_u64(self.seed_base.wrapping_add(slot))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Extract the millisecond timestamp from an encoded identifier
pub fn timestamp_millis(id: &str) -> Option<i64> {
    if id.len() != ID_LENGTH {
        return None;
    }

    let mut value: u128 = 0;
    for byte in id.bytes() {
        let digit = ENCODING.iter().position(|&c| c == byte.to_ascii_uppercase())?;
        value = value.checked_mul(32)?.checked_add(digit as u128)?;
    }

    Some((value >> RANDOM_BITS) as i64)
}

fn encode(value: u128) -> String {
    (0..ID_LENGTH)
        .map(|i| ENCODING[((value >> (5 * (ID_LENGTH - 1 - i))) & 0x1f) as usize] as char)
        .collect()
}
