//! Short random lookup tokens handed back to the web app.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of keys issued for offer submissions.
pub const OFFER_KEY_LENGTH: usize = 5;

/// Process-wide key source. Not cryptographic: keys are short-lived lookup
/// tokens, not credentials.
pub struct KeyGenerator {
    rng: Mutex<StdRng>,
}

impl KeyGenerator {
    /// Seed from the current wall-clock time.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(nanos)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self, length: usize) -> String {
        // A poisoned lock still holds a usable RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..length)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect()
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
