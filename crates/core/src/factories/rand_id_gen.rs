//! The default random identifier generator.

use rand::{Rng, SeedableRng};
use rendezvous_api::id_gen::*;
use std::sync::{Arc, Mutex};

/// Generates identifiers from a ChaCha20 csprng.
///
/// [RandIdGenerator::create] seeds from the os. [RandIdGenerator::from_seed]
/// gives a reproducible sequence for tests and simulations.
pub struct RandIdGenerator(Mutex<rand_chacha::ChaCha20Rng>);

impl std::fmt::Debug for RandIdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandIdGenerator").finish()
    }
}

impl RandIdGenerator {
    /// Construct an os-seeded generator.
    pub fn create() -> DynIdGenerator {
        let rng = rand_chacha::ChaCha20Rng::from_entropy();
        let out: DynIdGenerator = Arc::new(Self(Mutex::new(rng)));
        out
    }

    /// Construct a deterministic generator.
    pub fn from_seed(seed: u64) -> DynIdGenerator {
        let out: DynIdGenerator = Arc::new(Self(Mutex::new(
            rand_chacha::ChaCha20Rng::seed_from_u64(seed),
        )));
        out
    }
}

impl IdGenerator for RandIdGenerator {
    fn generate(&self, len: usize) -> String {
        let mut rng = self.0.lock().unwrap();
        (0..len)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generates_requested_len_from_alphabet() {
        let g = RandIdGenerator::create();
        let id = g.generate(30);
        assert_eq!(30, id.len());
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let a = RandIdGenerator::from_seed(42);
        let b = RandIdGenerator::from_seed(42);
        let c = RandIdGenerator::from_seed(43);

        let a1 = a.generate(32);
        assert_eq!(a1, b.generate(32));
        assert_ne!(a1, c.generate(32));
        assert_ne!(a1, a.generate(32));
    }
}
