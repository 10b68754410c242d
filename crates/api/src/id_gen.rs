//! Random identifier generation.

use std::sync::Arc;

/// Alphabet used for session ids and introduction tokens.
pub const ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Produces unguessable identifiers.
///
/// This is injected rather than reaching for ambient randomness, so
/// tests can script the output and force collisions.
pub trait IdGenerator: 'static + Send + Sync + std::fmt::Debug {
    /// Generate a random string of `len` characters from [ID_ALPHABET].
    fn generate(&self, len: usize) -> String;
}

/// Trait-object [IdGenerator].
pub type DynIdGenerator = Arc<dyn IdGenerator>;

/// Bits of entropy in an id of `len` characters from [ID_ALPHABET].
pub fn entropy_bits(len: usize) -> f64 {
    (ID_ALPHABET.len() as f64).log2() * len as f64
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_token_len_exceeds_128_bits() {
        assert!(entropy_bits(22) >= 128.0);
        assert!(entropy_bits(21) < 128.0);
    }
}
