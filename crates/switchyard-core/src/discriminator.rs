//! Discriminator and generated-name utilities
//!
//! A discriminator is a 15 character string over a 64 symbol alphabet,
//! built from three random words six bits at a time. It is used for dynamic
//! (temporary) addresses and for names of links the core creates itself.

use crate::config::RouterIdentity;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

const ALPHABET: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+_";

/// Length of every generated discriminator
pub const DISCRIMINATOR_LEN: usize = 15;

const ROUNDS: usize = DISCRIMINATOR_LEN / 3;

/// Encode three random words into a discriminator
///
/// Round `i` appends one symbol from each word, taken from bits
/// `6i..6i+6`.
pub fn encode_discriminator(words: [u32; 3]) -> String {
    let mut out = String::with_capacity(DISCRIMINATOR_LEN);
    for round in 0..ROUNDS {
        for word in words {
            let idx = (word >> (round * 6)) & 0x3f;
            out.push(ALPHABET[idx as usize] as char);
        }
    }
    out
}

/// Source of discriminators, owned by the core task
#[derive(Debug, Clone)]
pub struct DiscriminatorGenerator {
    rng: StdRng,
}

impl DiscriminatorGenerator {
    /// Seeded generator when `seed` is set, entropy-seeded otherwise
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn discriminator(&mut self) -> String {
        let words = [
            self.rng.next_u32(),
            self.rng.next_u32(),
            self.rng.next_u32(),
        ];
        encode_discriminator(words)
    }

    /// `amqp:/_topo/<area>/<router>/temp.<discriminator>`
    pub fn temp_address(&mut self, identity: &RouterIdentity) -> String {
        format!(
            "amqp:/_topo/{}/{}/temp.{}",
            identity.area,
            identity.router_id,
            self.discriminator()
        )
    }

    /// `<label>.<discriminator>`
    pub fn link_name(&mut self, label: &str) -> String {
        format!("{}.{}", label, self.discriminator())
    }
}
