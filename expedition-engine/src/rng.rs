//! Deterministic random streams for a single expedition run.
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;

/// Deterministic bundle of RNG streams segregated by simulation domain.
///
/// Every stream is derived from the same user-visible seed, so a run is fully
/// reproducible while draws in one domain never shift another domain's rolls.
#[derive(Debug, Clone)]
pub struct RngBundle {
    seed: u64,
    encounter: CountingRng<ChaCha20Rng>,
    outcome: CountingRng<ChaCha20Rng>,
    skill: CountingRng<ChaCha20Rng>,
    narrative: CountingRng<ChaCha20Rng>,
    party: CountingRng<ChaCha20Rng>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            seed,
            encounter: CountingRng::new(derive_stream_seed(seed, b"encounter")),
            outcome: CountingRng::new(derive_stream_seed(seed, b"outcome")),
            skill: CountingRng::new(derive_stream_seed(seed, b"skill")),
            narrative: CountingRng::new(derive_stream_seed(seed, b"narrative")),
            party: CountingRng::new(derive_stream_seed(seed, b"party")),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Encounter-type selection stream.
    pub fn encounter(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.encounter
    }

    /// Outcome-category selection stream.
    pub fn outcome(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.outcome
    }

    /// Skill choice and skill check stream.
    pub fn skill(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.skill
    }

    /// Intro and narrative template stream.
    pub fn narrative(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.narrative
    }

    /// Knockout target stream.
    pub fn party(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.party
    }

    /// Draws performed across every stream.
    #[must_use]
    pub const fn total_draws(&self) -> u64 {
        self.encounter
            .draws()
            .saturating_add(self.outcome.draws())
            .saturating_add(self.skill.draws())
            .saturating_add(self.narrative.draws())
            .saturating_add(self.party.draws())
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha20Rng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    // HMAC zero-pads short keys, so this equals keying with the 8 seed bytes.
    let mut key = Key::<Hmac<Sha256>>::default();
    key[..8].copy_from_slice(&user_seed.to_le_bytes());
    let mut mac = <Hmac<Sha256> as KeyInit>::new(&key);
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}
