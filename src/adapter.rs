//! Backend adapter interfaces.
//!
//! One implementation per wrapped library. Handles are associated types:
//! the harness moves them between stages and hands them back to the adapter
//! that created them, but never looks inside. Everything an adapter allocates
//! is dropped with its handles when the scenario function returns.

use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::mapper::ModulusPlan;

/// Seeded generator threaded through every random operation.
pub type HarnessRng = ChaCha8Rng;

/// Representation a polynomial handle is currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Domain {
    Coefficient,
    Evaluation,
}

/// Five-stage polynomial arithmetic capability.
///
/// Transforms run in place. `add` needs both operands in the same domain,
/// `multiply` needs both in the evaluation domain; anything else is refused
/// rather than converted on the fly, so transform cost never leaks into the
/// arithmetic stages.
pub trait PolyBackend {
    /// Per-plan precomputation (NTT tables, RNS context). Built outside timing.
    type Ring;
    type Poly: Clone + PartialEq;

    fn name(&self) -> &'static str;

    fn build_ring(&self, plan: &ModulusPlan) -> Result<Self::Ring>;

    /// `count` uniformly random polynomials in the coefficient domain.
    fn create_random_batch(
        &self,
        ring: &Self::Ring,
        count: usize,
        rng: &mut HarnessRng,
    ) -> Result<Vec<Self::Poly>>;

    fn forward(&self, ring: &Self::Ring, poly: &mut Self::Poly) -> Result<()>;

    fn inverse(&self, ring: &Self::Ring, poly: &mut Self::Poly) -> Result<()>;

    fn add(&self, ring: &Self::Ring, a: &Self::Poly, b: &Self::Poly) -> Result<Self::Poly>;

    fn multiply(&self, ring: &Self::Ring, a: &Self::Poly, b: &Self::Poly) -> Result<Self::Poly>;

    fn domain(&self, poly: &Self::Poly) -> Domain;
}

/// How an adapter reports context construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextStage {
    /// `build_context` is timed on its own and fills `time_context_us`.
    Separate,
    /// Context construction is timed together with key generation and
    /// `time_context_us` stays empty.
    FoldedIntoKeyGen,
}

/// Six-stage homomorphic scheme capability.
pub trait SchemeBackend {
    type Context;
    /// Secret key, public key and whatever evaluation key multiplication needs.
    type KeyPair;
    type Ciphertext;

    fn name(&self) -> &'static str;

    fn context_stage(&self) -> ContextStage;

    /// May reject the plan with `UnsupportedParameter`.
    fn build_context(&self, plan: &ModulusPlan) -> Result<Self::Context>;

    fn generate_key_pair(&self, ctx: &Self::Context, rng: &mut HarnessRng) -> Result<Self::KeyPair>;

    /// Packs `values` into plaintext slots and encrypts under the public key.
    fn encrypt(
        &self,
        ctx: &Self::Context,
        keys: &Self::KeyPair,
        values: &[u64],
        rng: &mut HarnessRng,
    ) -> Result<Self::Ciphertext>;

    fn hom_add(
        &self,
        ctx: &Self::Context,
        keys: &Self::KeyPair,
        a: &Self::Ciphertext,
        b: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext>;

    fn hom_multiply(
        &self,
        ctx: &Self::Context,
        keys: &Self::KeyPair,
        a: &Self::Ciphertext,
        b: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext>;

    /// First `len` slots of the decrypted plaintext.
    fn decrypt(
        &self,
        ctx: &Self::Context,
        keys: &Self::KeyPair,
        ct: &Self::Ciphertext,
        len: usize,
    ) -> Result<Vec<u64>>;
}
