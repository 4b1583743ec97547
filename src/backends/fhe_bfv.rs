//! BFV scheme backend on the `fhe` crate.

use std::sync::Arc;

use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Multiplicator, Plaintext,
    PublicKey, RelinearizationKey, SecretKey,
};
use fhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};

use crate::adapter::{ContextStage, HarnessRng, SchemeBackend};
use crate::error::{Error, Result};
use crate::mapper::{DecompositionPolicy, ModulusPlan};

pub const ID: &str = "fhe-bfv";

pub const POLICY: DecompositionPolicy = DecompositionPolicy {
    max_prime_bits: 62,
    min_prime_bits: 10,
    max_primes: 64,
};

fn fail(e: fhe::Error) -> Error {
    Error::backend(ID, e.to_string())
}

pub struct BfvKeyPair {
    sk: SecretKey,
    pk: PublicKey,
    /// Owns the relinearization key applied after every product.
    multiplicator: Multiplicator,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FheBfvBackend;

impl SchemeBackend for FheBfvBackend {
    type Context = Arc<BfvParameters>;
    type KeyPair = BfvKeyPair;
    type Ciphertext = Ciphertext;

    fn name(&self) -> &'static str {
        ID
    }

    fn context_stage(&self) -> ContextStage {
        ContextStage::Separate
    }

    fn build_context(&self, plan: &ModulusPlan) -> Result<Arc<BfvParameters>> {
        BfvParametersBuilder::new()
            .set_degree(plan.degree)
            .set_plaintext_modulus(plan.plaintext_modulus)
            .set_moduli(&plan.moduli)
            .build_arc()
            .map_err(|e| match e {
                fhe::Error::ParametersError(_) | fhe::Error::MathError(_) => {
                    Error::unsupported(ID, e.to_string())
                }
                other => fail(other),
            })
    }

    fn generate_key_pair(&self, par: &Arc<BfvParameters>, rng: &mut HarnessRng) -> Result<BfvKeyPair> {
        let sk = SecretKey::random(par, rng);
        let pk = PublicKey::new(&sk, rng);
        let rk = RelinearizationKey::new(&sk, rng).map_err(fail)?;
        let multiplicator = Multiplicator::default(&rk).map_err(fail)?;
        Ok(BfvKeyPair { sk, pk, multiplicator })
    }

    fn encrypt(
        &self,
        par: &Arc<BfvParameters>,
        keys: &BfvKeyPair,
        values: &[u64],
        rng: &mut HarnessRng,
    ) -> Result<Ciphertext> {
        let pt = Plaintext::try_encode(values, Encoding::simd(), par).map_err(fail)?;
        keys.pk.try_encrypt(&pt, rng).map_err(fail)
    }

    fn hom_add(
        &self,
        _par: &Arc<BfvParameters>,
        _keys: &BfvKeyPair,
        a: &Ciphertext,
        b: &Ciphertext,
    ) -> Result<Ciphertext> {
        Ok(a + b)
    }

    fn hom_multiply(
        &self,
        _par: &Arc<BfvParameters>,
        keys: &BfvKeyPair,
        a: &Ciphertext,
        b: &Ciphertext,
    ) -> Result<Ciphertext> {
        keys.multiplicator.multiply(a, b).map_err(fail)
    }

    fn decrypt(
        &self,
        _par: &Arc<BfvParameters>,
        keys: &BfvKeyPair,
        ct: &Ciphertext,
        len: usize,
    ) -> Result<Vec<u64>> {
        let pt = keys.sk.try_decrypt(ct).map_err(fail)?;
        let mut slots = Vec::<u64>::try_decode(&pt, Encoding::simd()).map_err(fail)?;
        slots.truncate(len);
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Disposition;
    use crate::mapper::ParameterMapper;
    use crate::tier::SecurityTier;
    use rand::SeedableRng;

    fn plan(tier: SecurityTier) -> ModulusPlan {
        ParameterMapper::new(256, 8192, 65537)
            .resolve(ID, tier.into())
            .unwrap()
    }

    #[test]
    fn test_add_then_multiply_decrypts_correctly() {
        let b = FheBfvBackend;
        let mut rng = HarnessRng::seed_from_u64(41);
        let par = b.build_context(&plan(SecurityTier::S128)).unwrap();
        let keys = b.generate_key_pair(&par, &mut rng).unwrap();

        let x = [1u64, 2, 3, 4];
        let y = [5u64, 6, 7, 8];
        let z = [9u64, 10, 11, 12];
        let cx = b.encrypt(&par, &keys, &x, &mut rng).unwrap();
        let cy = b.encrypt(&par, &keys, &y, &mut rng).unwrap();
        let cz = b.encrypt(&par, &keys, &z, &mut rng).unwrap();

        let sum = b.hom_add(&par, &keys, &b.hom_add(&par, &keys, &cx, &cy).unwrap(), &cz).unwrap();
        let prod = b
            .hom_multiply(&par, &keys, &b.hom_multiply(&par, &keys, &cx, &cy).unwrap(), &cz)
            .unwrap();

        assert_eq!(b.decrypt(&par, &keys, &sum, 4).unwrap(), vec![15, 18, 21, 24]);
        assert_eq!(b.decrypt(&par, &keys, &prod, 4).unwrap(), vec![45, 120, 231, 384]);
    }

    #[test]
    fn test_context_reports_separately() {
        assert_eq!(FheBfvBackend.context_stage(), ContextStage::Separate);
    }

    #[test]
    fn test_non_power_of_two_degree_is_unsupported() {
        let mut plan = plan(SecurityTier::S192);
        plan.degree = 1000;
        let err = FheBfvBackend.build_context(&plan).unwrap_err();
        assert_eq!(err.disposition(), Disposition::Skip);
    }

    #[test]
    fn test_too_many_values_is_a_backend_failure() {
        let b = FheBfvBackend;
        let mut rng = HarnessRng::seed_from_u64(42);
        let par = b.build_context(&plan(SecurityTier::S192)).unwrap();
        let keys = b.generate_key_pair(&par, &mut rng).unwrap();
        let values = vec![1u64; 8193];
        let err = b.encrypt(&par, &keys, &values, &mut rng).unwrap_err();
        assert_eq!(err.disposition(), Disposition::Fail);
    }
}
