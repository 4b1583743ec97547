#![allow(dead_code)]

use latbench::{
    ContextStage, DecompositionPolicy, Domain, Error, HarnessRng, ModulusPlan, PolyBackend,
    Result, SchemeBackend,
};
use rand::Rng;

pub const OPEN_POLICY: DecompositionPolicy = DecompositionPolicy {
    max_prime_bits: 62,
    min_prime_bits: 10,
    max_primes: 64,
};

// ------------------------------------------------------------
// polynomial mock: pointwise arithmetic, transforms only flip the tag
// ------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockPoly {
    coeffs: Vec<u64>,
    domain: Domain,
}

#[derive(Clone, Copy, Debug)]
pub struct MockPolyBackend {
    pub name: &'static str,
    /// Flip one coefficient on the way back to the coefficient domain.
    pub corrupt_inverse: bool,
    pub panic_in_multiply: bool,
}

impl MockPolyBackend {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            corrupt_inverse: false,
            panic_in_multiply: false,
        }
    }
}

impl PolyBackend for MockPolyBackend {
    type Ring = (u64, usize);
    type Poly = MockPoly;

    fn name(&self) -> &'static str {
        self.name
    }

    fn build_ring(&self, plan: &ModulusPlan) -> Result<(u64, usize)> {
        Ok((plan.moduli[0], plan.degree))
    }

    fn create_random_batch(
        &self,
        &(q, n): &(u64, usize),
        count: usize,
        rng: &mut HarnessRng,
    ) -> Result<Vec<MockPoly>> {
        Ok((0..count)
            .map(|_| MockPoly {
                coeffs: (0..n).map(|_| rng.gen_range(0..q)).collect(),
                domain: Domain::Coefficient,
            })
            .collect())
    }

    fn forward(&self, _ring: &(u64, usize), p: &mut MockPoly) -> Result<()> {
        p.domain = Domain::Evaluation;
        Ok(())
    }

    fn inverse(&self, &(q, _): &(u64, usize), p: &mut MockPoly) -> Result<()> {
        if self.corrupt_inverse {
            p.coeffs[0] = (p.coeffs[0] + 1) % q;
        }
        p.domain = Domain::Coefficient;
        Ok(())
    }

    fn add(&self, &(q, _): &(u64, usize), a: &MockPoly, b: &MockPoly) -> Result<MockPoly> {
        Ok(MockPoly {
            coeffs: a.coeffs.iter().zip(&b.coeffs).map(|(x, y)| (x + y) % q).collect(),
            domain: a.domain,
        })
    }

    fn multiply(&self, &(q, _): &(u64, usize), a: &MockPoly, b: &MockPoly) -> Result<MockPoly> {
        if a.domain != Domain::Evaluation {
            return Err(Error::backend(self.name, "multiply outside the evaluation domain"));
        }
        if self.panic_in_multiply {
            panic!("operand length mismatch");
        }
        Ok(MockPoly {
            coeffs: a
                .coeffs
                .iter()
                .zip(&b.coeffs)
                .map(|(&x, &y)| (x as u128 * y as u128 % q as u128) as u64)
                .collect(),
            domain: a.domain,
        })
    }

    fn domain(&self, p: &MockPoly) -> Domain {
        p.domain
    }
}

// ------------------------------------------------------------
// scheme mock: slots in the clear, arithmetic mod t
// ------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct PlainScheme {
    pub name: &'static str,
    pub fail_multiply: bool,
    /// Decrypt every slot off by one.
    pub corrupt_decrypt: bool,
}

impl PlainScheme {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            fail_multiply: false,
            corrupt_decrypt: false,
        }
    }
}

impl SchemeBackend for PlainScheme {
    type Context = u64;
    type KeyPair = ();
    type Ciphertext = Vec<u64>;

    fn name(&self) -> &'static str {
        self.name
    }

    fn context_stage(&self) -> ContextStage {
        ContextStage::FoldedIntoKeyGen
    }

    fn build_context(&self, plan: &ModulusPlan) -> Result<u64> {
        Ok(plan.plaintext_modulus)
    }

    fn generate_key_pair(&self, _t: &u64, _rng: &mut HarnessRng) -> Result<()> {
        Ok(())
    }

    fn encrypt(&self, _t: &u64, _k: &(), values: &[u64], _rng: &mut HarnessRng) -> Result<Vec<u64>> {
        Ok(values.to_vec())
    }

    fn hom_add(&self, &t: &u64, _k: &(), a: &Vec<u64>, b: &Vec<u64>) -> Result<Vec<u64>> {
        Ok(a.iter().zip(b).map(|(x, y)| (x + y) % t).collect())
    }

    fn hom_multiply(&self, &t: &u64, _k: &(), a: &Vec<u64>, b: &Vec<u64>) -> Result<Vec<u64>> {
        if self.fail_multiply {
            return Err(Error::backend(self.name, "multiplication depth exhausted"));
        }
        Ok(a.iter().zip(b).map(|(x, y)| x * y % t).collect())
    }

    fn decrypt(&self, &t: &u64, _k: &(), ct: &Vec<u64>, len: usize) -> Result<Vec<u64>> {
        let shift = u64::from(self.corrupt_decrypt);
        Ok(ct[..len].iter().map(|x| (x + shift) % t).collect())
    }
}
