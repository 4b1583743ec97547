//! RNS polynomial backend on `fhe-math`'s `rq` module.

use std::sync::Arc;

use fhe_math::rq::{Context, Poly, Representation};

use crate::adapter::{Domain, HarnessRng, PolyBackend};
use crate::error::{Error, Result};
use crate::mapper::{DecompositionPolicy, ModulusPlan};
use crate::primes::is_prime;

pub const ID: &str = "fhe-math";

pub const POLICY: DecompositionPolicy = DecompositionPolicy {
    max_prime_bits: 62,
    min_prime_bits: 10,
    max_primes: 64,
};

/// `rq::Poly` tags its own representation, but `Mul` panics outside `Ntt`;
/// the wrapper keeps the harness-level domain next to it so the check stays
/// on our side.
#[derive(Clone, Debug, PartialEq)]
pub struct FheMathPoly {
    poly: Poly,
    domain: Domain,
}

impl FheMathPoly {
    pub fn inner(&self) -> &Poly {
        &self.poly
    }
}

/// `rq::Context` reports every rejected parameter as a plain string, so the
/// ones a plan can legitimately trip over are checked here first.
fn check_plan(plan: &ModulusPlan) -> Result<()> {
    let n = plan.degree;
    if n < 8 || !n.is_power_of_two() {
        return Err(Error::unsupported(ID, format!("degree {n} is not a power of two >= 8")));
    }
    if plan.moduli.is_empty() {
        return Err(Error::unsupported(ID, "empty modulus chain"));
    }
    let order = 2 * n as u64;
    for (i, &q) in plan.moduli.iter().enumerate() {
        if q >> 62 != 0 || !is_prime(q) || q % order != 1 {
            return Err(Error::unsupported(
                ID,
                format!("q = {q} is not a prime below 2^62 with q = 1 mod {order}"),
            ));
        }
        if plan.moduli[..i].contains(&q) {
            return Err(Error::unsupported(ID, format!("q = {q} appears twice")));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FheMathBackend;

impl PolyBackend for FheMathBackend {
    type Ring = Arc<Context>;
    type Poly = FheMathPoly;

    fn name(&self) -> &'static str {
        ID
    }

    fn build_ring(&self, plan: &ModulusPlan) -> Result<Arc<Context>> {
        check_plan(plan)?;
        Context::new(&plan.moduli, plan.degree)
            .map(Arc::new)
            .map_err(|e| match e {
                fhe_math::Error::InvalidModulus(_) => Error::unsupported(ID, e.to_string()),
                other => Error::backend(ID, other.to_string()),
            })
    }

    fn create_random_batch(
        &self,
        ring: &Arc<Context>,
        count: usize,
        rng: &mut HarnessRng,
    ) -> Result<Vec<FheMathPoly>> {
        Ok((0..count)
            .map(|_| FheMathPoly {
                poly: Poly::random(ring, Representation::PowerBasis, rng),
                domain: Domain::Coefficient,
            })
            .collect())
    }

    fn forward(&self, _ring: &Arc<Context>, p: &mut FheMathPoly) -> Result<()> {
        if p.domain != Domain::Coefficient {
            return Err(Error::backend(ID, "forward transform of an evaluation-domain polynomial"));
        }
        p.poly.change_representation(Representation::Ntt);
        p.domain = Domain::Evaluation;
        Ok(())
    }

    fn inverse(&self, _ring: &Arc<Context>, p: &mut FheMathPoly) -> Result<()> {
        if p.domain != Domain::Evaluation {
            return Err(Error::backend(ID, "inverse transform of a coefficient-domain polynomial"));
        }
        p.poly.change_representation(Representation::PowerBasis);
        p.domain = Domain::Coefficient;
        Ok(())
    }

    fn add(&self, _ring: &Arc<Context>, a: &FheMathPoly, b: &FheMathPoly) -> Result<FheMathPoly> {
        if a.domain != b.domain {
            return Err(Error::backend(ID, "add of polynomials in different domains"));
        }
        Ok(FheMathPoly {
            poly: &a.poly + &b.poly,
            domain: a.domain,
        })
    }

    fn multiply(
        &self,
        _ring: &Arc<Context>,
        a: &FheMathPoly,
        b: &FheMathPoly,
    ) -> Result<FheMathPoly> {
        if a.domain != Domain::Evaluation || b.domain != Domain::Evaluation {
            return Err(Error::backend(ID, "multiply needs both operands in the evaluation domain"));
        }
        Ok(FheMathPoly {
            poly: &a.poly * &b.poly,
            domain: Domain::Evaluation,
        })
    }

    fn domain(&self, p: &FheMathPoly) -> Domain {
        p.domain
    }
}
