//! Single-prime polynomial backend on `concrete-ntt`.
//!
//! `Plan::fwd` leaves the evaluation vector in the library's own order; the
//! pointwise product is order-agnostic and `inv` + `normalize` undo it.

use concrete_ntt::prime64::Plan;
use rand::Rng;
use rand_distr::Uniform;

use crate::adapter::{Domain, HarnessRng, PolyBackend};
use crate::error::{Error, Result};
use crate::mapper::{DecompositionPolicy, ModulusPlan};

pub const ID: &str = "concrete-ntt";

pub const POLICY: DecompositionPolicy = DecompositionPolicy {
    max_prime_bits: 62,
    min_prime_bits: 10,
    max_primes: 1,
};

#[derive(Clone, Debug)]
pub struct ConcreteRing {
    plan: Plan,
    modulus: u64,
    degree: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcretePoly {
    coeffs: Vec<u64>,
    domain: Domain,
}

impl ConcretePoly {
    pub fn coefficients(&self) -> &[u64] {
        &self.coeffs
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConcreteBackend;

impl PolyBackend for ConcreteBackend {
    type Ring = ConcreteRing;
    type Poly = ConcretePoly;

    fn name(&self) -> &'static str {
        ID
    }

    fn build_ring(&self, plan: &ModulusPlan) -> Result<ConcreteRing> {
        let [modulus] = plan.moduli[..] else {
            return Err(Error::unsupported(
                ID,
                format!("expects a single prime, got {}", plan.moduli.len()),
            ));
        };
        let ntt = Plan::try_new(plan.degree, modulus).ok_or_else(|| {
            Error::unsupported(ID, format!("no plan for q = {modulus}, n = {}", plan.degree))
        })?;
        Ok(ConcreteRing {
            plan: ntt,
            modulus,
            degree: plan.degree,
        })
    }

    fn create_random_batch(
        &self,
        ring: &ConcreteRing,
        count: usize,
        rng: &mut HarnessRng,
    ) -> Result<Vec<ConcretePoly>> {
        let dist = Uniform::new(0, ring.modulus);
        Ok((0..count)
            .map(|_| ConcretePoly {
                coeffs: (0..ring.degree).map(|_| rng.sample(dist)).collect(),
                domain: Domain::Coefficient,
            })
            .collect())
    }

    fn forward(&self, ring: &ConcreteRing, p: &mut ConcretePoly) -> Result<()> {
        if p.domain != Domain::Coefficient {
            return Err(Error::backend(ID, "forward transform of an evaluation-domain polynomial"));
        }
        ring.plan.fwd(&mut p.coeffs);
        p.domain = Domain::Evaluation;
        Ok(())
    }

    fn inverse(&self, ring: &ConcreteRing, p: &mut ConcretePoly) -> Result<()> {
        if p.domain != Domain::Evaluation {
            return Err(Error::backend(ID, "inverse transform of a coefficient-domain polynomial"));
        }
        ring.plan.inv(&mut p.coeffs);
        ring.plan.normalize(&mut p.coeffs);
        p.domain = Domain::Coefficient;
        Ok(())
    }

    fn add(&self, ring: &ConcreteRing, a: &ConcretePoly, b: &ConcretePoly) -> Result<ConcretePoly> {
        if a.domain != b.domain {
            return Err(Error::backend(ID, "add of polynomials in different domains"));
        }
        let q = ring.modulus;
        let coeffs = a
            .coeffs
            .iter()
            .zip(&b.coeffs)
            .map(|(&x, &y)| {
                let s = x + y;
                if s >= q {
                    s - q
                } else {
                    s
                }
            })
            .collect();
        Ok(ConcretePoly {
            coeffs,
            domain: a.domain,
        })
    }

    fn multiply(
        &self,
        ring: &ConcreteRing,
        a: &ConcretePoly,
        b: &ConcretePoly,
    ) -> Result<ConcretePoly> {
        if a.domain != Domain::Evaluation || b.domain != Domain::Evaluation {
            return Err(Error::backend(ID, "multiply needs both operands in the evaluation domain"));
        }
        let q = ring.modulus as u128;
        let coeffs = a
            .coeffs
            .iter()
            .zip(&b.coeffs)
            .map(|(&x, &y)| (x as u128 * y as u128 % q) as u64)
            .collect();
        Ok(ConcretePoly {
            coeffs,
            domain: Domain::Evaluation,
        })
    }

    fn domain(&self, p: &ConcretePoly) -> Domain {
        p.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Disposition;
    use crate::mapper::ParameterMapper;
    use crate::primes::mod_mul;
    use crate::tier::BitTier;
    use rand::SeedableRng;

    fn ring(degree: usize, tier: BitTier) -> ConcreteRing {
        let plan = ParameterMapper::new(degree, 8192, 65537)
            .resolve(ID, tier.into())
            .unwrap();
        ConcreteBackend.build_ring(&plan).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let ring = ring(256, BitTier::B60);
        let mut rng = HarnessRng::seed_from_u64(31);
        let orig = ConcreteBackend.create_random_batch(&ring, 3, &mut rng).unwrap();
        for p in &orig {
            assert_eq!(p.coefficients().len(), 256);
            let mut x = p.clone();
            ConcreteBackend.forward(&ring, &mut x).unwrap();
            ConcreteBackend.inverse(&ring, &mut x).unwrap();
            assert_eq!(&x, p);
        }
    }

    #[test]
    fn test_multiply_by_x_shifts_negacyclically() {
        let ring = ring(256, BitTier::B30);
        let q = ring.modulus;
        let mut rng = HarnessRng::seed_from_u64(32);
        let a = ConcreteBackend.create_random_batch(&ring, 1, &mut rng).unwrap().remove(0);
        let mut x = ConcretePoly {
            coeffs: vec![0; 256],
            domain: Domain::Coefficient,
        };
        x.coeffs[1] = 1;

        let mut fa = a.clone();
        ConcreteBackend.forward(&ring, &mut fa).unwrap();
        ConcreteBackend.forward(&ring, &mut x).unwrap();
        let mut c = ConcreteBackend.multiply(&ring, &fa, &x).unwrap();
        ConcreteBackend.inverse(&ring, &mut c).unwrap();

        assert_eq!(c.coeffs[0], mod_mul(a.coeffs[255], q - 1, q));
        assert_eq!(&c.coeffs[1..], &a.coeffs[..255]);
    }

    #[test]
    fn test_multi_prime_plan_is_unsupported() {
        let mut plan = ParameterMapper::new(256, 8192, 65537)
            .resolve(ID, BitTier::B30.into())
            .unwrap();
        plan.moduli.push(plan.moduli[0]);
        let err = ConcreteBackend.build_ring(&plan).unwrap_err();
        assert_eq!(err.disposition(), Disposition::Skip);
    }
}
