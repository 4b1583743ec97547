//! Parameter mapper: abstract tier → backend-ready modulus plan.
//!
//! Every backend gets a decomposition policy describing the primes it can
//! build natively. A target that does not fit in one prime is split into `C`
//! equal CRT primes of `B = ⌊T / C⌋` bits, and the plan records what was
//! actually built so rows are never labelled with a modulus nobody used.

use std::collections::BTreeMap;

use num_integer::Integer;

use crate::backends::{concrete, fhe_bfv, fhe_math, native, native_bgv};
use crate::error::{Error, Result};
use crate::primes::ntt_primes;
use crate::tier::{SecurityTier, Tier};

/// Total `log2 q` budget per ring degree, quantum-safe column of the
/// homomorphic encryption standard (uniform secret): `[128, 192, 256]`.
pub const SECURITY_TABLE: [(usize, [u32; 3]); 6] = [
    (1024, [27, 19, 15]),
    (2048, [53, 37, 29]),
    (4096, [103, 72, 56]),
    (8192, [206, 143, 111]),
    (16384, [413, 286, 222]),
    (32768, [829, 573, 445]),
];

/// Largest modulus (in bits) allowed at `degree` for the security target.
pub fn recommended_modulus_bits(degree: usize, tier: SecurityTier) -> Option<u32> {
    let col = match tier {
        SecurityTier::S128 => 0,
        SecurityTier::S192 => 1,
        SecurityTier::S256 => 2,
    };
    SECURITY_TABLE
        .iter()
        .find(|(n, _)| *n == degree)
        .map(|(_, bits)| bits[col])
}

/// Which primes a backend can construct natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecompositionPolicy {
    pub max_prime_bits: u32,
    pub min_prime_bits: u32,
    pub max_primes: usize,
}

impl DecompositionPolicy {
    /// `(C, B)` for a target of `target` bits, or `None` when out of range.
    pub fn decompose(&self, target: u32) -> Option<(usize, u32)> {
        if target == 0 || self.max_prime_bits == 0 {
            return None;
        }
        let count = if target <= self.max_prime_bits {
            1
        } else {
            Integer::div_ceil(&target, &self.max_prime_bits)
        };
        let bits = Integer::div_floor(&target, &count);
        if bits < self.min_prime_bits || count as usize > self.max_primes {
            return None;
        }
        Some((count as usize, bits))
    }
}

/// Resolved parameters handed to one backend for one scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModulusPlan {
    pub backend: String,
    pub tier: Tier,
    /// Ring dimension `n` of `Z_q[X]/(X^n + 1)`.
    pub degree: usize,
    pub prime_count: usize,
    pub prime_bits: u32,
    /// CRT primes, largest first, each `≡ 1 mod 2n`.
    pub moduli: Vec<u64>,
    pub plaintext_modulus: u64,
    /// Requested total bits before decomposition.
    pub nominal_bits: u32,
}

impl ModulusPlan {
    pub fn cyclotomic_order(&self) -> usize {
        2 * self.degree
    }

    /// Total bits actually configured; the value reported in result rows.
    pub fn achieved_bits(&self) -> u32 {
        self.prime_count as u32 * self.prime_bits
    }

    pub fn is_decomposed(&self) -> bool {
        self.prime_count > 1
    }
}

/// Maps `(backend, tier)` to a [`ModulusPlan`]. Read-only once built.
#[derive(Clone, Debug)]
pub struct ParameterMapper {
    poly_degree: usize,
    scheme_degree: usize,
    plaintext_modulus: u64,
    policies: BTreeMap<String, DecompositionPolicy>,
}

impl ParameterMapper {
    pub fn new(poly_degree: usize, scheme_degree: usize, plaintext_modulus: u64) -> Self {
        let policies = [
            (native::ID, native::POLICY),
            (fhe_math::ID, fhe_math::POLICY),
            (concrete::ID, concrete::POLICY),
            (fhe_bfv::ID, fhe_bfv::POLICY),
            (native_bgv::ID, native_bgv::POLICY),
        ]
        .into_iter()
        .map(|(id, p)| (id.to_string(), p))
        .collect();
        Self {
            poly_degree,
            scheme_degree,
            plaintext_modulus,
            policies,
        }
    }

    /// Registers or replaces the policy of `backend`.
    #[must_use]
    pub fn with_policy(mut self, backend: &str, policy: DecompositionPolicy) -> Self {
        self.policies.insert(backend.to_string(), policy);
        self
    }

    pub fn policy(&self, backend: &str) -> Option<&DecompositionPolicy> {
        self.policies.get(backend)
    }

    pub fn resolve(&self, backend: &str, tier: Tier) -> Result<ModulusPlan> {
        let policy = self
            .policy(backend)
            .ok_or_else(|| Error::unsupported(backend, "no decomposition policy registered"))?;

        let (degree, target) = match tier {
            Tier::Bits(t) => (self.poly_degree, t.bits()),
            Tier::Security(t) => {
                let bits = recommended_modulus_bits(self.scheme_degree, t).ok_or_else(|| {
                    Error::unsupported(
                        backend,
                        format!("no security recommendation for degree {}", self.scheme_degree),
                    )
                })?;
                (self.scheme_degree, bits)
            }
        };

        let (prime_count, prime_bits) = policy.decompose(target).ok_or_else(|| {
            Error::unsupported(
                backend,
                format!(
                    "{target} bits cannot be split into at most {} primes of {}..={} bits",
                    policy.max_primes, policy.min_prime_bits, policy.max_prime_bits
                ),
            )
        })?;

        let moduli = ntt_primes(prime_bits, degree, prime_count);
        if moduli.len() < prime_count {
            return Err(Error::unsupported(
                backend,
                format!(
                    "only {} of {prime_count} {prime_bits}-bit primes are 1 mod {}",
                    moduli.len(),
                    2 * degree
                ),
            ));
        }

        Ok(ModulusPlan {
            backend: backend.to_string(),
            tier,
            degree,
            prime_count,
            prime_bits,
            moduli,
            plaintext_modulus: self.plaintext_modulus,
            nominal_bits: target,
        })
    }
}
