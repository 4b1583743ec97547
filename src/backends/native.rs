//! In-crate RNS backend over 32-bit words.
//!
//! Residues live in 32-byte aligned lanes so vectorized loops see aligned
//! loads; products are reduced through `u64`, which caps primes at 30 bits.
//! Wider tiers therefore always arrive here as several CRT primes.

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use rand_distr::Uniform;

use crate::adapter::{Domain, HarnessRng, PolyBackend};
use crate::error::{Error, Result};
use crate::mapper::{DecompositionPolicy, ModulusPlan};
use crate::ntt::{add_mod, pointwise_mul, NttTable};

pub const ID: &str = "native";

pub const POLICY: DecompositionPolicy = DecompositionPolicy {
    max_prime_bits: 30,
    min_prime_bits: 10,
    max_primes: 8,
};

/// Byte alignment of every residue buffer.
pub const ALIGNMENT: usize = 32;
const LANE_WORDS: usize = ALIGNMENT / std::mem::size_of::<u32>();

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, align(32))]
struct Lane([u32; LANE_WORDS]);

/// NTT tables for every CRT prime of one plan.
#[derive(Clone, Debug)]
pub struct NativeRing {
    degree: usize,
    tables: Vec<NttTable>,
}

impl NativeRing {
    pub fn moduli(&self) -> impl Iterator<Item = u32> + '_ {
        self.tables.iter().map(NttTable::modulus)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn prime_count(&self) -> usize {
        self.tables.len()
    }

    fn words(&self) -> usize {
        self.degree * self.tables.len()
    }
}

/// Residue-major polynomial: residue `i` occupies words `[i·n, (i+1)·n)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativePoly {
    lanes: Vec<Lane>,
    domain: Domain,
}

impl NativePoly {
    pub(crate) fn zeroed(ring: &NativeRing, domain: Domain) -> Self {
        Self {
            lanes: vec![Lane::zeroed(); ring.words() / LANE_WORDS],
            domain,
        }
    }

    pub(crate) fn words(&self) -> &[u32] {
        bytemuck::cast_slice(&self.lanes)
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        bytemuck::cast_slice_mut(&mut self.lanes)
    }

    /// Residue of this polynomial modulo the `i`-th prime of `ring`.
    pub fn residue(&self, ring: &NativeRing, i: usize) -> &[u32] {
        &self.words()[i * ring.degree..(i + 1) * ring.degree]
    }

    pub fn address(&self) -> usize {
        self.lanes.as_ptr() as usize
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    /// Coefficient-wise `op` over every residue; the result takes `a`'s domain.
    pub(crate) fn zip_with(
        &self,
        ring: &NativeRing,
        a: &NativePoly,
        b: &NativePoly,
        op: fn(u32, u32, u32) -> u32,
    ) -> NativePoly {
        let mut out = NativePoly::zeroed(ring, a.domain);
        let n = ring.degree;
        let chunks = out
            .words_mut()
            .chunks_exact_mut(n)
            .zip(a.words().chunks_exact(n))
            .zip(b.words().chunks_exact(n))
            .zip(&ring.tables);
        for (((c, x), y), table) in chunks {
            let q = table.modulus();
            for ((ci, &xi), &yi) in c.iter_mut().zip(x).zip(y) {
                *ci = op(xi, yi, q);
            }
        }
        out
    }
}

impl PolyBackend for NativeBackend {
    type Ring = NativeRing;
    type Poly = NativePoly;

    fn name(&self) -> &'static str {
        ID
    }

    fn build_ring(&self, plan: &ModulusPlan) -> Result<NativeRing> {
        if plan.degree % LANE_WORDS != 0 {
            return Err(Error::unsupported(
                ID,
                format!("degree {} is not a multiple of {LANE_WORDS}", plan.degree),
            ));
        }
        let tables = plan
            .moduli
            .iter()
            .map(|&q| {
                u32::try_from(q)
                    .ok()
                    .and_then(|q| NttTable::new(q, plan.degree))
                    .ok_or_else(|| {
                        Error::unsupported(ID, format!("no word-sized NTT for q = {q}, n = {}", plan.degree))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(NativeRing {
            degree: plan.degree,
            tables,
        })
    }

    fn create_random_batch(
        &self,
        ring: &NativeRing,
        count: usize,
        rng: &mut HarnessRng,
    ) -> Result<Vec<NativePoly>> {
        let dists: Vec<Uniform<u32>> = ring.moduli().map(|q| Uniform::new(0, q)).collect();
        let batch = (0..count)
            .map(|_| {
                let mut p = NativePoly::zeroed(ring, Domain::Coefficient);
                for (residue, dist) in p.words_mut().chunks_exact_mut(ring.degree).zip(&dists) {
                    for c in residue.iter_mut() {
                        *c = rng.sample(dist);
                    }
                }
                p
            })
            .collect();
        Ok(batch)
    }

    fn forward(&self, ring: &NativeRing, poly: &mut NativePoly) -> Result<()> {
        if poly.domain != Domain::Coefficient {
            return Err(Error::backend(ID, "forward transform of an evaluation-domain polynomial"));
        }
        for (residue, table) in poly.words_mut().chunks_exact_mut(ring.degree).zip(&ring.tables) {
            table.forward(residue);
        }
        poly.domain = Domain::Evaluation;
        Ok(())
    }

    fn inverse(&self, ring: &NativeRing, poly: &mut NativePoly) -> Result<()> {
        if poly.domain != Domain::Evaluation {
            return Err(Error::backend(ID, "inverse transform of a coefficient-domain polynomial"));
        }
        for (residue, table) in poly.words_mut().chunks_exact_mut(ring.degree).zip(&ring.tables) {
            table.backward(residue);
        }
        poly.domain = Domain::Coefficient;
        Ok(())
    }

    fn add(&self, ring: &NativeRing, a: &NativePoly, b: &NativePoly) -> Result<NativePoly> {
        if a.domain != b.domain {
            return Err(Error::backend(ID, "add of polynomials in different domains"));
        }
        Ok(self.zip_with(ring, a, b, add_mod))
    }

    fn multiply(&self, ring: &NativeRing, a: &NativePoly, b: &NativePoly) -> Result<NativePoly> {
        if a.domain != Domain::Evaluation || b.domain != Domain::Evaluation {
            return Err(Error::backend(ID, "multiply needs both operands in the evaluation domain"));
        }
        Ok(self.zip_with(ring, a, b, pointwise_mul))
    }

    fn domain(&self, poly: &NativePoly) -> Domain {
        poly.domain
    }
}
