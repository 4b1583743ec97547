//! In-crate BGV scheme over the native RNS ring.
//!
//! Ciphertexts are pairs of evaluation-domain polynomials and stay there
//! between operations. Plaintext slots are the NTT image of the message
//! polynomial modulo `t`, so the plaintext modulus must be a prime
//! `≡ 1 mod 2n`. Products are relinearized straight away with one
//! key-switching pair per RNS digit of `s²`.
//!
//! Context construction is a handful of table builds and is reported as
//! part of key generation.

use num_bigint::BigUint;
use rand::Rng;
use rand_distr::{Normal, Uniform};

use crate::adapter::{ContextStage, Domain, HarnessRng, PolyBackend, SchemeBackend};
use crate::backends::native::{NativeBackend, NativePoly, NativeRing};
use crate::error::{Error, Result};
use crate::mapper::{DecompositionPolicy, ModulusPlan};
use crate::ntt::{add_mod, sub_mod, NttTable};
use crate::primes::{is_prime, mod_inv, mod_mul};

pub const ID: &str = "native-bgv";

pub const POLICY: DecompositionPolicy = DecompositionPolicy {
    max_prime_bits: 30,
    min_prime_bits: 10,
    max_primes: 32,
};

/// Standard deviation of the error distribution.
pub const SIGMA: f64 = 3.19;

const NATIVE: NativeBackend = NativeBackend;

fn relabel(e: Error) -> Error {
    match e {
        Error::UnsupportedParameter { reason, .. } => Error::unsupported(ID, reason),
        Error::BackendOperationFailure { reason, .. } => Error::backend(ID, reason),
        other => other,
    }
}

/// Rough `log2` of the noise after two chained products, fresh ciphertexts
/// in, relinearization included.
pub fn depth_two_noise_bits(degree: usize, t: u64) -> u32 {
    let log_n = degree.trailing_zeros() as f64;
    let fresh = (t as f64).log2() + log_n / 2.0 + 5.0;
    (3.0 * fresh + log_n + 1.0).ceil() as u32
}

fn centered(x: u64, t: u64) -> i64 {
    if x > t / 2 {
        x as i64 - t as i64
    } else {
        x as i64
    }
}

// ------------------------------------------------------------
// CRT reconstruction
// ------------------------------------------------------------

/// Recombines RNS residues into `[x]_Q` centered around zero, reduced mod `t`.
#[derive(Clone, Debug)]
struct CrtLift {
    modulus: BigUint,
    half: BigUint,
    /// `(Q/q_i) · [(Q/q_i)^-1]_{q_i}`
    basis: Vec<BigUint>,
    t: u64,
    q_mod_t: u64,
}

fn low_u64(x: &BigUint) -> u64 {
    x.iter_u64_digits().next().unwrap_or(0)
}

impl CrtLift {
    fn new(moduli: &[u64], t: u64) -> Self {
        let modulus = moduli.iter().fold(BigUint::from(1u32), |acc, &q| acc * q);
        let basis = moduli
            .iter()
            .enumerate()
            .map(|(i, &qi)| {
                let others = || moduli.iter().enumerate().filter(move |&(j, _)| j != i);
                let rest = others().fold(BigUint::from(1u32), |acc, (_, &q)| acc * q);
                let rest_mod = others().fold(1u64, |acc, (_, &q)| mod_mul(acc, q % qi, qi));
                rest * mod_inv(rest_mod, qi)
            })
            .collect();
        let half = &modulus >> 1u32;
        let q_mod_t = low_u64(&(&modulus % t));
        Self {
            modulus,
            half,
            basis,
            t,
            q_mod_t,
        }
    }

    fn centered_mod_t(&self, residues: impl Iterator<Item = u32>) -> u64 {
        let x = self
            .basis
            .iter()
            .zip(residues)
            .fold(BigUint::default(), |acc, (b, r)| acc + b * r)
            % &self.modulus;
        let r = low_u64(&(&x % self.t));
        if x > self.half {
            (r + self.t - self.q_mod_t) % self.t
        } else {
            r
        }
    }
}

// ------------------------------------------------------------
// context, keys, ciphertexts
// ------------------------------------------------------------

pub struct BgvContext {
    ring: NativeRing,
    slots: NttTable,
    t: u64,
    crt: CrtLift,
}

impl BgvContext {
    pub fn degree(&self) -> usize {
        self.ring.degree()
    }

    pub fn plaintext_modulus(&self) -> u64 {
        self.t
    }

    fn add(&self, a: &NativePoly, b: &NativePoly) -> Result<NativePoly> {
        NATIVE.add(&self.ring, a, b).map_err(relabel)
    }

    fn mul(&self, a: &NativePoly, b: &NativePoly) -> Result<NativePoly> {
        NATIVE.multiply(&self.ring, a, b).map_err(relabel)
    }

    fn sub(&self, a: &NativePoly, b: &NativePoly) -> NativePoly {
        NATIVE.zip_with(&self.ring, a, b, sub_mod)
    }

    /// Signed integer polynomial, moved into the evaluation domain.
    fn lift(&self, coeffs: &[i64]) -> Result<NativePoly> {
        let n = self.degree();
        let mut p = NativePoly::zeroed(&self.ring, Domain::Coefficient);
        for (residue, q) in p.words_mut().chunks_exact_mut(n).zip(self.ring.moduli()) {
            let q = q as i64;
            for (w, &c) in residue.iter_mut().zip(coeffs) {
                *w = c.rem_euclid(q) as u32;
            }
        }
        NATIVE.forward(&self.ring, &mut p).map_err(relabel)?;
        Ok(p)
    }

    fn uniform(&self, rng: &mut HarnessRng) -> NativePoly {
        let n = self.degree();
        let mut p = NativePoly::zeroed(&self.ring, Domain::Evaluation);
        for (residue, q) in p.words_mut().chunks_exact_mut(n).zip(self.ring.moduli()) {
            let dist = Uniform::new(0, q);
            for w in residue.iter_mut() {
                *w = rng.sample(dist);
            }
        }
        p
    }

    fn ternary(&self, rng: &mut HarnessRng) -> Vec<i64> {
        (0..self.degree()).map(|_| rng.gen_range(-1..=1)).collect()
    }

    /// `t·e` with `e` drawn from the rounded normal distribution.
    fn scaled_error(&self, rng: &mut HarnessRng) -> Result<Vec<i64>> {
        let normal = Normal::new(0.0, SIGMA).map_err(|e| Error::backend(ID, e.to_string()))?;
        let t = self.t as i64;
        Ok((0..self.degree())
            .map(|_| t * rng.sample(normal).round() as i64)
            .collect())
    }

    /// `(-(a·s + t·e), a)` for a fresh uniform `a`.
    fn rlwe_sample(
        &self,
        secret: &NativePoly,
        rng: &mut HarnessRng,
    ) -> Result<(NativePoly, NativePoly)> {
        let a = self.uniform(rng);
        let neg_te: Vec<i64> = self.scaled_error(rng)?.into_iter().map(|x| -x).collect();
        let b = self.sub(&self.lift(&neg_te)?, &self.mul(&a, secret)?);
        Ok((b, a))
    }

    /// Folds the quadratic term back into a two-part ciphertext.
    fn relinearize(
        &self,
        keys: &[(NativePoly, NativePoly)],
        mut quad: NativePoly,
    ) -> Result<(NativePoly, NativePoly)> {
        let n = self.degree();
        NATIVE.inverse(&self.ring, &mut quad).map_err(relabel)?;
        let mut acc0 = NativePoly::zeroed(&self.ring, Domain::Evaluation);
        let mut acc1 = NativePoly::zeroed(&self.ring, Domain::Evaluation);
        for (i, (k0, k1)) in keys.iter().enumerate() {
            let src = quad.residue(&self.ring, i);
            let mut digit = NativePoly::zeroed(&self.ring, Domain::Coefficient);
            for (residue, q) in digit.words_mut().chunks_exact_mut(n).zip(self.ring.moduli()) {
                for (w, &c) in residue.iter_mut().zip(src) {
                    *w = c % q;
                }
            }
            NATIVE.forward(&self.ring, &mut digit).map_err(relabel)?;
            acc0 = self.add(&acc0, &self.mul(&digit, k0)?)?;
            acc1 = self.add(&acc1, &self.mul(&digit, k1)?)?;
        }
        Ok((acc0, acc1))
    }
}

pub struct BgvKeyPair {
    secret: NativePoly,
    public: (NativePoly, NativePoly),
    /// One key-switching pair per RNS digit of `s²`.
    relin: Vec<(NativePoly, NativePoly)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BgvCiphertext {
    c0: NativePoly,
    c1: NativePoly,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBgvBackend;

impl SchemeBackend for NativeBgvBackend {
    type Context = BgvContext;
    type KeyPair = BgvKeyPair;
    type Ciphertext = BgvCiphertext;

    fn name(&self) -> &'static str {
        ID
    }

    fn context_stage(&self) -> ContextStage {
        ContextStage::FoldedIntoKeyGen
    }

    fn build_context(&self, plan: &ModulusPlan) -> Result<BgvContext> {
        let ring = NATIVE.build_ring(plan).map_err(relabel)?;
        let t = plan.plaintext_modulus;
        let slots = u32::try_from(t)
            .ok()
            .filter(|&t| is_prime(t as u64) && !plan.moduli.contains(&(t as u64)))
            .and_then(|t| NttTable::new(t, plan.degree))
            .ok_or_else(|| {
                Error::unsupported(ID, format!("t = {t} gives no {} plaintext slots", plan.degree))
            })?;
        let needed = depth_two_noise_bits(plan.degree, t);
        if plan.achieved_bits() <= needed {
            return Err(Error::unsupported(
                ID,
                format!(
                    "{}-bit modulus cannot absorb two products (about {needed} bits of noise)",
                    plan.achieved_bits()
                ),
            ));
        }
        Ok(BgvContext {
            crt: CrtLift::new(&plan.moduli, t),
            ring,
            slots,
            t,
        })
    }

    fn generate_key_pair(&self, ctx: &BgvContext, rng: &mut HarnessRng) -> Result<BgvKeyPair> {
        let n = ctx.degree();
        let secret = ctx.lift(&ctx.ternary(rng))?;
        let public = ctx.rlwe_sample(&secret, rng)?;
        let s2 = ctx.mul(&secret, &secret)?;
        let relin = ctx
            .ring
            .moduli()
            .enumerate()
            .map(|(i, q)| {
                let (mut k0, k1) = ctx.rlwe_sample(&secret, rng)?;
                // s² times the i-th CRT idempotent: 1 mod q_i, 0 mod every other prime
                let dst = &mut k0.words_mut()[i * n..(i + 1) * n];
                for (w, &x) in dst.iter_mut().zip(s2.residue(&ctx.ring, i)) {
                    *w = add_mod(*w, x, q);
                }
                Ok((k0, k1))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BgvKeyPair {
            secret,
            public,
            relin,
        })
    }

    fn encrypt(
        &self,
        ctx: &BgvContext,
        keys: &BgvKeyPair,
        values: &[u64],
        rng: &mut HarnessRng,
    ) -> Result<BgvCiphertext> {
        let n = ctx.degree();
        if values.len() > n {
            return Err(Error::backend(
                ID,
                format!("{} values do not fit in {n} slots", values.len()),
            ));
        }
        let t = ctx.t;
        let mut message = vec![0u32; n];
        for (m, &v) in message.iter_mut().zip(values) {
            *m = (v % t) as u32;
        }
        ctx.slots.backward(&mut message);

        let u = ctx.lift(&ctx.ternary(rng))?;
        let m_plus_te: Vec<i64> = message
            .iter()
            .zip(ctx.scaled_error(rng)?)
            .map(|(&m, te)| centered(m as u64, t) + te)
            .collect();
        let te = ctx.scaled_error(rng)?;

        let (p0, p1) = &keys.public;
        Ok(BgvCiphertext {
            c0: ctx.add(&ctx.mul(p0, &u)?, &ctx.lift(&m_plus_te)?)?,
            c1: ctx.add(&ctx.mul(p1, &u)?, &ctx.lift(&te)?)?,
        })
    }

    fn hom_add(
        &self,
        ctx: &BgvContext,
        _keys: &BgvKeyPair,
        a: &BgvCiphertext,
        b: &BgvCiphertext,
    ) -> Result<BgvCiphertext> {
        Ok(BgvCiphertext {
            c0: ctx.add(&a.c0, &b.c0)?,
            c1: ctx.add(&a.c1, &b.c1)?,
        })
    }

    fn hom_multiply(
        &self,
        ctx: &BgvContext,
        keys: &BgvKeyPair,
        a: &BgvCiphertext,
        b: &BgvCiphertext,
    ) -> Result<BgvCiphertext> {
        let d0 = ctx.mul(&a.c0, &b.c0)?;
        let d1 = ctx.add(&ctx.mul(&a.c0, &b.c1)?, &ctx.mul(&a.c1, &b.c0)?)?;
        let d2 = ctx.mul(&a.c1, &b.c1)?;
        let (r0, r1) = ctx.relinearize(&keys.relin, d2)?;
        Ok(BgvCiphertext {
            c0: ctx.add(&d0, &r0)?,
            c1: ctx.add(&d1, &r1)?,
        })
    }

    fn decrypt(
        &self,
        ctx: &BgvContext,
        keys: &BgvKeyPair,
        ct: &BgvCiphertext,
        len: usize,
    ) -> Result<Vec<u64>> {
        let n = ctx.degree();
        if len > n {
            return Err(Error::backend(ID, format!("{len} slots requested, {n} available")));
        }
        let mut x = ctx.add(&ct.c0, &ctx.mul(&ct.c1, &keys.secret)?)?;
        NATIVE.inverse(&ctx.ring, &mut x).map_err(relabel)?;

        let residues: Vec<&[u32]> = (0..ctx.ring.prime_count())
            .map(|i| x.residue(&ctx.ring, i))
            .collect();
        let mut plain: Vec<u32> = (0..n)
            .map(|k| ctx.crt.centered_mod_t(residues.iter().map(|r| r[k])) as u32)
            .collect();
        ctx.slots.forward(&mut plain);
        Ok(plain[..len].iter().map(|&v| v as u64).collect())
    }
}
