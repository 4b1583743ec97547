//! Negacyclic NTT over word-sized primes (`q < 2^31`).
//!
//! Forward transform is Cooley-Tukey with the `ψ` twist merged into the
//! butterflies (natural order in, bit-reversed out), the inverse is
//! Gentleman-Sande (bit-reversed in, natural order out). Both run in place.

use crate::primes::{mod_inv, mod_pow, root_of_unity};

#[inline]
fn mul_mod(a: u32, b: u32, q: u32) -> u32 {
    ((a as u64 * b as u64) % q as u64) as u32
}

#[inline]
pub fn add_mod(a: u32, b: u32, q: u32) -> u32 {
    let s = a + b;
    if s >= q {
        s - q
    } else {
        s
    }
}

#[inline]
pub fn sub_mod(a: u32, b: u32, q: u32) -> u32 {
    if a >= b {
        a - b
    } else {
        a + q - b
    }
}

#[inline]
pub fn pointwise_mul(a: u32, b: u32, q: u32) -> u32 {
    mul_mod(a, b, q)
}

fn bit_reverse(mut x: usize, log_n: u32) -> usize {
    let mut r = 0;
    for _ in 0..log_n {
        r = (r << 1) | (x & 1);
        x >>= 1;
    }
    r
}

/// Precomputed twiddles for one prime and one ring degree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NttTable {
    q: u32,
    n: usize,
    /// `ψ^bitrev(i)` for `ψ` a primitive `2n`-th root of unity.
    psi_rev: Vec<u32>,
    inv_psi_rev: Vec<u32>,
    n_inv: u32,
}

impl NttTable {
    /// `None` unless `q < 2^31` is prime-like with `q ≡ 1 mod 2n` and `n` a power of two.
    pub fn new(q: u32, n: usize) -> Option<Self> {
        if !n.is_power_of_two() || n < 2 || q >= 1 << 31 {
            return None;
        }
        let q64 = q as u64;
        let psi = root_of_unity(2 * n as u64, q64)?;
        let psi_inv = mod_inv(psi, q64);
        let log_n = n.trailing_zeros();

        let mut psi_rev = vec![0u32; n];
        let mut inv_psi_rev = vec![0u32; n];
        for i in 0..n {
            let e = bit_reverse(i, log_n) as u64;
            psi_rev[i] = mod_pow(psi, e, q64) as u32;
            inv_psi_rev[i] = mod_pow(psi_inv, e, q64) as u32;
        }
        let n_inv = mod_inv(n as u64 % q64, q64) as u32;

        Some(Self {
            q,
            n,
            psi_rev,
            inv_psi_rev,
            n_inv,
        })
    }

    pub fn modulus(&self) -> u32 {
        self.q
    }

    pub fn degree(&self) -> usize {
        self.n
    }

    /// Coefficient → evaluation, in place.
    pub fn forward(&self, a: &mut [u32]) {
        assert_eq!(a.len(), self.n, "slice length must equal the ring degree");
        let q = self.q;
        let mut t = self.n;
        let mut m = 1;
        while m < self.n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let s = self.psi_rev[m + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = mul_mod(a[j + t], s, q);
                    a[j] = add_mod(u, v, q);
                    a[j + t] = sub_mod(u, v, q);
                }
            }
            m <<= 1;
        }
    }

    /// Evaluation → coefficient, in place. Exact inverse of [`forward`](Self::forward).
    pub fn backward(&self, a: &mut [u32]) {
        assert_eq!(a.len(), self.n, "slice length must equal the ring degree");
        let q = self.q;
        let mut t = 1;
        let mut m = self.n;
        while m > 1 {
            let h = m >> 1;
            let mut j1 = 0;
            for i in 0..h {
                let s = self.inv_psi_rev[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = add_mod(u, v, q);
                    a[j + t] = mul_mod(sub_mod(u, v, q), s, q);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m = h;
        }
        for x in a.iter_mut() {
            *x = mul_mod(*x, self.n_inv, q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn negacyclic_schoolbook(a: &[u32], b: &[u32], q: u32) -> Vec<u32> {
        let n = a.len();
        let mut c = vec![0u32; n];
        for i in 0..n {
            for j in 0..n {
                let prod = mul_mod(a[i], b[j], q);
                let k = i + j;
                if k < n {
                    c[k] = add_mod(c[k], prod, q);
                } else {
                    c[k - n] = sub_mod(c[k - n], prod, q);
                }
            }
        }
        c
    }

    #[test]
    fn test_table_rejects_unfriendly_prime() {
        // 65537 - 1 = 2^16, so degree 2^16 would need 2^17 | q - 1
        assert!(NttTable::new(65537, 1 << 16).is_none());
        assert!(NttTable::new(12289, 100).is_none());
        assert!(NttTable::new(12289, 256).is_some());
    }

    #[test]
    fn test_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let table = NttTable::new(12289, 256).unwrap();
        let orig: Vec<u32> = (0..256).map(|_| rng.gen_range(0..12289)).collect();
        let mut a = orig.clone();
        table.forward(&mut a);
        assert_ne!(a, orig);
        table.backward(&mut a);
        assert_eq!(a, orig);
    }

    #[test]
    fn test_pointwise_product_is_negacyclic_convolution() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let q = 257;
        let n = 16;
        let table = NttTable::new(q, n).unwrap();
        let a: Vec<u32> = (0..n).map(|_| rng.gen_range(0..q)).collect();
        let b: Vec<u32> = (0..n).map(|_| rng.gen_range(0..q)).collect();
        let expected = negacyclic_schoolbook(&a, &b, q);

        let (mut fa, mut fb) = (a.clone(), b.clone());
        table.forward(&mut fa);
        table.forward(&mut fb);
        let mut fc: Vec<u32> = fa.iter().zip(&fb).map(|(&x, &y)| pointwise_mul(x, y, q)).collect();
        table.backward(&mut fc);
        assert_eq!(fc, expected);
    }

    #[test]
    fn test_x_times_x_pow_n_minus_1_wraps_to_minus_one() {
        let q = 257;
        let n = 8;
        let table = NttTable::new(q, n).unwrap();
        let mut x = vec![0u32; n];
        x[1] = 1;
        let mut y = vec![0u32; n];
        y[n - 1] = 1;
        table.forward(&mut x);
        table.forward(&mut y);
        let mut z: Vec<u32> = x.iter().zip(&y).map(|(&a, &b)| pointwise_mul(a, b, q)).collect();
        table.backward(&mut z);
        let mut expected = vec![0u32; n];
        expected[0] = q - 1;
        assert_eq!(z, expected);
    }
}
