//! NTT-friendly prime search and primitive roots.

// ------------------------------------------------------------
// modular helpers
// ------------------------------------------------------------
#[inline]
pub fn mod_mul(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

#[inline]
pub fn mod_pow(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut res = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            res = mod_mul(res, base, m);
        }
        base = mod_mul(base, base, m);
        exp >>= 1;
    }
    res
}

/// Inverse modulo a prime `m`.
#[inline]
pub fn mod_inv(x: u64, m: u64) -> u64 {
    mod_pow(x, m - 2, m)
}

// ------------------------------------------------------------
// primality
// ------------------------------------------------------------

/// Deterministic Miller-Rabin for every `u64`.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    'witness: for &a in &WITNESSES {
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mod_mul(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Up to `count` distinct primes of exactly `bits` bits with `p ≡ 1 (mod 2·degree)`,
/// largest first. Returns fewer than `count` when the range runs out.
pub fn ntt_primes(bits: u32, degree: usize, count: usize) -> Vec<u64> {
    let mut found = Vec::with_capacity(count);
    if !(2..=63).contains(&bits) || degree == 0 {
        return found;
    }
    let m = 2 * degree as u64;
    let lo = 1u64 << (bits - 1);
    let hi = (1u64 << bits) - 1;
    if hi < m + 1 {
        return found;
    }
    let mut cand = hi - ((hi - 1) % m);
    while cand >= lo && found.len() < count {
        if is_prime(cand) {
            found.push(cand);
        }
        match cand.checked_sub(m) {
            Some(next) => cand = next,
            None => break,
        }
    }
    found
}

// ------------------------------------------------------------
// primitive roots
// ------------------------------------------------------------
fn factorize(mut n: u64) -> Vec<u64> {
    let mut f = Vec::new();
    let mut p = 2u64;
    while p * p <= n {
        if n % p == 0 {
            f.push(p);
            while n % p == 0 {
                n /= p;
            }
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if n > 1 {
        f.push(n);
    }
    f
}

fn is_primitive_root(g: u64, modu: u64, factors: &[u64]) -> bool {
    factors
        .iter()
        .all(|&p| mod_pow(g, (modu - 1) / p, modu) != 1)
}

/// Smallest generator of the multiplicative group of the prime `modu`.
/// Trial division of `modu - 1` keeps this to word-sized primes.
pub fn find_primitive_root(modu: u64) -> u64 {
    let factors = factorize(modu - 1);
    let mut g = 2u64;
    while !is_primitive_root(g, modu, &factors) {
        g += 1;
    }
    g
}

/// Primitive `order`-th root of unity modulo the prime `modu`, if `order | modu - 1`.
pub fn root_of_unity(order: u64, modu: u64) -> Option<u64> {
    if order == 0 || (modu - 1) % order != 0 {
        return None;
    }
    let g = find_primitive_root(modu);
    Some(mod_pow(g, (modu - 1) / order, modu))
}
