//! Reed-Solomon coding for QR codewords
//! QR codes use RS over GF(256) with primitive polynomial x^8 + x^4 + x^3 + x^2 + 1
//! and generator roots alpha^0 .. alpha^(n-1).

use thiserror::Error;

const PRIMITIVE: u16 = 0x11D;

/// `exp` is doubled so products of two logs index it without a modulo
const fn build_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        exp[i + 255] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE;
        }
        i += 1;
    }
    exp[510] = exp[0];
    exp[511] = exp[1];
    (exp, log)
}

static TABLES: ([u8; 512], [u8; 256]) = build_tables();

/// GF(256) field operations using log/exp tables
pub struct Gf256;

impl Gf256 {
    /// Field product
    #[inline]
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let (exp, log) = &TABLES;
        exp[log[a as usize] as usize + log[b as usize] as usize]
    }

    /// Multiplicative inverse; zero maps to zero
    #[inline]
    pub fn inv(a: u8) -> u8 {
        if a == 0 {
            return 0;
        }
        let (exp, log) = &TABLES;
        exp[255 - log[a as usize] as usize]
    }

    /// alpha^n
    #[inline]
    pub fn exp(n: usize) -> u8 {
        TABLES.0[n % 255]
    }
}

/// Evaluate a polynomial stored lowest degree first
fn eval_low_first(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0, |acc, &c| Gf256::mul(acc, x) ^ c)
}

/// A block with more errors than its ECC codewords can repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("codeword block is uncorrectable")]
pub struct Uncorrectable;

/// Reed-Solomon decoder for QR codes
pub struct ReedSolomonDecoder {
    num_ecc_codewords: usize,
}

impl ReedSolomonDecoder {
    /// Decoder for blocks carrying `num_ecc_codewords` ECC codewords
    pub fn new(num_ecc_codewords: usize) -> Self {
        Self { num_ecc_codewords }
    }

    /// Correct `received` (data then ECC, first codeword is the highest
    /// power) in place. Returns the number of corrected codewords.
    pub fn decode(&self, received: &mut [u8]) -> Result<usize, Uncorrectable> {
        let n = received.len();
        if n <= self.num_ecc_codewords || n > 255 {
            return Err(Uncorrectable);
        }

        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok(0);
        }

        let lambda = berlekamp_massey(&syndromes);
        let num_errors = lambda.len() - 1;
        if num_errors == 0 || num_errors * 2 > self.num_ecc_codewords {
            return Err(Uncorrectable);
        }

        // Chien search: codeword j carries power e = n - 1 - j
        let positions: Vec<usize> = (0..n)
            .filter(|&j| {
                let e = n - 1 - j;
                eval_low_first(&lambda, Gf256::exp(255 - e % 255)) == 0
            })
            .collect();
        if positions.len() != num_errors {
            return Err(Uncorrectable);
        }

        // Omega = S * Lambda mod x^(2t)
        let mut omega = vec![0u8; self.num_ecc_codewords];
        for (i, &s) in syndromes.iter().enumerate() {
            for (j, &l) in lambda.iter().enumerate() {
                if i + j < omega.len() {
                    omega[i + j] ^= Gf256::mul(s, l);
                }
            }
        }
        // Formal derivative: only odd powers survive in characteristic 2
        let derivative: Vec<u8> = lambda
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, &c)| if i % 2 == 1 { c } else { 0 })
            .collect();

        for &j in &positions {
            let x = Gf256::exp(n - 1 - j);
            let x_inv = Gf256::inv(x);
            let denom = eval_low_first(&derivative, x_inv);
            if denom == 0 {
                return Err(Uncorrectable);
            }
            let magnitude = Gf256::mul(
                Gf256::mul(x, eval_low_first(&omega, x_inv)),
                Gf256::inv(denom),
            );
            received[j] ^= magnitude;
        }

        if self.syndromes(received).iter().any(|&s| s != 0) {
            return Err(Uncorrectable);
        }
        Ok(num_errors)
    }

    /// S_i = R(alpha^i)
    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        (0..self.num_ecc_codewords)
            .map(|i| {
                let x = Gf256::exp(i);
                received.iter().fold(0, |acc, &c| Gf256::mul(acc, x) ^ c)
            })
            .collect()
    }
}

/// Error locator polynomial, lowest degree first, trimmed to its degree
fn berlekamp_massey(syndromes: &[u8]) -> Vec<u8> {
    let mut lambda = vec![1u8];
    let mut prev = vec![1u8];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut b = 1u8;

    for n in 0..syndromes.len() {
        let mut d = syndromes[n];
        for i in 1..=l {
            d ^= Gf256::mul(lambda.get(i).copied().unwrap_or(0), syndromes[n - i]);
        }

        if d == 0 {
            m += 1;
            continue;
        }

        let coef = Gf256::mul(d, Gf256::inv(b));
        let mut next = lambda.clone();
        if next.len() < prev.len() + m {
            next.resize(prev.len() + m, 0);
        }
        for (i, &p) in prev.iter().enumerate() {
            next[i + m] ^= Gf256::mul(coef, p);
        }

        if 2 * l <= n {
            prev = std::mem::replace(&mut lambda, next);
            l = n + 1 - l;
            b = d;
            m = 1;
        } else {
            lambda = next;
            m += 1;
        }
    }

    lambda.truncate(l + 1);
    while lambda.len() > 1 && lambda.last() == Some(&0) {
        lambda.pop();
    }
    lambda
}

/// Reed-Solomon encoder producing the ECC codewords for one block
pub struct ReedSolomonEncoder {
    /// Monic generator, highest degree first
    generator: Vec<u8>,
}

impl ReedSolomonEncoder {
    /// Generator polynomial prod (x - alpha^i) for i in 0..num_ecc
    pub fn new(num_ecc_codewords: usize) -> Self {
        let mut generator = vec![1u8];
        for i in 0..num_ecc_codewords {
            let root = Gf256::exp(i);
            let mut next = vec![0u8; generator.len() + 1];
            for (j, &c) in generator.iter().enumerate() {
                next[j] ^= c;
                next[j + 1] ^= Gf256::mul(c, root);
            }
            generator = next;
        }
        Self { generator }
    }

    /// Remainder of `data * x^n` divided by the generator
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let degree = self.generator.len() - 1;
        let mut remainder = vec![0u8; degree];
        if degree == 0 {
            return remainder;
        }
        for &d in data {
            let factor = d ^ remainder[0];
            remainder.rotate_left(1);
            remainder[degree - 1] = 0;
            for (r, &g) in remainder.iter_mut().zip(&self.generator[1..]) {
                *r ^= Gf256::mul(g, factor);
            }
        }
        remainder
    }
}
