//! Arithmetic mod the secp256k1 group order `n`.
//!
//! No bignum crate is part of the aligned dependency stack, so this is a
//! small from-scratch implementation: 256-bit values as four little-endian
//! `u64` limbs, with multiplication and exponentiation done by repeated
//! doubling/squaring on top of a single modular-add primitive rather than
//! a general-purpose wide multiply + reduction.

use rand::RngCore;

/// secp256k1 group order, big-endian bytes.
const N_BYTES: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scalar(pub(crate) [u64; 4]);

fn n_limbs() -> [u64; 4] {
    bytes_be_to_limbs(&N_BYTES)
}

fn bytes_be_to_limbs(bytes: &[u8; 32]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for i in 0..4 {
        let chunk = &bytes[32 - (i + 1) * 8..32 - i * 8];
        limbs[i] = u64::from_be_bytes(chunk.try_into().unwrap());
    }
    limbs
}

fn limbs_to_bytes_be(limbs: &[u64; 4]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..4 {
        out[32 - (i + 1) * 8..32 - i * 8].copy_from_slice(&limbs[i].to_be_bytes());
    }
    out
}

/// Compare `a` and `b` as 256-bit unsigned integers.
fn cmp(a: &[u64; 4], b: &[u64; 4]) -> std::cmp::Ordering {
    for i in (0..4).rev() {
        match a[i].cmp(&b[i]) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// `a - b`, assuming `a >= b`.
fn sub(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let mut out = [0u64; 4];
    let mut borrow = 0i128;
    for i in 0..4 {
        let diff = a[i] as i128 - b[i] as i128 - borrow;
        if diff < 0 {
            out[i] = (diff + (1i128 << 64)) as u64;
            borrow = 1;
        } else {
            out[i] = diff as u64;
            borrow = 0;
        }
    }
    out
}

/// `a + b`, returning the 256-bit result plus any carry out of the top limb.
fn add_raw(a: &[u64; 4], b: &[u64; 4]) -> ([u64; 4], u64) {
    let mut out = [0u64; 4];
    let mut carry = 0u128;
    for i in 0..4 {
        let sum = a[i] as u128 + b[i] as u128 + carry;
        out[i] = sum as u64;
        carry = sum >> 64;
    }
    (out, carry as u64)
}

fn add_mod(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let n = n_limbs();
    let (sum, carry) = add_raw(a, b);
    if carry == 1 || cmp(&sum, &n) != std::cmp::Ordering::Less {
        sub(&sum, &n)
    } else {
        sum
    }
}

fn sub_mod(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let n = n_limbs();
    let neg_b = if b.iter().all(|x| *x == 0) { [0u64; 4] } else { sub(&n, b) };
    add_mod(a, &neg_b)
}

fn bit_at(x: &[u64; 4], i: usize) -> bool {
    (x[i / 64] >> (i % 64)) & 1 == 1
}

fn mul_mod(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let mut result = [0u64; 4];
    let mut addend = *a;
    for i in 0..256 {
        if bit_at(b, i) {
            result = add_mod(&result, &addend);
        }
        addend = add_mod(&addend, &addend);
    }
    result
}

fn pow_mod(a: &[u64; 4], e: &[u64; 4]) -> [u64; 4] {
    let mut result = [1u64, 0, 0, 0];
    for i in (0..256).rev() {
        result = mul_mod(&result, &result);
        if bit_at(e, i) {
            result = mul_mod(&result, a);
        }
    }
    result
}

impl Scalar {
    pub const ZERO: Scalar = Scalar([0, 0, 0, 0]);
    pub const ONE: Scalar = Scalar([1, 0, 0, 0]);

    /// Reduce 32 big-endian bytes mod `n`. Since `n` is within 2^128 of
    /// 2^256, a couple of conditional subtractions suffice.
    pub fn from_bytes_be_reduced(bytes: &[u8; 32]) -> Scalar {
        let n = n_limbs();
        let mut v = bytes_be_to_limbs(bytes);
        for _ in 0..2 {
            if cmp(&v, &n) != std::cmp::Ordering::Less {
                v = sub(&v, &n);
            }
        }
        Scalar(v)
    }

    pub fn from_u64(value: u64) -> Scalar {
        Scalar([value, 0, 0, 0])
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        limbs_to_bytes_be(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|x| *x == 0)
    }

    pub fn random(rng: &mut impl RngCore) -> Scalar {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Scalar::from_bytes_be_reduced(&bytes)
    }

    pub fn add(&self, other: &Scalar) -> Scalar {
        Scalar(add_mod(&self.0, &other.0))
    }

    pub fn sub(&self, other: &Scalar) -> Scalar {
        Scalar(sub_mod(&self.0, &other.0))
    }

    pub fn mul(&self, other: &Scalar) -> Scalar {
        Scalar(mul_mod(&self.0, &other.0))
    }

    pub fn neg(&self) -> Scalar {
        Scalar::ZERO.sub(self)
    }

    /// Multiplicative inverse via Fermat's little theorem (`n` is prime):
    /// `a^(n-2) mod n`.
    pub fn inv(&self) -> Option<Scalar> {
        if self.is_zero() {
            return None;
        }
        let n_minus_2 = sub(&n_limbs(), &[2, 0, 0, 0]);
        Some(Scalar(pow_mod(&self.0, &n_minus_2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn addition_is_commutative() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let a = Scalar::random(&mut rng);
        let b = Scalar::random(&mut rng);
        assert_eq!(a.add(&b), b.add(&a));
    }

    #[test]
    fn additive_identity_holds() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let a = Scalar::random(&mut rng);
        assert_eq!(a.add(&Scalar::ZERO), a);
    }

    #[test]
    fn subtraction_undoes_addition() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let a = Scalar::random(&mut rng);
        let b = Scalar::random(&mut rng);
        assert_eq!(a.add(&b).sub(&b), a);
    }

    #[test]
    fn multiplicative_identity_holds() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let a = Scalar::random(&mut rng);
        assert_eq!(a.mul(&Scalar::ONE), a);
    }

    #[test]
    fn inverse_of_a_value_multiplies_to_one() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let a = Scalar::random(&mut rng);
        let inv = a.inv().unwrap();
        assert_eq!(a.mul(&inv), Scalar::ONE);
    }

    #[test]
    fn zero_has_no_inverse() {
        assert!(Scalar::ZERO.inv().is_none());
    }

    #[test]
    fn byte_round_trip_is_exact_for_small_values() {
        let a = Scalar::from_u64(12345);
        let bytes = a.to_bytes_be();
        assert_eq!(Scalar::from_bytes_be_reduced(&bytes), a);
    }

    #[test]
    fn distributive_law_holds() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let a = Scalar::random(&mut rng);
        let b = Scalar::random(&mut rng);
        let c = Scalar::random(&mut rng);
        assert_eq!(a.mul(&b.add(&c)), a.mul(&b).add(&a.mul(&c)));
    }
}
