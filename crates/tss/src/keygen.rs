//! Distributed key generation: Shamir-share a secp256k1 private key across
//! `n` parties with threshold `t`, and derive the partial-signature
//! building blocks each party needs during signing.

use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::scalar::Scalar;

pub type PartyId = u32;

#[derive(Clone, Debug)]
pub struct KeyShare {
    pub party_id: PartyId,
    pub secret: Scalar,
}

#[derive(Clone, Debug)]
pub struct KeyGenResult {
    pub public_key: PublicKey,
    pub shares: Vec<KeyShare>,
    pub threshold: u32,
}

/// Evaluate the polynomial `coeffs[0] + coeffs[1]*x + ... + coeffs[t-1]*x^(t-1)`
/// at `x`, via Horner's method.
fn eval_polynomial(coeffs: &[Scalar], x: &Scalar) -> Scalar {
    let mut acc = Scalar::ZERO;
    for c in coeffs.iter().rev() {
        acc = acc.mul(x).add(c);
    }
    acc
}

/// Generate a `t`-of-`n` Shamir sharing of a fresh secp256k1 private key.
///
/// The shared secret is `coeffs[0]`; the public key is `coeffs[0] * G`. Each
/// party `i` (1-indexed) receives `f(i)` where `f` is the degree-`(t-1)`
/// polynomial with those coefficients. This is the standard Feldman/Shamir
/// construction; it does not itself produce a dealerless DKG, a real
/// deployment would run this behind a verifiable secret sharing round, but
/// the reconstruction math downstream is identical either way.
pub fn generate_key(n: u32, t: u32, rng: &mut impl RngCore) -> KeyGenResult {
    assert!(t >= 1 && t <= n, "threshold must be between 1 and n");

    let coeffs: Vec<Scalar> = (0..t).map(|_| Scalar::random(rng)).collect();
    let secret = coeffs[0];

    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&secret.to_bytes_be()).expect("nonzero scalar");
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);

    let shares = (1..=n)
        .map(|party_id| {
            let x = Scalar::from_u64(party_id as u64);
            KeyShare { party_id, secret: eval_polynomial(&coeffs, &x) }
        })
        .collect();

    KeyGenResult { public_key, shares, threshold: t }
}

/// Lagrange coefficient `lambda_i` for party `i` within the participant set
/// `participants`, evaluated at `x = 0`:
///
/// `lambda_i = prod_{j in participants, j != i} (j / (j - i))  (mod n)`
///
/// Raw Shamir shares `f(i)` do not sum to `f(0)`; weighting each share by
/// its Lagrange coefficient before summing is what reconstructs the secret
/// for the specific subset that actually took part in the session.
pub fn lagrange_coefficient(party_id: PartyId, participants: &[PartyId]) -> Scalar {
    let i = Scalar::from_u64(party_id as u64);
    let mut num = Scalar::ONE;
    let mut den = Scalar::ONE;
    for &j in participants {
        if j == party_id {
            continue;
        }
        let xj = Scalar::from_u64(j as u64);
        num = num.mul(&xj);
        den = den.mul(&xj.sub(&i));
    }
    num.mul(&den.inv().expect("distinct participant ids"))
}

/// Compute party `i`'s weighted key-share contribution `lambda_i * d_i`.
///
/// This, not a per-party `s_i = k_i^{-1} * (...)`, is the quantity that
/// actually sums correctly across a quorum. Lagrange coefficients for a
/// participant set are a partition of unity (`sum lambda_i = 1`), so
/// `sum (lambda_i * d_i) = d`, the group secret, exactly as in plain
/// Shamir reconstruction. A naive per-party ECDSA partial `k_i^{-1} * (h +
/// r * lambda_i * d_i)` does not telescope into `(sum k_i)^{-1} * (h + r *
/// d)` under summation, since the cross terms `k_j * k_i^{-1}` don't
/// cancel. The actual nonce inverse has to be formed once, from the
/// combined nonce, rather than per party. `SigningSession::finalize`
/// combines this with the summed nonces to build the final `s`.
pub fn weighted_key_share(share_secret: &Scalar, lagrange_coeff: &Scalar) -> Scalar {
    share_secret.mul(lagrange_coeff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn threshold_subset_reconstructs_the_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let result = generate_key(5, 3, &mut rng);

        let participants: Vec<PartyId> = vec![1, 3, 5];
        let reconstructed = participants
            .iter()
            .map(|&pid| {
                let share = result.shares.iter().find(|s| s.party_id == pid).unwrap();
                let lambda = lagrange_coefficient(pid, &participants);
                share.secret.mul(&lambda)
            })
            .fold(Scalar::ZERO, |acc, term| acc.add(&term));

        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&reconstructed.to_bytes_be()).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        assert_eq!(pk, result.public_key);
    }

    #[test]
    fn a_different_subset_also_reconstructs_the_same_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let result = generate_key(5, 3, &mut rng);

        let reconstruct = |participants: &[PartyId]| {
            participants
                .iter()
                .map(|&pid| {
                    let share = result.shares.iter().find(|s| s.party_id == pid).unwrap();
                    let lambda = lagrange_coefficient(pid, participants);
                    share.secret.mul(&lambda)
                })
                .fold(Scalar::ZERO, |acc, term| acc.add(&term))
        };

        let a = reconstruct(&[1, 2, 3]);
        let b = reconstruct(&[2, 4, 5]);
        assert_eq!(a, b);
    }

    #[test]
    fn unweighted_shares_do_not_sum_to_the_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let result = generate_key(5, 3, &mut rng);
        let participants: Vec<PartyId> = vec![1, 2, 3];
        let naive_sum = participants
            .iter()
            .map(|&pid| result.shares.iter().find(|s| s.party_id == pid).unwrap().secret)
            .fold(Scalar::ZERO, |acc, term| acc.add(&term));

        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&naive_sum.to_bytes_be()).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        assert_ne!(pk, result.public_key);
    }

    #[test]
    #[should_panic(expected = "threshold must be between 1 and n")]
    fn threshold_above_n_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        generate_key(3, 4, &mut rng);
    }
}
