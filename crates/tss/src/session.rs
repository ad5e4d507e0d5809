//! Two-round threshold signing session: parties first commit to a nonce
//! point `R_i`, then, once the combined point is known, contribute their
//! secret nonce `k_i` and Lagrange-weighted key share. `finalize` combines
//! those across the quorum into the one shared nonce inverse and
//! reconstructed secret, and computes `s` from them directly. A per-party
//! `s_i` that sums into a valid signature on its own is not possible with
//! additive nonces (see `weighted_key_share`'s docs).
//! Grounded on the same collector-map shape used for view-change quorum
//! tracking elsewhere in this codebase: a map from party id to
//! contribution, a declared threshold, and a single `contribute_*` entry
//! point that flips phase once quorum is reached.

use std::collections::HashMap;

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use crate::keygen::{lagrange_coefficient, weighted_key_share, KeyShare, PartyId};
use crate::scalar::Scalar;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TssError {
    #[error("party {0} already contributed in this phase")]
    DuplicateContribution(PartyId),
    #[error("session expired at {expired_at}, now is {now}")]
    Expired { expired_at: u64, now: u64 },
    #[error("quorum not reached: have {have}, need {need}")]
    QuorumNotReached { have: usize, need: usize },
    #[error("session already finalized")]
    AlreadyFinalized,
    #[error("commitment phase is not yet complete")]
    CommitmentPhaseIncomplete,
    #[error("combined signature failed verification")]
    InvalidCombinedSignature,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Commitment,
    PartialSignature,
    Finalized,
}

/// A single party's commitment contribution: the public nonce point `k_i * G`.
struct Commitment {
    point: PublicKey,
}

pub struct SigningSession {
    threshold: u32,
    message_hash: Scalar,
    expires_at: u64,
    phase: Phase,
    commitments: HashMap<PartyId, Commitment>,
    combined_r_point: Option<PublicKey>,
    r: Option<Scalar>,
    /// Per party: `(k_i, lambda_i * d_i)`. Neither half is a valid partial
    /// signature on its own; both are combined across the quorum in
    /// `finalize` to form the single shared nonce and the reconstructed
    /// secret before the actual `s` is computed.
    contributions: HashMap<PartyId, (Scalar, Scalar)>,
}

impl SigningSession {
    pub fn new(threshold: u32, message_hash: [u8; 32], expires_at: u64) -> Self {
        Self {
            threshold,
            message_hash: Scalar::from_bytes_be_reduced(&message_hash),
            expires_at,
            phase: Phase::Commitment,
            commitments: HashMap::new(),
            combined_r_point: None,
            r: None,
            contributions: HashMap::new(),
        }
    }

    fn check_not_expired(&self, now: u64) -> Result<(), TssError> {
        if now > self.expires_at {
            return Err(TssError::Expired { expired_at: self.expires_at, now });
        }
        Ok(())
    }

    /// Record party `party_id`'s nonce commitment `k_i * G`. Once at least
    /// `threshold` distinct parties have contributed, the combined point
    /// `R = sum R_i` and its x-coordinate `r` become available.
    pub fn contribute_commitment(
        &mut self,
        party_id: PartyId,
        nonce_point: PublicKey,
        now: u64,
    ) -> Result<(), TssError> {
        self.check_not_expired(now)?;
        if self.phase != Phase::Commitment {
            return Err(TssError::DuplicateContribution(party_id));
        }
        if self.commitments.contains_key(&party_id) {
            return Err(TssError::DuplicateContribution(party_id));
        }
        self.commitments.insert(party_id, Commitment { point: nonce_point });

        if self.commitments.len() >= self.threshold as usize {
            let points: Vec<&PublicKey> = self.commitments.values().map(|c| &c.point).collect();
            let combined = PublicKey::combine_keys(&points).expect("nonzero combined point");
            self.combined_r_point = Some(combined);
            self.r = Some(Scalar::from_bytes_be_reduced(&x_coordinate(&combined)));
            self.phase = Phase::PartialSignature;
            tracing::debug!(parties = self.commitments.len(), "commitment quorum reached");
        }

        Ok(())
    }

    fn participants(&self) -> Vec<PartyId> {
        let mut ids: Vec<PartyId> = self.commitments.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Record party `party_id`'s contribution towards the combined
    /// signature: their secret nonce `k_i` (the commitment phase only ever
    /// saw `k_i * G`, never `k_i` itself) and their Lagrange-weighted key
    /// share `lambda_i * d_i`. Neither a telescoping per-party ECDSA
    /// partial nor the shared nonce inverse can be formed until the full
    /// quorum's nonces are known, so both halves are only combined in
    /// `finalize`.
    pub fn contribute_partial(
        &mut self,
        party_id: PartyId,
        share: &KeyShare,
        nonce_k: &Scalar,
        now: u64,
    ) -> Result<(), TssError> {
        self.check_not_expired(now)?;
        if self.phase == Phase::Finalized {
            return Err(TssError::AlreadyFinalized);
        }
        self.r.ok_or(TssError::CommitmentPhaseIncomplete)?;
        if self.contributions.contains_key(&party_id) {
            return Err(TssError::DuplicateContribution(party_id));
        }

        let participants = self.participants();
        let lambda = lagrange_coefficient(party_id, &participants);
        let weighted_d = weighted_key_share(&share.secret, &lambda);
        self.contributions.insert(party_id, (*nonce_k, weighted_d));
        Ok(())
    }

    /// Combine the collected nonces and weighted key shares into the
    /// group's shared nonce inverse and reconstructed secret, compute `s =
    /// k^{-1} * (h + r * d)`, and verify the result against the group
    /// public key.
    pub fn finalize(&mut self, public_key: &PublicKey) -> Result<Signature, TssError> {
        if self.phase == Phase::Finalized {
            return Err(TssError::AlreadyFinalized);
        }
        let r = self.r.ok_or(TssError::CommitmentPhaseIncomplete)?;
        if self.contributions.len() < self.threshold as usize {
            return Err(TssError::QuorumNotReached {
                have: self.contributions.len(),
                need: self.threshold as usize,
            });
        }

        let combined_k = self.contributions.values().fold(Scalar::ZERO, |acc, (k_i, _)| acc.add(k_i));
        let combined_d = self.contributions.values().fold(Scalar::ZERO, |acc, (_, d_i)| acc.add(d_i));
        let k_inv = combined_k.inv().expect("combined nonce is nonzero with overwhelming probability");
        let s = k_inv.mul(&self.message_hash.add(&r.mul(&combined_d)));
        let sig = signature_from_r_s(&r, &s)?;

        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(&self.message_hash.to_bytes_be())
            .map_err(|_| TssError::InvalidCombinedSignature)?;
        secp.verify_ecdsa(&message, &sig, public_key)
            .map_err(|_| TssError::InvalidCombinedSignature)?;

        self.phase = Phase::Finalized;
        tracing::debug!(parties = self.contributions.len(), "session finalized");
        Ok(sig)
    }
}

fn x_coordinate(point: &PublicKey) -> [u8; 32] {
    let uncompressed = point.serialize_uncompressed();
    let mut out = [0u8; 32];
    out.copy_from_slice(&uncompressed[1..33]);
    out
}

fn signature_from_r_s(r: &Scalar, s: &Scalar) -> Result<Signature, TssError> {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r.to_bytes_be());
    compact[32..].copy_from_slice(&s.to_bytes_be());
    Signature::from_compact(&compact).map_err(|_| TssError::InvalidCombinedSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::generate_key;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use secp256k1::SecretKey;

    fn nonce_pair(rng: &mut impl rand::RngCore) -> (Scalar, PublicKey) {
        let secp = Secp256k1::new();
        let k = Scalar::random(rng);
        let sk = SecretKey::from_slice(&k.to_bytes_be()).unwrap();
        let point = PublicKey::from_secret_key(&secp, &sk);
        (k, point)
    }

    #[test]
    fn full_two_round_session_produces_a_verifiable_signature() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let keygen = generate_key(5, 3, &mut rng);
        let participants: Vec<PartyId> = vec![1, 2, 3];

        let message_hash = [7u8; 32];
        let mut session = SigningSession::new(3, message_hash, 1_000);

        let mut nonces = HashMap::new();
        for &pid in &participants {
            let (k, point) = nonce_pair(&mut rng);
            nonces.insert(pid, k);
            session.contribute_commitment(pid, point, 0).unwrap();
        }

        for &pid in &participants {
            let share = keygen.shares.iter().find(|s| s.party_id == pid).unwrap();
            let k = nonces.get(&pid).unwrap();
            session.contribute_partial(pid, share, k, 0).unwrap();
        }

        let sig = session.finalize(&keygen.public_key).unwrap();
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(&message_hash).unwrap();
        assert!(secp.verify_ecdsa(&message, &sig, &keygen.public_key).is_ok());
    }

    #[test]
    fn duplicate_commitment_from_same_party_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut session = SigningSession::new(3, [1u8; 32], 1_000);
        let (_, point) = nonce_pair(&mut rng);
        session.contribute_commitment(1, point, 0).unwrap();
        let (_, point2) = nonce_pair(&mut rng);
        assert_eq!(
            session.contribute_commitment(1, point2, 0),
            Err(TssError::DuplicateContribution(1))
        );
    }

    #[test]
    fn partial_before_quorum_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let keygen = generate_key(5, 3, &mut rng);
        let mut session = SigningSession::new(3, [1u8; 32], 1_000);
        let (k, point) = nonce_pair(&mut rng);
        session.contribute_commitment(1, point, 0).unwrap();
        let share = keygen.shares.iter().find(|s| s.party_id == 1).unwrap();
        assert_eq!(
            session.contribute_partial(1, share, &k, 0),
            Err(TssError::CommitmentPhaseIncomplete)
        );
    }

    #[test]
    fn expired_session_rejects_further_contributions() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut session = SigningSession::new(3, [1u8; 32], 100);
        let (_, point) = nonce_pair(&mut rng);
        assert_eq!(
            session.contribute_commitment(1, point, 500),
            Err(TssError::Expired { expired_at: 100, now: 500 })
        );
    }

    #[test]
    fn finalize_before_quorum_of_partials_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let keygen = generate_key(5, 3, &mut rng);
        let mut session = SigningSession::new(3, [9u8; 32], 1_000);
        let participants: Vec<PartyId> = vec![1, 2, 3];
        let mut nonces = HashMap::new();
        for &pid in &participants {
            let (k, point) = nonce_pair(&mut rng);
            nonces.insert(pid, k);
            session.contribute_commitment(pid, point, 0).unwrap();
        }
        let share = keygen.shares.iter().find(|s| s.party_id == 1).unwrap();
        let k = nonces.get(&1).unwrap();
        session.contribute_partial(1, share, k, 0).unwrap();

        assert_eq!(
            session.finalize(&keygen.public_key),
            Err(TssError::QuorumNotReached { have: 1, need: 3 })
        );
    }
}
