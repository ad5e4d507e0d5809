//! Wires the threshold signer and the HSM leg together to co-sign a
//! batch root, the two-legged signature spec §4.G/§4.H describe.
//!
//! A real deployment runs each TSS party as its own process exchanging
//! commitment/partial messages over the network; this binary is the
//! single validator node, so it plays every party locally and the "two
//! rounds" collapse into one synchronous call.

use rand::RngCore;
use rollup_hsm::{HsmBoundKey, HsmError, HsmProvider};
use rollup_tss::{generate_key, KeyGenResult, PartyId, Scalar, SigningSession, TssError};
use rollup_types::signing::{batch_root_signing_digest, digest_hex};
use rollup_types::Hash;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("tss session error: {0}")]
    Tss(#[from] TssError),
    #[error("hsm error: {0}")]
    Hsm(#[from] HsmError),
}

/// Co-signs batch roots: a TSS group signature plus an HSM-backed second
/// factor over the same digest.
pub struct SigningCoordinator {
    keygen: KeyGenResult,
    threshold: u32,
    hsm_key: HsmBoundKey,
}

impl SigningCoordinator {
    /// Generate a fresh `parties`-of-`threshold` TSS key and pair it with
    /// a newly generated HSM master key.
    pub fn bootstrap(
        hsm: &mut dyn HsmProvider,
        key_id: &str,
        parties: u32,
        threshold: u32,
        now: u64,
        rng: &mut impl RngCore,
    ) -> Result<Self, SigningError> {
        let keygen = generate_key(parties, threshold, rng);
        let tss_public_key = keygen.public_key.serialize().to_vec();
        let hsm_key = HsmBoundKey::generate(hsm, key_id, tss_public_key, threshold, parties, now)?;
        Ok(Self { keygen, threshold, hsm_key })
    }

    pub fn hsm_key(&self) -> &HsmBoundKey {
        &self.hsm_key
    }

    pub fn hsm_key_mut(&mut self) -> &mut HsmBoundKey {
        &mut self.hsm_key
    }

    pub fn group_public_key(&self) -> &PublicKey {
        &self.keygen.public_key
    }

    /// Sign `root` with both legs, returning the combined
    /// `hsm_sig:r:s` components ready for `Batch::attach_signature`.
    pub fn sign_batch_root(
        &self,
        hsm: &dyn HsmProvider,
        root: &Hash,
        now: u64,
        expires_at: u64,
        rng: &mut impl RngCore,
    ) -> Result<(String, String, String), SigningError> {
        let digest = batch_root_signing_digest(root);
        let digest_hex = digest_hex(&digest);
        let hsm_sig = self.hsm_key.sign(hsm, &digest_hex)?;

        let secp = Secp256k1::new();
        let participants: Vec<PartyId> = self.keygen.shares.iter().take(self.threshold as usize).map(|s| s.party_id).collect();

        let mut session = SigningSession::new(self.threshold, *digest.as_bytes(), expires_at);
        let mut nonces: Vec<(PartyId, Scalar)> = Vec::with_capacity(participants.len());
        for &party_id in &participants {
            let k = Scalar::random(rng);
            let sk = SecretKey::from_slice(&k.to_bytes_be()).expect("nonzero scalar is a valid secret key");
            let point = PublicKey::from_secret_key(&secp, &sk);
            session.contribute_commitment(party_id, point, now)?;
            nonces.push((party_id, k));
        }
        for (party_id, k) in &nonces {
            let share = self.keygen.shares.iter().find(|s| s.party_id == *party_id).expect("party in keygen shares");
            session.contribute_partial(*party_id, share, k, now)?;
        }

        let signature = session.finalize(&self.keygen.public_key)?;
        let compact = signature.serialize_compact();
        let r_hex = hex::encode(&compact[..32]);
        let s_hex = hex::encode(&compact[32..]);
        Ok((hsm_sig, r_hex, s_hex))
    }
}
