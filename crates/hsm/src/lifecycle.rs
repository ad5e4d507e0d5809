//! `HsmBoundKey`: a logical key id backed by an HSM master key plus a
//! TSS-shared public key, with a generate/rotate/backup/restore lifecycle.
//! The logical key's "public key" is the TSS group key `Q`; its HSM leg is
//! a second signing factor applied to the same batch root, never the
//! primary key.

use crate::provider::{HsmError, HsmProvider, KeyAttributes, KeyType, KeyUsage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Rotating { new_key_id: String, grace_until: u64 },
    Inactive,
}

#[derive(Clone, Debug)]
pub struct HsmBoundKey {
    pub key_id: String,
    pub tss_public_key: Vec<u8>,
    pub threshold: u32,
    pub parties: u32,
    pub created_at: u64,
    pub state: LifecycleState,
}

impl HsmBoundKey {
    /// Generate a new HSM master key under `key_id` and pair it with the
    /// already-generated TSS group public key `tss_public_key`.
    pub fn generate(
        hsm: &mut dyn HsmProvider,
        key_id: &str,
        tss_public_key: Vec<u8>,
        threshold: u32,
        parties: u32,
        now: u64,
    ) -> Result<Self, HsmError> {
        hsm.generate_key(key_id, KeyType::Secp256k1, KeyUsage::Sign, KeyAttributes::default())?;
        Ok(Self {
            key_id: key_id.to_string(),
            tss_public_key,
            threshold,
            parties,
            created_at: now,
            state: LifecycleState::Active,
        })
    }

    pub fn is_signable(&self) -> bool {
        matches!(self.state, LifecycleState::Active | LifecycleState::Rotating { .. })
    }

    /// Begin rotation: a fresh HSM key `new_key_id` is generated and this
    /// key remains accepted for signing until `grace_until`.
    pub fn begin_rotation(
        &mut self,
        hsm: &mut dyn HsmProvider,
        new_key_id: &str,
        grace_until: u64,
    ) -> Result<(), HsmError> {
        hsm.generate_key(new_key_id, KeyType::Secp256k1, KeyUsage::Sign, KeyAttributes::default())?;
        self.state = LifecycleState::Rotating { new_key_id: new_key_id.to_string(), grace_until };
        Ok(())
    }

    /// Advance the lifecycle clock. Once `grace_until` has passed for a
    /// key mid-rotation, it becomes permanently Inactive: signing is
    /// refused but historical-signature verification remains valid.
    pub fn advance_time(&mut self, now: u64) {
        if let LifecycleState::Rotating { grace_until, .. } = self.state {
            if now >= grace_until {
                self.state = LifecycleState::Inactive;
            }
        }
    }

    /// Sign `digest_hex` with this key's HSM leg. Refused once the key is
    /// Inactive.
    pub fn sign(&self, hsm: &dyn HsmProvider, digest_hex: &str) -> Result<String, HsmError> {
        if !self.is_signable() {
            return Err(HsmError::KeyInactive(self.key_id.clone()));
        }
        hsm.sign(digest_hex, &self.key_id)
    }

    /// Historical-signature verification is always permitted, even once
    /// Inactive.
    pub fn verify(&self, hsm: &dyn HsmProvider, digest_hex: &str, signature_hex: &str) -> Result<bool, HsmError> {
        hsm.verify(digest_hex, signature_hex, &self.key_id)
    }
}
