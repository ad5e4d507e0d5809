//! In-process reference `HsmProvider`: keys live in a plain `HashMap`
//! rather than behind a vendor boundary. Used in tests and as the default
//! backend until a real vendor SDK is wired in.

use std::collections::HashMap;

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::backup;
use crate::provider::{BackupBlob, HsmError, HsmProvider, KeyAttributes, KeyType, KeyUsage};

struct StoredKey {
    secret: SecretKey,
    public: PublicKey,
}

pub struct SoftHsm {
    secp: Secp256k1<secp256k1::All>,
    keys: HashMap<String, StoredKey>,
}

impl Default for SoftHsm {
    fn default() -> Self {
        Self { secp: Secp256k1::new(), keys: HashMap::new() }
    }
}

fn digest_bytes(digest_hex: &str) -> Result<[u8; 32], HsmError> {
    let bytes = hex::decode(digest_hex).map_err(|_| HsmError::InvalidDigest)?;
    bytes.try_into().map_err(|_| HsmError::InvalidDigest)
}

impl HsmProvider for SoftHsm {
    fn generate_key(
        &mut self,
        key_id: &str,
        key_type: KeyType,
        _usage: KeyUsage,
        _attrs: KeyAttributes,
    ) -> Result<Vec<u8>, HsmError> {
        let KeyType::Secp256k1 = key_type;
        if self.keys.contains_key(key_id) {
            return Err(HsmError::KeyAlreadyExists(key_id.to_string()));
        }

        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        let secret = SecretKey::from_slice(&bytes).expect("nonzero scalar");
        let public = PublicKey::from_secret_key(&self.secp, &secret);

        self.keys.insert(key_id.to_string(), StoredKey { secret, public });
        tracing::debug!(key_id, "generated HSM key");
        Ok(public.serialize().to_vec())
    }

    fn get_public_key(&self, key_id: &str) -> Result<Vec<u8>, HsmError> {
        self.keys
            .get(key_id)
            .map(|k| k.public.serialize().to_vec())
            .ok_or_else(|| HsmError::KeyNotFound(key_id.to_string()))
    }

    fn sign(&self, digest_hex: &str, key_id: &str) -> Result<String, HsmError> {
        let key = self.keys.get(key_id).ok_or_else(|| HsmError::KeyNotFound(key_id.to_string()))?;
        let digest = digest_bytes(digest_hex)?;
        let message = Message::from_digest_slice(&digest).map_err(|_| HsmError::InvalidDigest)?;
        let sig = self.secp.sign_ecdsa(&message, &key.secret);
        Ok(hex::encode(sig.serialize_compact()))
    }

    fn verify(&self, digest_hex: &str, signature_hex: &str, key_id: &str) -> Result<bool, HsmError> {
        let key = self.keys.get(key_id).ok_or_else(|| HsmError::KeyNotFound(key_id.to_string()))?;
        let digest = digest_bytes(digest_hex)?;
        let message = Message::from_digest_slice(&digest).map_err(|_| HsmError::InvalidDigest)?;
        let sig_bytes = hex::decode(signature_hex).map_err(|_| HsmError::InvalidSignature)?;
        let sig = Signature::from_compact(&sig_bytes).map_err(|_| HsmError::InvalidSignature)?;
        Ok(self.secp.verify_ecdsa(&message, &sig, &key.public).is_ok())
    }

    fn backup(&self, key_id: &str, passphrase: &str) -> Result<BackupBlob, HsmError> {
        let key = self.keys.get(key_id).ok_or_else(|| HsmError::KeyNotFound(key_id.to_string()))?;
        backup::encrypt(key.secret.as_ref(), passphrase)
    }

    fn restore(&mut self, key_id: &str, blob: &BackupBlob, passphrase: &str) -> Result<Vec<u8>, HsmError> {
        let plaintext = backup::decrypt(blob, passphrase)?;
        let secret = SecretKey::from_slice(&plaintext).map_err(|e| HsmError::CryptoFailure(e.to_string()))?;
        let public = PublicKey::from_secret_key(&self.secp, &secret);
        self.keys.insert(key_id.to_string(), StoredKey { secret, public });
        Ok(public.serialize().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_can_sign_and_verify() {
        let mut hsm = SoftHsm::default();
        hsm.generate_key("k1", KeyType::Secp256k1, KeyUsage::Sign, KeyAttributes::default()).unwrap();
        let digest = hex::encode([7u8; 32]);
        let sig = hsm.sign(&digest, "k1").unwrap();
        assert!(hsm.verify(&digest, &sig, "k1").unwrap());
    }

    #[test]
    fn duplicate_key_id_is_rejected() {
        let mut hsm = SoftHsm::default();
        hsm.generate_key("k1", KeyType::Secp256k1, KeyUsage::Sign, KeyAttributes::default()).unwrap();
        assert_eq!(
            hsm.generate_key("k1", KeyType::Secp256k1, KeyUsage::Sign, KeyAttributes::default()),
            Err(HsmError::KeyAlreadyExists("k1".to_string()))
        );
    }

    #[test]
    fn signing_with_unknown_key_fails() {
        let hsm = SoftHsm::default();
        let digest = hex::encode([1u8; 32]);
        assert!(hsm.sign(&digest, "missing").is_err());
    }

    #[test]
    fn backup_then_restore_reproduces_the_same_public_key() {
        let mut hsm = SoftHsm::default();
        let pubkey = hsm.generate_key("k1", KeyType::Secp256k1, KeyUsage::Sign, KeyAttributes::default()).unwrap();
        let blob = hsm.backup("k1", "passphrase").unwrap();

        let mut restored_hsm = SoftHsm::default();
        let restored_pubkey = restored_hsm.restore("k1", &blob, "passphrase").unwrap();
        assert_eq!(pubkey, restored_pubkey);
    }
}
