//! Vendor-agnostic HSM contract. A real deployment backs this with a
//! vendor SDK (PKCS#11, CloudHSM, etc); `SoftHsm` is the in-process
//! reference implementation used in tests and as the default until one is
//! wired in.

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    Secp256k1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyUsage {
    Sign,
}

/// Key creation attributes. `exportable`/`extractable` are always `false`
/// for keys generated through this contract: a key's private material
/// never leaves the HSM boundary except through `backup`, which wraps it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyAttributes {
    pub exportable: bool,
    pub extractable: bool,
}

impl Default for KeyAttributes {
    fn default() -> Self {
        Self { exportable: false, extractable: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupBlob {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; 12],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HsmError {
    #[error("key {0} not found")]
    KeyNotFound(String),
    #[error("key {0} already exists")]
    KeyAlreadyExists(String),
    #[error("key {0} is inactive and cannot sign")]
    KeyInactive(String),
    #[error("invalid digest: expected 32 bytes hex-encoded")]
    InvalidDigest,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("backup/restore failed: {0}")]
    CryptoFailure(String),
}

pub trait HsmProvider {
    /// Generate a new key under `key_id`. Returns the compressed public key.
    fn generate_key(
        &mut self,
        key_id: &str,
        key_type: KeyType,
        usage: KeyUsage,
        attrs: KeyAttributes,
    ) -> Result<Vec<u8>, HsmError>;

    fn get_public_key(&self, key_id: &str) -> Result<Vec<u8>, HsmError>;

    /// Sign a 32-byte digest (given as hex) with `key_id`, returning a
    /// hex-encoded compact ECDSA signature.
    fn sign(&self, digest_hex: &str, key_id: &str) -> Result<String, HsmError>;

    fn verify(&self, digest_hex: &str, signature_hex: &str, key_id: &str) -> Result<bool, HsmError>;

    /// Wrap `key_id`'s private material (and caller-supplied metadata) for
    /// offline storage, symmetrically encrypted under `passphrase`.
    fn backup(&self, key_id: &str, passphrase: &str) -> Result<BackupBlob, HsmError>;

    /// Reverse of `backup`: decrypts the blob and installs the key under
    /// `key_id`. Requires the identical passphrase used to back it up.
    fn restore(&mut self, key_id: &str, blob: &BackupBlob, passphrase: &str) -> Result<Vec<u8>, HsmError>;
}
