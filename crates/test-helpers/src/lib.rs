//! Fixtures shared across crate test suites: properly-signed transactions,
//! signed batches, and deterministic TSS/HSM key material. Building these
//! by hand in every test module would mean re-deriving the exact
//! signing/encoding rules `rollup-types` and `rollup-sequencer` enforce;
//! centralising them here keeps the fixtures honest when those rules
//! change.

use rand::RngCore;
use rand_chacha::ChaCha20Rng;
use rand::SeedableRng;
use rollup_hsm::{HsmBoundKey, HsmProvider, SoftHsm};
use rollup_tss::{generate_key, KeyGenResult};
use rollup_types::{Address, Batch, Hash, Transaction, TxId, TxStatus, TxType};
use secp256k1::{Message, Secp256k1, SecretKey};

/// A sender keypair plus the rollup `Address` it maps to
/// (`SHA-256(compressed pubkey)`, matching `rollup-sequencer`'s recovery
/// rule).
pub struct SignerFixture {
    pub secret: SecretKey,
    pub address: Address,
}

impl SignerFixture {
    pub fn deterministic(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut bytes = [0u8; 32];
        loop {
            rng.fill_bytes(&mut bytes);
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                let secp = Secp256k1::new();
                let pubkey = secp256k1::PublicKey::from_secret_key(&secp, &secret);
                let address = Address::new(*Hash::from_parts(&[&pubkey.serialize()]).as_bytes());
                return Self { secret, address };
            }
        }
    }

    /// Sign `tx`'s `signing_payload()` and attach the 65-byte recoverable
    /// signature `rollup-sequencer::signature::signature_is_valid` expects.
    pub fn sign(&self, tx: &mut Transaction) {
        let secp = Secp256k1::new();
        let digest = Hash::from_bytes(&tx.signing_payload());
        let msg = Message::from_digest_slice(digest.as_bytes()).expect("32-byte digest is a valid message");
        let (recid, compact) = secp.sign_ecdsa_recoverable(&msg, &self.secret).serialize_compact();
        let mut signature = compact.to_vec();
        signature.push(recid.to_i32() as u8);
        tx.signature = signature;
        tx.id = tx.compute_id();
    }
}

/// Build an unsigned transaction from `sender` to a fixed counterparty
/// address, with `nonce` and a far-future expiry.
pub fn unsigned_transaction(sender: Address, nonce: u64) -> Transaction {
    let recipient = Address::new([0xABu8; 32]);
    let base = Transaction {
        id: TxId::from(Hash::ZERO),
        sender,
        recipient,
        amount: 10,
        nonce,
        expiry_unix_seconds: 10_000_000,
        tx_type: TxType::Transfer,
        status: TxStatus::Pending,
        data: vec![],
        signature: vec![],
    };
    Transaction { id: base.compute_id(), ..base }
}

/// A transaction signed by a fresh deterministic signer, ready to pass
/// validation end to end.
pub fn signed_transaction(seed: u64, nonce: u64) -> (SignerFixture, Transaction) {
    let signer = SignerFixture::deterministic(seed);
    let mut tx = unsigned_transaction(signer.address, nonce);
    signer.sign(&mut tx);
    (signer, tx)
}

/// An unsigned batch over `txs`, with a zero sequencer key — callers that
/// need a co-signed batch should run it through a `SigningCoordinator`
/// rather than faking the signature here.
pub fn unsigned_batch(txs: &[Transaction], batch_counter: u64, now: u64) -> Batch {
    let leaf_bytes: Vec<[u8; 32]> = txs.iter().map(|tx| *tx.leaf_hash().as_bytes()).collect();
    let root = Hash::from_parts(&leaf_bytes.iter().map(|b| b.as_slice()).collect::<Vec<_>>());
    let ids = txs.iter().map(|tx| tx.id).collect();
    Batch::new_unsigned(ids, root, [0u8; 32], now, now + 3600, batch_counter, [0u8; 16])
}

/// A freshly generated `threshold`-of-`parties` TSS group key, deterministic
/// under `seed`.
pub fn tss_group(parties: u32, threshold: u32, seed: u64) -> KeyGenResult {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    generate_key(parties, threshold, &mut rng)
}

/// A `SoftHsm` with one active key already generated under `key_id`, plus
/// the `HsmBoundKey` pairing it with a freshly generated TSS group key.
pub fn hsm_bound_key(key_id: &str, parties: u32, threshold: u32, now: u64, seed: u64) -> (SoftHsm, HsmBoundKey, KeyGenResult) {
    let keygen = tss_group(parties, threshold, seed);
    let mut hsm = SoftHsm::default();
    let tss_public_key = keygen.public_key.serialize().to_vec();
    let key = HsmBoundKey::generate(&mut hsm, key_id, tss_public_key, threshold, parties, now)
        .expect("fresh key id never collides in a fresh SoftHsm");
    (hsm, key, keygen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_fixture_recovers_to_its_own_sender() {
        let (signer, tx) = signed_transaction(1, 0);
        assert_eq!(tx.sender, signer.address);
        assert_eq!(tx.signature.len(), 65);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = SignerFixture::deterministic(42);
        let b = SignerFixture::deterministic(42);
        assert_eq!(a.address, b.address);
    }

    #[test]
    fn hsm_bound_key_starts_active_and_signable() {
        let (_hsm, key, _keygen) = hsm_bound_key("k", 5, 3, 0, 7);
        assert!(key.is_signable());
    }

    #[test]
    fn unsigned_batch_root_is_derived_from_its_transactions() {
        let (_signer, tx) = signed_transaction(2, 0);
        let batch = unsigned_batch(std::slice::from_ref(&tx), 0, 0);
        assert_eq!(batch.txs, vec![tx.id]);
        assert!(!batch.is_signed());
    }
}
