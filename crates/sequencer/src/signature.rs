//! Detached-signature verification for submitted transactions.
//!
//! A transaction's `sender` address is `SHA-256(compressed pubkey)`; its
//! signature (when present) is a 65-byte recoverable ECDSA signature over
//! `signing_payload()`. Verification recovers the pubkey and checks it
//! hashes back to `sender`, rather than requiring the pubkey on the wire.

use rollup_types::{Address, Hash, Transaction};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};

/// `true` if `tx` has no signature (nothing to verify) or a signature that
/// recovers to its claimed `sender`.
pub fn signature_is_valid(tx: &Transaction) -> bool {
    if tx.signature.is_empty() {
        return true;
    }
    recover_signer(tx).map(|addr| addr == tx.sender).unwrap_or(false)
}

fn recover_signer(tx: &Transaction) -> Option<Address> {
    if tx.signature.len() != 65 {
        return None;
    }
    let recid = RecoveryId::from_i32(tx.signature[64] as i32).ok()?;
    let sig = RecoverableSignature::from_compact(&tx.signature[..64], recid).ok()?;
    let digest = Hash::from_bytes(&tx.signing_payload());
    let msg = Message::from_digest_slice(digest.as_bytes()).ok()?;
    let secp = Secp256k1::verification_only();
    let pubkey = secp.recover_ecdsa(&msg, &sig).ok()?;
    let address_bytes = Hash::from_parts(&[&pubkey.serialize()]);
    Some(Address::new(*address_bytes.as_bytes()))
}
