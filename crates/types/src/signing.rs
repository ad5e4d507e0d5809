//! Domain-separated message construction for everything the core signs.
//!
//! Every message that gets signed is built by concatenating a fixed
//! domain-separation tag with a fixed-order list of fields, so that a
//! signature produced for one purpose can never be replayed as a valid
//! signature for another.

use crate::Hash;

/// Tag for signing over a batch's Merkle root (TSS + HSM legs both sign
/// this exact digest).
pub const DOMAIN_BATCH_ROOT: &[u8] = b"rollup.batch_root.v1";

/// Tag for the HSM's own digest computation over an arbitrary input, used
/// when the HSM is asked to verify/sign something that isn't already a
/// batch root (e.g. key backup blobs).
pub const DOMAIN_HSM_DIGEST: &[u8] = b"rollup.hsm_digest.v1";

/// Build the message that gets hashed and signed for a batch root.
///
/// `h = SHA-256(DOMAIN_BATCH_ROOT || root)`, matching spec §4.F/§4.G: "given
/// message `m`, compute `h = SHA-256(m)`" where `m` is the domain-separated
/// encoding of the root, not the bare root bytes.
pub fn batch_root_signing_digest(root: &Hash) -> Hash {
    Hash::from_parts(&[DOMAIN_BATCH_ROOT, root.as_bytes()])
}

/// Lowercase hex encoding of a digest, the fixed wire format for HSM
/// `sign`/`verify` calls (spec §9, Open Question 2).
pub fn digest_hex(digest: &Hash) -> String {
    digest.to_hex()
}
