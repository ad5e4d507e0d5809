//! The ordered validation rules transactions are checked against at
//! submission time.

use rollup_core::RejectReason;
use rollup_types::{Transaction, TxType};

use crate::nonce::NonceTracker;
use crate::signature::signature_is_valid;

pub struct ValidationConfig {
    pub default_max_age_seconds: u64,
}

/// Run the ordered validation rules. Returns the nonce this transaction is
/// accepted at (post-defaulting), or the first failing `RejectReason`.
pub fn validate(
    tx: &Transaction,
    now_unix_seconds: u64,
    nonces: &NonceTracker,
    config: &ValidationConfig,
) -> Result<u64, RejectReason> {
    if !tx.sender.is_well_formed() || !tx.recipient.is_well_formed() {
        return Err(RejectReason::BadAddress);
    }
    if tx.sender == tx.recipient {
        return Err(RejectReason::SelfTransfer);
    }
    if tx.amount == 0 {
        return Err(RejectReason::NonPositiveAmount);
    }
    if TxType::from_u8(tx.tx_type as u8).is_none() {
        return Err(RejectReason::BadType);
    }

    let expected_nonce = nonces.next_nonce(tx.sender);
    if tx.nonce != expected_nonce {
        return Err(RejectReason::DuplicateNonce);
    }

    let expiry = if tx.expiry_unix_seconds == 0 {
        now_unix_seconds + config.default_max_age_seconds
    } else {
        tx.expiry_unix_seconds
    };
    if expiry <= now_unix_seconds {
        return Err(RejectReason::Expired);
    }

    if !signature_is_valid(tx) {
        return Err(RejectReason::InvalidSignature);
    }

    Ok(expected_nonce)
}
