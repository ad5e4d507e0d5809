//! Wire encoding for Batch submission to the settlement layer.
//!
//! Fixed byte layout (spec §6): each transaction is
//! `id(32) || sender(32) || recipient(32) || amount(u64 LE) || nonce(u64 LE)
//! || expiry(u64 LE) || type(u8) || status(u8) || data(len-prefixed) ||
//! signature(len-prefixed)`. The batch payload is a `batch_header` followed
//! by the concatenation of its transactions in inclusion order.

use crate::identifiers::{Address, BatchId, TxId};
use crate::transaction::{Transaction, TxStatus, TxType};
use crate::{Batch, Hash};
use thiserror::Error;

/// Errors produced while decoding a wire-format batch or transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input while decoding {field}")]
    UnexpectedEof { field: &'static str },

    #[error("invalid transaction type tag: {0}")]
    InvalidTxType(u8),

    #[error("invalid transaction status tag: {0}")]
    InvalidTxStatus(u8),

    #[error("length-prefixed field {field} declared length {declared} exceeds remaining input")]
    LengthPrefixOverrun { field: &'static str, declared: u32 },

    #[error("trailing bytes after decoding batch")]
    TrailingBytes,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        if self.pos + n > self.buf.len() {
            return Err(CodecError::UnexpectedEof { field });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array32(&mut self, field: &'static str) -> Result<[u8; 32], CodecError> {
        let slice = self.take(32, field)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(slice);
        Ok(arr)
    }

    fn take_u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let slice = self.take(8, field)?;
        Ok(u64::from_le_bytes(slice.try_into().unwrap()))
    }

    fn take_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, field)?[0])
    }

    fn take_len_prefixed(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = u32::from_le_bytes(self.take(4, field)?.try_into().unwrap());
        if self.pos + len as usize > self.buf.len() {
            return Err(CodecError::LengthPrefixOverrun { field, declared: len });
        }
        Ok(self.take(len as usize, field)?.to_vec())
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Encode a single transaction in the fixed wire order.
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 * 3 + 8 * 3 + 2 + 8 + tx.data.len() + 8 + tx.signature.len());
    out.extend_from_slice(tx.id.hash().as_bytes());
    out.extend_from_slice(tx.sender.as_bytes());
    out.extend_from_slice(tx.recipient.as_bytes());
    out.extend_from_slice(&tx.amount.to_le_bytes());
    out.extend_from_slice(&tx.nonce.to_le_bytes());
    out.extend_from_slice(&tx.expiry_unix_seconds.to_le_bytes());
    out.push(tx.tx_type as u8);
    out.push(tx.status as u8);
    out.extend_from_slice(&(tx.data.len() as u32).to_le_bytes());
    out.extend_from_slice(&tx.data);
    out.extend_from_slice(&(tx.signature.len() as u32).to_le_bytes());
    out.extend_from_slice(&tx.signature);
    out
}

/// Decode a single transaction, advancing past exactly its bytes.
fn decode_transaction(r: &mut Reader<'_>) -> Result<Transaction, CodecError> {
    let id = Hash::from_hash_bytes(&r.take_array32("id")?);
    let sender = Address::new(r.take_array32("sender")?);
    let recipient = Address::new(r.take_array32("recipient")?);
    let amount = r.take_u64("amount")?;
    let nonce = r.take_u64("nonce")?;
    let expiry_unix_seconds = r.take_u64("expiry")?;
    let tx_type_tag = r.take_u8("type")?;
    let tx_type = TxType::from_u8(tx_type_tag).ok_or(CodecError::InvalidTxType(tx_type_tag))?;
    let status_tag = r.take_u8("status")?;
    let status = TxStatus::from_u8(status_tag).ok_or(CodecError::InvalidTxStatus(status_tag))?;
    let data = r.take_len_prefixed("data")?;
    let signature = r.take_len_prefixed("signature")?;

    Ok(Transaction {
        id: TxId::from(id),
        sender,
        recipient,
        amount,
        nonce,
        expiry_unix_seconds,
        tx_type,
        status,
        data,
        signature,
    })
}

/// Encode a batch header: `id(32) || root(32) || sequencer_pk(32) ||
/// ts(u64 LE) || expiry(u64 LE) || sig(len-prefixed)`.
fn encode_batch_header(batch: &Batch) -> Vec<u8> {
    let sig_bytes = batch.signature.as_deref().unwrap_or("").as_bytes();
    let mut out = Vec::with_capacity(32 * 3 + 16 + 4 + sig_bytes.len());
    out.extend_from_slice(batch.id.hash().as_bytes());
    out.extend_from_slice(batch.root.as_bytes());
    out.extend_from_slice(&batch.sequencer_pk);
    out.extend_from_slice(&batch.timestamp.to_le_bytes());
    out.extend_from_slice(&batch.expiry_unix_seconds.to_le_bytes());
    out.extend_from_slice(&(sig_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(sig_bytes);
    out
}

/// Encode a full batch submission payload: header followed by its
/// transactions in inclusion order.
pub fn encode_batch(batch: &Batch, txs_in_order: &[Transaction]) -> Vec<u8> {
    let mut out = encode_batch_header(batch);
    for tx in txs_in_order {
        out.extend_from_slice(&encode_transaction(tx));
    }
    out
}

/// Decode a full batch submission payload back into a batch header (sans
/// the `txs` id list reconstructed from the decoded transactions) and its
/// transactions.
pub fn decode_batch(bytes: &[u8]) -> Result<(Batch, Vec<Transaction>), CodecError> {
    let mut r = Reader::new(bytes);

    let id = Hash::from_hash_bytes(&r.take_array32("batch.id")?);
    let root = Hash::from_hash_bytes(&r.take_array32("batch.root")?);
    let sequencer_pk = r.take_array32("batch.sequencer_pk")?;
    let timestamp = r.take_u64("batch.ts")?;
    let expiry_unix_seconds = r.take_u64("batch.expiry")?;
    let sig_bytes = r.take_len_prefixed("batch.sig")?;
    let signature = if sig_bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&sig_bytes).into_owned())
    };

    let mut txs = Vec::new();
    while r.remaining() > 0 {
        txs.push(decode_transaction(&mut r)?);
    }

    if r.remaining() != 0 {
        return Err(CodecError::TrailingBytes);
    }

    let batch = Batch {
        id: BatchId::from(id),
        txs: txs.iter().map(|t| t.id).collect(),
        root,
        sequencer_pk,
        timestamp,
        expiry_unix_seconds,
        signature,
    };

    Ok((batch, txs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::Address;

    fn sample_tx(nonce: u64) -> Transaction {
        let mut sender = [0u8; 32];
        sender[0] = 0x11;
        let mut recipient = [0u8; 32];
        recipient[0] = 0x22;
        let mut tx = Transaction {
            id: TxId::from(Hash::ZERO),
            sender: Address::new(sender),
            recipient: Address::new(recipient),
            amount: 100,
            nonce,
            expiry_unix_seconds: 1_000_000,
            tx_type: TxType::Transfer,
            status: TxStatus::Pending,
            data: vec![1, 2, 3],
            signature: vec![9, 9],
        };
        tx.id = tx.compute_id();
        tx
    }

    #[test]
    fn transaction_roundtrips() {
        let tx = sample_tx(1);
        let encoded = encode_transaction(&tx);
        let mut r = Reader::new(&encoded);
        let decoded = decode_transaction(&mut r).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn batch_roundtrips_with_transactions() {
        let txs = vec![sample_tx(1), sample_tx(2)];
        let leaves: Vec<Hash> = txs.iter().map(|t| t.leaf_hash()).collect();
        let (root, _) = crate::merkle::build_merkle_tree_with_proofs(&leaves);
        let mut batch = Batch::new_unsigned(
            txs.iter().map(|t| t.id).collect(),
            root,
            [7u8; 32],
            42,
            100,
            0,
            [0u8; 16],
        );
        batch.attach_signature("aa", "bb", "cc");

        let encoded = encode_batch(&batch, &txs);
        let (decoded_batch, decoded_txs) = decode_batch(&encoded).unwrap();

        assert_eq!(decoded_batch.id, batch.id);
        assert_eq!(decoded_batch.root, batch.root);
        assert_eq!(decoded_batch.signature, batch.signature);
        assert_eq!(decoded_txs, txs);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let tx = sample_tx(1);
        let mut encoded = encode_transaction(&tx);
        encoded.truncate(10);
        let mut r = Reader::new(&encoded);
        assert!(decode_transaction(&mut r).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let txs = vec![sample_tx(1)];
        let leaves: Vec<Hash> = txs.iter().map(|t| t.leaf_hash()).collect();
        let (root, _) = crate::merkle::build_merkle_tree_with_proofs(&leaves);
        let batch = Batch::new_unsigned(txs.iter().map(|t| t.id).collect(), root, [0u8; 32], 0, 0, 0, [0u8; 16]);
        let mut encoded = encode_batch(&batch, &txs);
        encoded.push(0xFF);
        assert_eq!(decode_batch(&encoded), Err(CodecError::TrailingBytes));
    }
}
