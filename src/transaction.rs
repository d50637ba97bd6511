//! Legacy (non-segwit) transaction serialization.
//!
//! Forkid chains never carry witness data, and an unsigned transaction with no
//! inputs must not be mistaken for a segwit marker, so the wire format is
//! written field by field here.

use core::fmt;

use crate::bitcoin::consensus::encode::{self, serialize};
use crate::bitcoin::consensus::Decodable;
use crate::bitcoin::locktime::absolute::LockTime;
use crate::bitcoin::transaction::Version;
use crate::bitcoin::{Transaction, TxIn, TxOut};

pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&serialize(&tx.version));
    buf.extend_from_slice(&serialize(&tx.input));
    buf.extend_from_slice(&serialize(&tx.output));
    buf.extend_from_slice(&serialize(&tx.lock_time));
    buf
}

/// Decodes one transaction from the front of `r`, advancing it
pub fn decode_transaction_from(r: &mut &[u8]) -> Result<Transaction, encode::Error> {
    let version = Version::consensus_decode(r)?;
    let input = Vec::<TxIn>::consensus_decode(r)?;
    let output = Vec::<TxOut>::consensus_decode(r)?;
    let lock_time = LockTime::consensus_decode(r)?;
    Ok(Transaction {
        version,
        lock_time,
        input,
        output,
    })
}

/// Why a standalone transaction could not be decoded
#[derive(Debug)]
pub enum DecodeTransactionError {
    Consensus(encode::Error),
    TrailingBytes(usize),
}

impl fmt::Display for DecodeTransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeTransactionError::Consensus(e) => {
                write!(f, "Failed to decode transaction: {}", e)
            }
            DecodeTransactionError::TrailingBytes(len) => {
                write!(f, "Unexpected {} trailing bytes after transaction", len)
            }
        }
    }
}

impl std::error::Error for DecodeTransactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeTransactionError::Consensus(e) => Some(e),
            DecodeTransactionError::TrailingBytes(_) => None,
        }
    }
}

impl From<encode::Error> for DecodeTransactionError {
    fn from(e: encode::Error) -> Self {
        DecodeTransactionError::Consensus(e)
    }
}

/// Decodes a transaction that must span all of `bytes`
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, DecodeTransactionError> {
    let mut r = bytes;
    let tx = decode_transaction_from(&mut r)?;
    if !r.is_empty() {
        return Err(DecodeTransactionError::TrailingBytes(r.len()));
    }
    Ok(tx)
}
