//! Deterministic keys and transactions shared by unit tests

use crate::bitcoin::hashes::Hash;
use crate::bitcoin::locktime::absolute::LockTime;
use crate::bitcoin::secp256k1::{Secp256k1, SecretKey};
use crate::bitcoin::transaction::Version;
use crate::bitcoin::{
    Amount, NetworkKind, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness,
};

/// Compressed key with secret `[n; 32]`
pub fn test_key(n: u8) -> PrivateKey {
    let secret = SecretKey::from_slice(&[n; 32]).expect("small repeated byte is a valid scalar");
    PrivateKey::new(secret, NetworkKind::Main)
}

pub fn test_pubkey(n: u8) -> PublicKey {
    test_key(n).public_key(&Secp256k1::signing_only())
}

pub fn test_outpoint(n: u8) -> OutPoint {
    OutPoint {
        txid: Txid::from_byte_array([n; 32]),
        vout: n as u32,
    }
}

/// Unsigned transaction spending `inputs` prevouts into one output
pub fn unsigned_tx(inputs: u8, output_script: ScriptBuf) -> Transaction {
    Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: (1..=inputs)
            .map(|n| TxIn {
                previous_output: test_outpoint(n),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::from_sat(90_000),
            script_pubkey: output_script,
        }],
    }
}

pub fn prevout(script_pubkey: ScriptBuf) -> TxOut {
    TxOut {
        value: Amount::from_sat(100_000),
        script_pubkey,
    }
}
