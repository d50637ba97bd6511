//! Signature digests for forkid chains.
//!
//! Types carrying `SIGHASH_FORKID` commit to the spent amount using the
//! replay protected BIP143-style digest. Anything else falls back to the
//! legacy digest.

use core::fmt;
use core::str::FromStr;

use crate::bitcoin::consensus::encode::serialize;
use crate::bitcoin::hashes::{sha256d, Hash};
use crate::bitcoin::sighash::SighashCache;
use crate::bitcoin::{Amount, Script, Transaction};
use crate::sign::SignError;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_FORKID: u32 = 0x40;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

const SIGHASH_BASE_MASK: u32 = 0x1f;

/// Raw 32-bit signature hash type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigHashType(u32);

impl SigHashType {
    pub const ALL_FORKID: SigHashType = SigHashType(SIGHASH_ALL | SIGHASH_FORKID);

    pub const fn from_u32(raw: u32) -> Self {
        SigHashType(raw)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// The byte appended to signatures
    pub const fn to_byte(self) -> u8 {
        self.0 as u8
    }

    pub const fn base_type(self) -> u32 {
        self.0 & SIGHASH_BASE_MASK
    }

    pub const fn has_forkid(self) -> bool {
        self.0 & SIGHASH_FORKID != 0
    }

    pub const fn has_anyone_can_pay(self) -> bool {
        self.0 & SIGHASH_ANYONECANPAY != 0
    }

    pub const fn with_anyone_can_pay(self, anyone_can_pay: bool) -> Self {
        if anyone_can_pay {
            SigHashType(self.0 | SIGHASH_ANYONECANPAY)
        } else {
            SigHashType(self.0 & !SIGHASH_ANYONECANPAY)
        }
    }
}

impl Default for SigHashType {
    fn default() -> Self {
        SigHashType::ALL_FORKID
    }
}

impl fmt::Display for SigHashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base_type() {
            SIGHASH_ALL => "ALL",
            SIGHASH_NONE => "NONE",
            SIGHASH_SINGLE => "SINGLE",
            _ => return write!(f, "0x{:08x}", self.0),
        };
        write!(f, "{}", base)?;
        if self.has_forkid() {
            write!(f, "|FORKID")?;
        }
        if self.has_anyone_can_pay() {
            write!(f, "|ANYONECANPAY")?;
        }
        Ok(())
    }
}

impl FromStr for SigHashType {
    type Err = String;

    /// Parses `ALL|FORKID`, `SINGLE|FORKID|ANYONECANPAY` and friends
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut raw = 0u32;
        for (i, part) in s.split('|').enumerate() {
            let flag = match (i, part) {
                (0, "ALL") => SIGHASH_ALL,
                (0, "NONE") => SIGHASH_NONE,
                (0, "SINGLE") => SIGHASH_SINGLE,
                (i, "FORKID") if i > 0 => SIGHASH_FORKID,
                (i, "ANYONECANPAY") if i > 0 => SIGHASH_ANYONECANPAY,
                _ => return Err(format!("{} is not a valid sighash parameter.", s)),
            };
            if raw & flag != 0 && i > 0 {
                return Err(format!("{} is not a valid sighash parameter.", s));
            }
            raw |= flag;
        }
        Ok(SigHashType(raw))
    }
}

/// Digest signed for `input_index` of `tx` spending `amount` under `script_code`
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: Amount,
    sighash_type: SigHashType,
) -> Result<[u8; 32], SignError> {
    if input_index >= tx.input.len() {
        return Err(SignError::InputIndexOutOfRange {
            index: input_index,
            inputs: tx.input.len(),
        });
    }

    if !sighash_type.has_forkid() {
        let hash = SighashCache::new(tx)
            .legacy_signature_hash(input_index, script_code, sighash_type.to_u32())
            .map_err(|_| SignError::InputIndexOutOfRange {
                index: input_index,
                inputs: tx.input.len(),
            })?;
        return Ok(hash.to_byte_array());
    }

    let preimage = forkid_preimage(tx, input_index, script_code, amount, sighash_type);
    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}

fn forkid_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: Amount,
    sighash_type: SigHashType,
) -> Vec<u8> {
    let input = &tx.input[input_index];
    let base = sighash_type.base_type();
    let anyone_can_pay = sighash_type.has_anyone_can_pay();

    let hash_prevouts = if !anyone_can_pay {
        let mut buf = Vec::with_capacity(tx.input.len() * 36);
        for txin in &tx.input {
            buf.extend_from_slice(&serialize(&txin.previous_output));
        }
        sha256d::Hash::hash(&buf).to_byte_array()
    } else {
        [0u8; 32]
    };

    let hash_sequence = if !anyone_can_pay && base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        let mut buf = Vec::with_capacity(tx.input.len() * 4);
        for txin in &tx.input {
            buf.extend_from_slice(&txin.sequence.0.to_le_bytes());
        }
        sha256d::Hash::hash(&buf).to_byte_array()
    } else {
        [0u8; 32]
    };

    let hash_outputs = if base != SIGHASH_SINGLE && base != SIGHASH_NONE {
        let mut buf = Vec::new();
        for txout in &tx.output {
            buf.extend_from_slice(&serialize(txout));
        }
        sha256d::Hash::hash(&buf).to_byte_array()
    } else if base == SIGHASH_SINGLE && input_index < tx.output.len() {
        sha256d::Hash::hash(&serialize(&tx.output[input_index])).to_byte_array()
    } else {
        [0u8; 32]
    };

    let mut preimage = Vec::with_capacity(160 + script_code.len());
    preimage.extend_from_slice(&tx.version.0.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&serialize(&input.previous_output));
    preimage.extend_from_slice(&serialize(&script_code.to_owned()));
    preimage.extend_from_slice(&amount.to_sat().to_le_bytes());
    preimage.extend_from_slice(&input.sequence.0.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
    preimage.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    preimage
}
