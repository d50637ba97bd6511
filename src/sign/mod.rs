//! Producing scriptSigs for standard output scripts.

mod creator;
mod interpreter;
mod produce;
mod signature_data;
mod solver;

use core::fmt;

pub use creator::{
    DummySignatureChecker, DummySignatureCreator, SignatureChecker, SignatureCreator,
    TransactionSignatureChecker, TransactionSignatureCreator, DUMMY_MAXIMUM_SIGNATURE_CREATOR,
    DUMMY_SIGNATURE_CREATOR,
};
pub use interpreter::{push_only_stack, verify_script_sig};
pub use produce::{
    data_from_transaction, is_solvable, produce_signature, sign_transaction,
    sign_transaction_from_prev, update_input,
};
pub use signature_data::{SigPair, SignatureData};
pub use solver::{
    build_multisig_script, build_p2pk_script, build_p2pkh_script, build_p2sh_script, solve,
    TxoutType,
};

/// Caller errors while signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    InputIndexOutOfRange { index: usize, inputs: usize },
    /// The previous transaction has no output at the spent index
    PrevoutIndexOutOfRange { vout: u32, outputs: usize },
    /// A PSBT input has no record of the output it spends
    MissingUtxo { index: usize },
    /// The recorded redeem script does not hash to the spent P2SH output
    RedeemScriptMismatch { index: usize },
    /// The PSBT input requests a different sighash type than the signer
    SighashMismatch {
        index: usize,
        psbt: crate::sighash::SigHashType,
        requested: crate::sighash::SigHashType,
    },
    /// The PSBT has no unsigned transaction
    MissingUnsignedTx,
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignError::InputIndexOutOfRange { index, inputs } => write!(
                f,
                "Input index {} out of range (transaction has {} inputs)",
                index, inputs
            ),
            SignError::PrevoutIndexOutOfRange { vout, outputs } => write!(
                f,
                "Previous output index {} out of range (transaction has {} outputs)",
                vout, outputs
            ),
            SignError::MissingUtxo { index } => {
                write!(f, "Input {} does not specify the output it spends", index)
            }
            SignError::RedeemScriptMismatch { index } => write!(
                f,
                "Input {} redeemScript does not match the scriptPubKey being spent",
                index
            ),
            SignError::SighashMismatch {
                index,
                psbt,
                requested,
            } => write!(
                f,
                "Specified sighash and sighash in PSBT do not match (input {}: {} vs {})",
                index, requested, psbt
            ),
            SignError::MissingUnsignedTx => write!(f, "PSBT has no unsigned transaction"),
        }
    }
}

impl std::error::Error for SignError {}
