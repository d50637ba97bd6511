use core::fmt;

use crate::bitcoin::consensus::encode;

/// Record kinds that can be duplicated or carry a malformed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    GlobalUnsignedTx,
    InputUtxo,
    InputPartialSig,
    InputSighash,
    InputRedeemScript,
    InputFinalScriptSig,
    Bip32Derivation,
    OutputRedeemScript,
    Unknown,
}

impl Field {
    fn duplicate_reason(self) -> &'static str {
        match self {
            Field::GlobalUnsignedTx => "unsigned tx",
            Field::InputUtxo => "input utxo",
            Field::InputPartialSig => "input partial signature for pubkey",
            Field::InputSighash => "input sighash type",
            Field::InputRedeemScript => "input redeemScript",
            Field::InputFinalScriptSig => "input final scriptSig",
            Field::Bip32Derivation => "pubkey derivation path",
            Field::OutputRedeemScript => "output redeemScript",
            Field::Unknown => "key for unknown value",
        }
    }

    fn key_length_reason(self) -> &'static str {
        match self {
            Field::GlobalUnsignedTx => "Global unsigned tx key is more than one byte type",
            Field::InputUtxo => "utxo key is more than one byte type",
            Field::InputPartialSig => {
                "Size of key was not the expected size for the type partial signature pubkey"
            }
            Field::InputSighash => "Sighash type key is more than one byte type",
            Field::InputRedeemScript => "Input redeemScript key is more than one byte type",
            Field::InputFinalScriptSig => "Final scriptSig key is more than one byte type",
            Field::Bip32Derivation => {
                "Size of key was not the expected size for the type BIP32 keypath"
            }
            Field::OutputRedeemScript => "Output redeemScript key is more than one byte type",
            Field::Unknown => "Unknown key is empty",
        }
    }
}

/// Why a PSBT could not be decoded, merged or extracted
#[derive(Debug)]
pub enum Error {
    InvalidMagic,
    DuplicateKey(Field),
    InvalidKeyLength(Field),
    InvalidPubkey,
    /// Derivation value length zero or not a multiple of 4
    InvalidKeypathLength(u64),
    /// A length-prefixed value did not consume exactly its declared length
    SizeMismatch { expected: u64, actual: u64 },
    NonEmptyScriptSig,
    MissingUnsignedTx,
    InputCountMismatch { expected: usize, actual: usize },
    OutputCountMismatch { expected: usize, actual: usize },
    NotSane,
    TrailingData(usize),
    Consensus(encode::Error),
    Base64(base64::DecodeError),
    /// Merging PSBTs built over different unsigned transactions
    UnexpectedUnsignedTx,
    ConflictingInput { index: usize, field: &'static str },
    ConflictingOutput { index: usize, field: &'static str },
    NotFinalized(usize),
    /// `combine_psbts` was given an empty list
    NoPsbts,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidMagic => write!(f, "Invalid PSBT magic bytes"),
            Error::DuplicateKey(field) => {
                write!(f, "Duplicate Key, {} already provided", field.duplicate_reason())
            }
            Error::InvalidKeyLength(field) => write!(f, "{}", field.key_length_reason()),
            Error::InvalidPubkey => write!(f, "Invalid pubkey"),
            Error::InvalidKeypathLength(len) => {
                write!(f, "Invalid length for HD key path: {}", len)
            }
            Error::SizeMismatch { expected, actual } => write!(
                f,
                "Size of value was not the stated size (stated {}, read {})",
                expected, actual
            ),
            Error::NonEmptyScriptSig => write!(f, "Unsigned tx does not have empty scriptSigs."),
            Error::MissingUnsignedTx => write!(f, "No unsigned transcation was provided"),
            Error::InputCountMismatch { expected, actual } => write!(
                f,
                "Inputs provided does not match the number of inputs in transaction. ({} vs {})",
                actual, expected
            ),
            Error::OutputCountMismatch { expected, actual } => write!(
                f,
                "Outputs provided does not match the number of outputs in transaction. ({} vs {})",
                actual, expected
            ),
            Error::NotSane => write!(f, "PSBT is not sane."),
            Error::TrailingData(len) => {
                write!(f, "Unexpected {} bytes of data after PSBT", len)
            }
            Error::Consensus(e) => write!(f, "Failed to decode PSBT: {}", e),
            Error::Base64(e) => write!(f, "Invalid base64: {}", e),
            Error::UnexpectedUnsignedTx => {
                write!(f, "PSBTs do not refer to the same transactions.")
            }
            Error::ConflictingInput { index, field } => {
                write!(f, "Conflicting {} for input {}", field, index)
            }
            Error::ConflictingOutput { index, field } => {
                write!(f, "Conflicting {} for output {}", field, index)
            }
            Error::NotFinalized(index) => write!(f, "Input {} is not finalized", index),
            Error::NoPsbts => write!(f, "No PSBTs to combine"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Consensus(e) => Some(e),
            Error::Base64(e) => Some(e),
            _ => None,
        }
    }
}

impl From<encode::Error> for Error {
    fn from(e: encode::Error) -> Self {
        Error::Consensus(e)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Base64(e)
    }
}
