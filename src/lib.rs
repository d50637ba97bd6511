mod error;
pub mod provider;
pub mod psbt;
pub mod sighash;
pub mod sign;
#[cfg(test)]
mod test_utils;
pub mod transaction;

// re-export bitcoin from the miniscript crate
pub use ::miniscript::bitcoin;

pub use error::WasmPsbtError;
pub use provider::{
    FlatSigningProvider, HidingSigningProvider, KeyOriginInfo, SigningProvider,
    DUMMY_SIGNING_PROVIDER,
};
pub use psbt::{extract_final_transaction, PartiallySignedTransaction};
pub use sighash::SigHashType;
pub use sign::{is_solvable, produce_signature, sign_transaction, SignError, SignatureData};

pub mod wasm;
pub use wasm::{WasmSigningProvider, WrapPsbt};
