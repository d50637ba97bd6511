use std::collections::BTreeMap;

use crate::bitcoin::{PubkeyHash, PublicKey, ScriptBuf};
use crate::provider::KeyOriginInfo;

/// Public key and the signature it made, sighash byte included
pub type SigPair = (PublicKey, Vec<u8>);

/// Signing progress for a single input.
///
/// Once `complete` is set the `script_sig` is final and merging leaves the
/// record untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureData {
    pub complete: bool,
    pub script_sig: ScriptBuf,
    /// Redeem script of a P2SH output, empty otherwise
    pub redeem_script: ScriptBuf,
    pub signatures: BTreeMap<PubkeyHash, SigPair>,
    /// Keys involved in the script that have not signed yet, with their origin
    pub misc_pubkeys: BTreeMap<PubkeyHash, (PublicKey, KeyOriginInfo)>,
}

impl SignatureData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing, possibly partial, scriptSig
    pub fn from_script_sig(script_sig: ScriptBuf) -> Self {
        SignatureData {
            script_sig,
            ..Default::default()
        }
    }

    /// Folds `other` into `self`.
    ///
    /// Maps are unioned keeping the entry already present. A complete side
    /// replaces an incomplete one wholesale.
    pub fn merge(&mut self, other: SignatureData) {
        if self.complete {
            return;
        }
        if other.complete {
            *self = other;
            return;
        }
        if self.redeem_script.is_empty() && !other.redeem_script.is_empty() {
            self.redeem_script = other.redeem_script;
        }
        if self.script_sig.is_empty() && !other.script_sig.is_empty() {
            self.script_sig = other.script_sig;
        }
        for (id, pair) in other.signatures {
            self.signatures.entry(id).or_insert(pair);
        }
        for (id, entry) in other.misc_pubkeys {
            self.misc_pubkeys.entry(id).or_insert(entry);
        }
    }
}
