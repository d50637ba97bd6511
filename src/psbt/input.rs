use std::collections::BTreeMap;

use crate::bitcoin::consensus::encode::serialize;
use crate::bitcoin::consensus::Decodable;
use crate::bitcoin::{PubkeyHash, PublicKey, ScriptBuf, TxOut};
use crate::provider::{key_id, KeyOriginInfo};
use crate::sighash::SigHashType;
use crate::sign::{SigPair, SignatureData};

use super::codec::{
    decode_hd_keypath, decode_unknown, deserialize_from_vector, encode_hd_keypaths,
    encode_unknown, expect_bare_key, pubkey_from_key, read_bytes, serialize_to_vector, union,
    PSBT_IN_BIP32_DERIVATION, PSBT_IN_PARTIAL_SIG, PSBT_IN_REDEEMSCRIPT, PSBT_IN_SCRIPTSIG,
    PSBT_IN_SIGHASH, PSBT_IN_UTXO, PSBT_SEPARATOR,
};
use super::error::{Error, Field};

/// Per-input signing state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsbtInput {
    /// The output this input spends
    pub utxo: Option<TxOut>,
    pub redeem_script: ScriptBuf,
    pub final_script_sig: ScriptBuf,
    pub hd_keypaths: BTreeMap<PublicKey, KeyOriginInfo>,
    pub partial_sigs: BTreeMap<PubkeyHash, SigPair>,
    pub unknown: BTreeMap<Vec<u8>, Vec<u8>>,
    pub sighash_type: Option<SigHashType>,
}

impl PsbtInput {
    pub fn is_null(&self) -> bool {
        self.utxo.is_none()
            && self.partial_sigs.is_empty()
            && self.unknown.is_empty()
            && self.hd_keypaths.is_empty()
            && self.redeem_script.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        !self.final_script_sig.is_empty()
    }

    /// A finalized input carries no raw signing material
    pub fn is_sane(&self) -> bool {
        !self.is_finalized()
            || (self.partial_sigs.is_empty()
                && self.redeem_script.is_empty()
                && self.hd_keypaths.is_empty()
                && self.sighash_type.is_none())
    }

    pub fn fill_signature_data(&self, sigdata: &mut SignatureData) {
        if self.is_finalized() {
            sigdata.script_sig = self.final_script_sig.clone();
            sigdata.complete = true;
        }
        if sigdata.complete {
            return;
        }

        union(&mut sigdata.signatures, &self.partial_sigs);
        if !self.redeem_script.is_empty() {
            sigdata.redeem_script = self.redeem_script.clone();
        }
        for (pubkey, origin) in &self.hd_keypaths {
            sigdata
                .misc_pubkeys
                .entry(key_id(pubkey))
                .or_insert_with(|| (*pubkey, origin.clone()));
        }
    }

    pub fn from_signature_data(&mut self, sigdata: &SignatureData) {
        if sigdata.complete {
            self.retire_signing_material();
            if !sigdata.script_sig.is_empty() {
                self.final_script_sig = sigdata.script_sig.clone();
            }
            return;
        }

        union(&mut self.partial_sigs, &sigdata.signatures);
        if self.redeem_script.is_empty() && !sigdata.redeem_script.is_empty() {
            self.redeem_script = sigdata.redeem_script.clone();
        }
        for (pubkey, origin) in sigdata.misc_pubkeys.values() {
            self.hd_keypaths
                .entry(*pubkey)
                .or_insert_with(|| origin.clone());
        }
    }

    fn retire_signing_material(&mut self) {
        self.partial_sigs.clear();
        self.hd_keypaths.clear();
        self.redeem_script = ScriptBuf::new();
        self.sighash_type = None;
    }

    /// Folds `other` into `self`, returning the name of the first scalar
    /// field on which both sides disagree.
    pub fn merge(&mut self, other: &PsbtInput) -> Result<(), &'static str> {
        match (&self.utxo, &other.utxo) {
            (None, Some(utxo)) => self.utxo = Some(utxo.clone()),
            (Some(a), Some(b)) if a != b => return Err("utxo"),
            _ => {}
        }
        match (self.sighash_type, other.sighash_type) {
            (None, Some(sighash)) => self.sighash_type = Some(sighash),
            (Some(a), Some(b)) if a != b && !self.is_finalized() && !other.is_finalized() => {
                return Err("sighash type")
            }
            _ => {}
        }
        if self.redeem_script.is_empty() {
            self.redeem_script = other.redeem_script.clone();
        } else if !other.redeem_script.is_empty() && self.redeem_script != other.redeem_script {
            return Err("redeem script");
        }
        if self.final_script_sig.is_empty() {
            self.final_script_sig = other.final_script_sig.clone();
        }

        union(&mut self.partial_sigs, &other.partial_sigs);
        union(&mut self.hd_keypaths, &other.hd_keypaths);
        union(&mut self.unknown, &other.unknown);

        if self.is_finalized() {
            self.retire_signing_material();
        }
        Ok(())
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        if let Some(utxo) = &self.utxo {
            serialize_to_vector(buf, &[PSBT_IN_UTXO]);
            serialize_to_vector(buf, &serialize(utxo));
        }

        if self.final_script_sig.is_empty() {
            for (pubkey, sig) in self.partial_sigs.values() {
                let mut key = vec![PSBT_IN_PARTIAL_SIG];
                key.extend_from_slice(&pubkey.to_bytes());
                serialize_to_vector(buf, &key);
                serialize_to_vector(buf, sig);
            }

            if let Some(sighash) = self.sighash_type {
                serialize_to_vector(buf, &[PSBT_IN_SIGHASH]);
                serialize_to_vector(buf, &sighash.to_u32().to_le_bytes());
            }

            if !self.redeem_script.is_empty() {
                serialize_to_vector(buf, &[PSBT_IN_REDEEMSCRIPT]);
                serialize_to_vector(buf, self.redeem_script.as_bytes());
            }

            encode_hd_keypaths(buf, &self.hd_keypaths, PSBT_IN_BIP32_DERIVATION);
        }

        if !self.final_script_sig.is_empty() {
            serialize_to_vector(buf, &[PSBT_IN_SCRIPTSIG]);
            serialize_to_vector(buf, self.final_script_sig.as_bytes());
        }

        encode_unknown(buf, &self.unknown);
        buf.push(PSBT_SEPARATOR);
    }

    /// Reads records up to and including the separator, or to the end of `r`
    pub(crate) fn decode(r: &mut &[u8]) -> Result<Self, Error> {
        let mut input = PsbtInput::default();
        while !r.is_empty() {
            let key = read_bytes(r)?;
            let Some(&tag) = key.first() else {
                break;
            };

            match tag {
                PSBT_IN_UTXO => {
                    if input.utxo.is_some() {
                        return Err(Error::DuplicateKey(Field::InputUtxo));
                    }
                    expect_bare_key(&key, Field::InputUtxo)?;
                    let utxo = deserialize_from_vector(r, |r| Ok(TxOut::consensus_decode(r)?))?;
                    input.utxo = Some(utxo);
                }
                PSBT_IN_PARTIAL_SIG => {
                    let pubkey = pubkey_from_key(&key, Field::InputPartialSig)?;
                    let id = key_id(&pubkey);
                    if input.partial_sigs.contains_key(&id) {
                        return Err(Error::DuplicateKey(Field::InputPartialSig));
                    }
                    let sig = read_bytes(r)?;
                    input.partial_sigs.insert(id, (pubkey, sig));
                }
                PSBT_IN_SIGHASH => {
                    if input.sighash_type.is_some() {
                        return Err(Error::DuplicateKey(Field::InputSighash));
                    }
                    expect_bare_key(&key, Field::InputSighash)?;
                    let raw = deserialize_from_vector(r, |r| Ok(u32::consensus_decode(r)?))?;
                    input.sighash_type = Some(SigHashType::from_u32(raw));
                }
                PSBT_IN_REDEEMSCRIPT => {
                    if !input.redeem_script.is_empty() {
                        return Err(Error::DuplicateKey(Field::InputRedeemScript));
                    }
                    expect_bare_key(&key, Field::InputRedeemScript)?;
                    input.redeem_script = ScriptBuf::from_bytes(read_bytes(r)?);
                }
                PSBT_IN_BIP32_DERIVATION => {
                    decode_hd_keypath(r, &key, &mut input.hd_keypaths)?;
                }
                PSBT_IN_SCRIPTSIG => {
                    if !input.final_script_sig.is_empty() {
                        return Err(Error::DuplicateKey(Field::InputFinalScriptSig));
                    }
                    expect_bare_key(&key, Field::InputFinalScriptSig)?;
                    input.final_script_sig = ScriptBuf::from_bytes(read_bytes(r)?);
                }
                _ => decode_unknown(r, key, &mut input.unknown)?,
            }
        }
        Ok(input)
    }
}
