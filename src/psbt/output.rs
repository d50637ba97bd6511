use std::collections::BTreeMap;

use crate::bitcoin::{PublicKey, ScriptBuf};
use crate::provider::{key_id, KeyOriginInfo};
use crate::sign::SignatureData;

use super::codec::{
    decode_hd_keypath, decode_unknown, encode_hd_keypaths, encode_unknown, expect_bare_key,
    read_bytes, serialize_to_vector, union, PSBT_OUT_BIP32_DERIVATION, PSBT_OUT_REDEEMSCRIPT,
    PSBT_SEPARATOR,
};
use super::error::{Error, Field};

/// Information about one output of the unsigned transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsbtOutput {
    pub redeem_script: ScriptBuf,
    pub hd_keypaths: BTreeMap<PublicKey, KeyOriginInfo>,
    pub unknown: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl PsbtOutput {
    pub fn is_null(&self) -> bool {
        self.redeem_script.is_empty() && self.hd_keypaths.is_empty() && self.unknown.is_empty()
    }

    pub fn fill_signature_data(&self, sigdata: &mut SignatureData) {
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
        if self.redeem_script.is_empty() && !sigdata.redeem_script.is_empty() {
            self.redeem_script = sigdata.redeem_script.clone();
        }
        for (pubkey, origin) in sigdata.misc_pubkeys.values() {
            self.hd_keypaths
                .entry(*pubkey)
                .or_insert_with(|| origin.clone());
        }
    }

    pub fn merge(&mut self, other: &PsbtOutput) -> Result<(), &'static str> {
        if self.redeem_script.is_empty() {
            self.redeem_script = other.redeem_script.clone();
        } else if !other.redeem_script.is_empty() && self.redeem_script != other.redeem_script {
            return Err("redeem script");
        }
        union(&mut self.hd_keypaths, &other.hd_keypaths);
        union(&mut self.unknown, &other.unknown);
        Ok(())
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        if !self.redeem_script.is_empty() {
            serialize_to_vector(buf, &[PSBT_OUT_REDEEMSCRIPT]);
            serialize_to_vector(buf, self.redeem_script.as_bytes());
        }
        encode_hd_keypaths(buf, &self.hd_keypaths, PSBT_OUT_BIP32_DERIVATION);
        encode_unknown(buf, &self.unknown);
        buf.push(PSBT_SEPARATOR);
    }

    pub(crate) fn decode(r: &mut &[u8]) -> Result<Self, Error> {
        let mut output = PsbtOutput::default();
        while !r.is_empty() {
            let key = read_bytes(r)?;
            let Some(&tag) = key.first() else {
                break;
            };

            match tag {
                PSBT_OUT_REDEEMSCRIPT => {
                    if !output.redeem_script.is_empty() {
                        return Err(Error::DuplicateKey(Field::OutputRedeemScript));
                    }
                    expect_bare_key(&key, Field::OutputRedeemScript)?;
                    output.redeem_script = ScriptBuf::from_bytes(read_bytes(r)?);
                }
                PSBT_OUT_BIP32_DERIVATION => {
                    decode_hd_keypath(r, &key, &mut output.hd_keypaths)?;
                }
                _ => decode_unknown(r, key, &mut output.unknown)?,
            }
        }
        Ok(output)
    }
}
