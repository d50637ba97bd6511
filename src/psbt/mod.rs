//! Partially signed transactions: the container several signers pass around,
//! its binary record format and the rules for combining copies of it.

mod codec;
mod error;
mod input;
mod output;
mod sign;

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::bitcoin::{Transaction, Txid};
use crate::transaction::{decode_transaction_from, encode_transaction};

use codec::{
    decode_unknown, deserialize_from_vector, encode_unknown, expect_bare_key, read_bytes,
    serialize_to_vector, union,
};

pub use codec::{
    PSBT_GLOBAL_UNSIGNED_TX, PSBT_IN_BIP32_DERIVATION, PSBT_IN_PARTIAL_SIG, PSBT_IN_REDEEMSCRIPT,
    PSBT_IN_SCRIPTSIG, PSBT_IN_SIGHASH, PSBT_IN_UTXO, PSBT_MAGIC_BYTES,
    PSBT_OUT_BIP32_DERIVATION, PSBT_OUT_REDEEMSCRIPT, PSBT_SEPARATOR,
};
pub use error::{Error, Field};
pub use input::PsbtInput;
pub use output::PsbtOutput;
pub use sign::{fill_psbt, sign_psbt_input};

#[derive(Debug, Clone, Default)]
pub struct PartiallySignedTransaction {
    /// Unsigned transaction, `None` until one has been supplied or decoded
    pub tx: Option<Transaction>,
    pub inputs: Vec<PsbtInput>,
    pub outputs: Vec<PsbtOutput>,
    pub unknown: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Two PSBTs are equal when they describe the same unsigned transaction
impl PartialEq for PartiallySignedTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.tx == other.tx
    }
}

impl Eq for PartiallySignedTransaction {}

impl PartiallySignedTransaction {
    /// Wraps an unsigned transaction with empty per-input and per-output records
    pub fn from_unsigned_tx(tx: Transaction) -> Result<Self, Error> {
        if tx.input.iter().any(|txin| !txin.script_sig.is_empty()) {
            return Err(Error::NonEmptyScriptSig);
        }
        Ok(PartiallySignedTransaction {
            inputs: vec![PsbtInput::default(); tx.input.len()],
            outputs: vec![PsbtOutput::default(); tx.output.len()],
            unknown: BTreeMap::new(),
            tx: Some(tx),
        })
    }

    pub fn is_null(&self) -> bool {
        self.tx.is_none() && self.inputs.is_empty() && self.outputs.is_empty() && self.unknown.is_empty()
    }

    pub fn is_sane(&self) -> bool {
        self.inputs.iter().all(PsbtInput::is_sane)
    }

    /// Every input carries a final scriptSig
    pub fn is_complete(&self) -> bool {
        self.check_counts().is_ok() && self.inputs.iter().all(PsbtInput::is_finalized)
    }

    /// The unsigned transaction, once its input and output counts match the maps
    fn check_counts(&self) -> Result<&Transaction, Error> {
        let tx = self.tx.as_ref().ok_or(Error::MissingUnsignedTx)?;
        if tx.input.len() != self.inputs.len() {
            return Err(Error::InputCountMismatch {
                expected: tx.input.len(),
                actual: self.inputs.len(),
            });
        }
        if tx.output.len() != self.outputs.len() {
            return Err(Error::OutputCountMismatch {
                expected: tx.output.len(),
                actual: self.outputs.len(),
            });
        }
        Ok(tx)
    }

    pub fn unsigned_txid(&self) -> Option<Txid> {
        self.tx.as_ref().map(Transaction::compute_txid)
    }

    /// Folds the signing state of `other` into `self`.
    ///
    /// On error `self` is left unchanged.
    pub fn merge(&mut self, other: &PartiallySignedTransaction) -> Result<(), Error> {
        if self.tx != other.tx {
            return Err(Error::UnexpectedUnsignedTx);
        }
        if self.tx.is_some() {
            self.check_counts()?;
            other.check_counts()?;
        }

        let mut merged = self.clone();
        for (index, (input, theirs)) in merged.inputs.iter_mut().zip(&other.inputs).enumerate() {
            input
                .merge(theirs)
                .map_err(|field| Error::ConflictingInput { index, field })?;
        }
        for (index, (output, theirs)) in merged.outputs.iter_mut().zip(&other.outputs).enumerate()
        {
            output
                .merge(theirs)
                .map_err(|field| Error::ConflictingOutput { index, field })?;
        }
        union(&mut merged.unknown, &other.unknown);

        *self = merged;
        Ok(())
    }

    /// Merge as a new value
    pub fn combine(&self, other: &PartiallySignedTransaction) -> Result<Self, Error> {
        let mut merged = self.clone();
        merged.merge(other)?;
        Ok(merged)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let tx = self.check_counts()?;

        let mut buf = PSBT_MAGIC_BYTES.to_vec();

        serialize_to_vector(&mut buf, &[PSBT_GLOBAL_UNSIGNED_TX]);
        serialize_to_vector(&mut buf, &encode_transaction(tx));
        encode_unknown(&mut buf, &self.unknown);
        buf.push(PSBT_SEPARATOR);

        for input in &self.inputs {
            input.encode(&mut buf);
        }
        for output in &self.outputs {
            output.encode(&mut buf);
        }
        Ok(buf)
    }

    /// Decodes a complete PSBT; bytes left after the last output are an error
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = bytes;
        let psbt = Self::decode(&mut r)?;
        if !r.is_empty() {
            return Err(Error::TrailingData(r.len()));
        }
        Ok(psbt)
    }

    fn decode(r: &mut &[u8]) -> Result<Self, Error> {
        if r.len() < PSBT_MAGIC_BYTES.len() || r[..PSBT_MAGIC_BYTES.len()] != PSBT_MAGIC_BYTES {
            return Err(Error::InvalidMagic);
        }
        *r = &r[PSBT_MAGIC_BYTES.len()..];

        let mut psbt = PartiallySignedTransaction::default();

        while !r.is_empty() {
            let key = read_bytes(r)?;
            let Some(&tag) = key.first() else {
                break;
            };

            match tag {
                PSBT_GLOBAL_UNSIGNED_TX => {
                    if psbt.tx.is_some() {
                        return Err(Error::DuplicateKey(Field::GlobalUnsignedTx));
                    }
                    expect_bare_key(&key, Field::GlobalUnsignedTx)?;
                    let tx = deserialize_from_vector(r, |r| Ok(decode_transaction_from(r)?))?;
                    if tx.input.iter().any(|txin| !txin.script_sig.is_empty()) {
                        return Err(Error::NonEmptyScriptSig);
                    }
                    psbt.tx = Some(tx);
                }
                _ => decode_unknown(r, key, &mut psbt.unknown)?,
            }
        }

        let (input_count, output_count) = match &psbt.tx {
            Some(tx) => (tx.input.len(), tx.output.len()),
            None => return Err(Error::MissingUnsignedTx),
        };

        while !r.is_empty() && psbt.inputs.len() < input_count {
            psbt.inputs.push(PsbtInput::decode(r)?);
        }
        if psbt.inputs.len() != input_count {
            return Err(Error::InputCountMismatch {
                expected: input_count,
                actual: psbt.inputs.len(),
            });
        }

        while !r.is_empty() && psbt.outputs.len() < output_count {
            psbt.outputs.push(PsbtOutput::decode(r)?);
        }
        if psbt.outputs.len() != output_count {
            return Err(Error::OutputCountMismatch {
                expected: output_count,
                actual: psbt.outputs.len(),
            });
        }

        if !psbt.is_sane() {
            return Err(Error::NotSane);
        }
        Ok(psbt)
    }

    pub fn to_base64(&self) -> Result<String, Error> {
        Ok(BASE64_STANDARD.encode(self.serialize()?))
    }

    pub fn from_base64(text: &str) -> Result<Self, Error> {
        let bytes = BASE64_STANDARD.decode(text.trim())?;
        Self::deserialize(&bytes)
    }

    /// Copies every final scriptSig into the unsigned transaction
    pub fn extract_final_transaction(&self) -> Result<Transaction, Error> {
        let mut tx = self.check_counts()?.clone();
        for (index, (txin, input)) in tx.input.iter_mut().zip(&self.inputs).enumerate() {
            if !input.is_finalized() {
                return Err(Error::NotFinalized(index));
            }
            txin.script_sig = input.final_script_sig.clone();
        }
        Ok(tx)
    }
}

pub fn extract_final_transaction(psbt: &PartiallySignedTransaction) -> Result<Transaction, Error> {
    psbt.extract_final_transaction()
}

/// Merges a non-empty list of PSBTs over the same transaction
pub fn combine_psbts(
    psbts: &[PartiallySignedTransaction],
) -> Result<PartiallySignedTransaction, Error> {
    let (first, rest) = psbts.split_first().ok_or(Error::NoPsbts)?;
    let mut merged = first.clone();
    for psbt in rest {
        merged.merge(psbt)?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::ScriptBuf;
    use crate::provider::{key_id, KeyOriginInfo};
    use crate::sighash::SigHashType;
    use crate::sign::{build_multisig_script, build_p2pkh_script, build_p2sh_script};
    use crate::test_utils::{prevout, test_pubkey, unsigned_tx};
    use rstest::rstest;

    fn sample_psbt() -> PartiallySignedTransaction {
        let redeem = build_multisig_script(2, &[test_pubkey(1), test_pubkey(2)]);
        let tx = unsigned_tx(2, build_p2pkh_script(&test_pubkey(9)));
        let mut psbt = PartiallySignedTransaction::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].utxo = Some(prevout(build_p2sh_script(&redeem)));
        psbt.inputs[0].redeem_script = redeem;
        psbt.inputs[0].sighash_type = Some(SigHashType::default());
        psbt.inputs[0].hd_keypaths.insert(
            test_pubkey(1),
            KeyOriginInfo::from_indices([1, 2, 3, 4], &[0x8000_0000, 0, 1]),
        );
        psbt.inputs[1].utxo = Some(prevout(build_p2pkh_script(&test_pubkey(3))));
        psbt.outputs[0]
            .hd_keypaths
            .insert(test_pubkey(9), KeyOriginInfo::from_indices([4, 3, 2, 1], &[7]));
        psbt.unknown.insert(vec![0x70, 0x01], vec![0xde, 0xad]);
        psbt
    }

    fn with_partial_sig(n: u8, sig: u8) -> PartiallySignedTransaction {
        let mut psbt = sample_psbt();
        let pubkey = test_pubkey(n);
        psbt.inputs[0]
            .partial_sigs
            .insert(key_id(&pubkey), (pubkey, vec![0x30, sig, 0x41]));
        psbt
    }

    fn assert_same_state(a: &PartiallySignedTransaction, b: &PartiallySignedTransaction) {
        assert_eq!(a, b);
        assert_eq!(a.inputs, b.inputs);
        assert_eq!(a.outputs, b.outputs);
        assert_eq!(a.unknown, b.unknown);
    }

    #[test]
    fn test_serialize_round_trip() {
        let psbt = with_partial_sig(1, 0x01);
        let bytes = psbt.serialize().unwrap();
        assert_eq!(&bytes[..5], b"psbt\xff");

        let decoded = PartiallySignedTransaction::deserialize(&bytes).unwrap();
        assert_same_state(&decoded, &psbt);
        assert_eq!(decoded.serialize().unwrap(), bytes);

        let text = psbt.to_base64().unwrap();
        assert_same_state(&PartiallySignedTransaction::from_base64(&text).unwrap(), &psbt);
    }

    #[test]
    fn test_merge_is_commutative_and_idempotent() {
        let a = with_partial_sig(1, 0x01);
        let b = with_partial_sig(2, 0x02);

        let ab = a.combine(&b).unwrap();
        let ba = b.combine(&a).unwrap();
        assert_same_state(&ab, &ba);
        assert_eq!(ab.inputs[0].partial_sigs.len(), 2);

        let aa = a.combine(&a).unwrap();
        assert_same_state(&aa, &a);

        let all = combine_psbts(&[a.clone(), b, a]).unwrap();
        assert_same_state(&all, &ab);
    }

    #[test]
    fn test_merge_keeps_finalized_inputs() {
        let partial = with_partial_sig(1, 0x01);
        let mut finalized = sample_psbt();
        finalized.inputs[0].redeem_script = ScriptBuf::new();
        finalized.inputs[0].sighash_type = None;
        finalized.inputs[0].hd_keypaths.clear();
        finalized.inputs[0].final_script_sig = ScriptBuf::from_bytes(vec![0x00, 0x51]);

        for merged in [
            partial.combine(&finalized).unwrap(),
            finalized.combine(&partial).unwrap(),
        ] {
            assert!(merged.inputs[0].is_finalized());
            assert!(merged.inputs[0].partial_sigs.is_empty());
            assert!(merged.is_sane());
        }
    }

    #[test]
    fn test_merge_rejects_other_transaction() {
        let mut a = sample_psbt();
        let other = PartiallySignedTransaction::from_unsigned_tx(unsigned_tx(
            1,
            ScriptBuf::new(),
        ))
        .unwrap();
        assert!(matches!(a.merge(&other), Err(Error::UnexpectedUnsignedTx)));
    }

    #[test]
    fn test_conflicting_merge_leaves_self_untouched() {
        let mut a = with_partial_sig(1, 0x01);
        let before = a.clone();
        let mut b = with_partial_sig(2, 0x02);
        b.inputs[1].sighash_type = Some(SigHashType::from_u32(0xc1));
        a.inputs[1].sighash_type = Some(SigHashType::default());
        let before_inputs = a.inputs.clone();

        let result = a.merge(&b);
        assert!(matches!(
            result,
            Err(Error::ConflictingInput {
                index: 1,
                field: "sighash type"
            })
        ));
        assert_eq!(a.inputs, before_inputs);
        assert_eq!(a.outputs, before.outputs);
    }

    #[test]
    fn test_missing_unsigned_tx() {
        let bytes = [b'p', b's', b'b', b't', 0xff, 0x00];
        assert!(matches!(
            PartiallySignedTransaction::deserialize(&bytes),
            Err(Error::MissingUnsignedTx)
        ));
        assert!(matches!(
            PartiallySignedTransaction::default().serialize(),
            Err(Error::MissingUnsignedTx)
        ));
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::wrong_magic(b"psbu\xff\x00")]
    #[case::missing_ff(b"psbt\x00")]
    fn test_invalid_magic(#[case] bytes: &[u8]) {
        assert!(matches!(
            PartiallySignedTransaction::deserialize(bytes),
            Err(Error::InvalidMagic)
        ));
    }

    #[test]
    fn test_trailing_data() {
        let mut bytes = sample_psbt().serialize().unwrap();
        bytes.extend_from_slice(&[0x00, 0x00]);
        assert!(matches!(
            PartiallySignedTransaction::deserialize(&bytes),
            Err(Error::TrailingData(2))
        ));
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let bytes = with_partial_sig(1, 0x01).serialize().unwrap();
        // the end of the stream also closes the last output map
        let (_, without_separator) = bytes.split_last().unwrap();
        assert!(PartiallySignedTransaction::deserialize(without_separator).is_ok());

        for len in 5..bytes.len() - 1 {
            assert!(
                PartiallySignedTransaction::deserialize(&bytes[..len]).is_err(),
                "prefix of {} bytes decoded",
                len
            );
        }
    }

    #[test]
    fn test_missing_output_maps() {
        let psbt = sample_psbt();
        let bytes = psbt.serialize().unwrap();
        // drop the single (non-empty) output map entirely
        let mut output_bytes = Vec::new();
        psbt.outputs[0].encode(&mut output_bytes);
        let truncated = &bytes[..bytes.len() - output_bytes.len()];
        assert!(matches!(
            PartiallySignedTransaction::deserialize(truncated),
            Err(Error::OutputCountMismatch {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_non_empty_script_sig_rejected() {
        let mut tx = unsigned_tx(1, ScriptBuf::new());
        tx.input[0].script_sig = ScriptBuf::from_bytes(vec![0x51]);
        assert!(matches!(
            PartiallySignedTransaction::from_unsigned_tx(tx.clone()),
            Err(Error::NonEmptyScriptSig)
        ));

        let mut bytes = PSBT_MAGIC_BYTES.to_vec();
        serialize_to_vector(&mut bytes, &[PSBT_GLOBAL_UNSIGNED_TX]);
        serialize_to_vector(&mut bytes, &encode_transaction(&tx));
        bytes.push(PSBT_SEPARATOR);
        assert!(matches!(
            PartiallySignedTransaction::deserialize(&bytes),
            Err(Error::NonEmptyScriptSig)
        ));
    }

    #[test]
    fn test_insane_input_rejected() {
        let mut psbt = with_partial_sig(1, 0x01);
        psbt.inputs[0].final_script_sig = ScriptBuf::from_bytes(vec![0x00]);
        assert!(!psbt.is_sane());

        // the encoder drops partial state of finalized inputs, so splice the
        // records in by hand
        let mut bytes = PSBT_MAGIC_BYTES.to_vec();
        serialize_to_vector(&mut bytes, &[PSBT_GLOBAL_UNSIGNED_TX]);
        serialize_to_vector(&mut bytes, &encode_transaction(psbt.tx.as_ref().unwrap()));
        bytes.push(PSBT_SEPARATOR);
        serialize_to_vector(&mut bytes, &[PSBT_IN_SIGHASH]);
        serialize_to_vector(&mut bytes, &0x41u32.to_le_bytes());
        serialize_to_vector(&mut bytes, &[PSBT_IN_SCRIPTSIG]);
        serialize_to_vector(&mut bytes, &[0x00]);
        bytes.push(PSBT_SEPARATOR);
        bytes.push(PSBT_SEPARATOR);
        bytes.push(PSBT_SEPARATOR);
        assert!(matches!(
            PartiallySignedTransaction::deserialize(&bytes),
            Err(Error::NotSane)
        ));
    }

    #[test]
    fn test_extract_requires_all_inputs_final() {
        let mut psbt = sample_psbt();
        psbt.inputs[0] = PsbtInput {
            utxo: psbt.inputs[0].utxo.clone(),
            final_script_sig: ScriptBuf::from_bytes(vec![0x00, 0x51]),
            ..Default::default()
        };
        assert!(!psbt.is_complete());
        assert!(matches!(
            extract_final_transaction(&psbt),
            Err(Error::NotFinalized(1))
        ));

        psbt.inputs[1].final_script_sig = ScriptBuf::from_bytes(vec![0x51]);
        assert!(psbt.is_complete());
        let tx = psbt.extract_final_transaction().unwrap();
        assert_eq!(tx.input[0].script_sig.as_bytes(), &[0x00, 0x51]);
        assert_eq!(tx.input[1].script_sig.as_bytes(), &[0x51]);
        assert_eq!(psbt.unsigned_txid(), Some(psbt.tx.as_ref().unwrap().compute_txid()));
    }

    #[test]
    fn test_input_count_mismatch() {
        let mut psbt = sample_psbt();
        psbt.inputs.truncate(1);
        psbt.inputs[0].final_script_sig = ScriptBuf::from_bytes(vec![0x51]);
        let mismatch = |result: Result<_, Error>| {
            matches!(
                result,
                Err(Error::InputCountMismatch {
                    expected: 2,
                    actual: 1
                })
            )
        };

        assert!(!psbt.is_complete());
        assert!(mismatch(psbt.extract_final_transaction().map(|_| ())));
        assert!(mismatch(psbt.serialize().map(|_| ())));

        let mut whole = sample_psbt();
        let before = whole.clone();
        assert!(mismatch(whole.merge(&psbt)));
        assert_same_state(&whole, &before);
        assert!(mismatch(psbt.clone().merge(&before)));
    }

    #[test]
    fn test_output_count_mismatch() {
        let mut psbt = sample_psbt();
        psbt.outputs.push(PsbtOutput::default());
        let mismatch = |result: Result<_, Error>| {
            matches!(
                result,
                Err(Error::OutputCountMismatch {
                    expected: 1,
                    actual: 2
                })
            )
        };

        assert!(mismatch(psbt.serialize().map(|_| ())));
        assert!(mismatch(sample_psbt().merge(&psbt)));

        for input in &mut psbt.inputs {
            input.final_script_sig = ScriptBuf::from_bytes(vec![0x51]);
        }
        assert!(!psbt.is_complete());
        assert!(mismatch(psbt.extract_final_transaction().map(|_| ())));
    }

    #[test]
    fn test_combine_empty_list() {
        assert!(matches!(combine_psbts(&[]), Err(Error::NoPsbts)));
    }

    #[test]
    fn test_is_null() {
        assert!(PartiallySignedTransaction::default().is_null());
        assert!(!sample_psbt().is_null());
    }
}
