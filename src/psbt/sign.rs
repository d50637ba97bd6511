use crate::bitcoin::Transaction;
use crate::provider::{script_id, HidingSigningProvider, SigningProvider};
use crate::sighash::SigHashType;
use crate::sign::{
    produce_signature, solve, SignError, SignatureData, TransactionSignatureCreator, TxoutType,
};

use super::{PartiallySignedTransaction, PsbtInput};

/// Adds whatever signatures `provider` can make to one PSBT input.
///
/// Returns whether the input is now finalized. An input that already carries
/// a final scriptSig is left alone.
pub fn sign_psbt_input(
    provider: &dyn SigningProvider,
    tx: &Transaction,
    input: &mut PsbtInput,
    index: usize,
    sighash_type: SigHashType,
) -> Result<bool, SignError> {
    if input.is_finalized() {
        return Ok(true);
    }
    if index >= tx.input.len() {
        return Err(SignError::InputIndexOutOfRange {
            index,
            inputs: tx.input.len(),
        });
    }
    let utxo = input
        .utxo
        .clone()
        .ok_or(SignError::MissingUtxo { index })?;

    if let Some(psbt) = input.sighash_type {
        if psbt != sighash_type {
            return Err(SignError::SighashMismatch {
                index,
                psbt,
                requested: sighash_type,
            });
        }
    }
    if !input.redeem_script.is_empty() {
        if let TxoutType::ScriptHash(hash) = solve(&utxo.script_pubkey) {
            if script_id(&input.redeem_script) != hash {
                return Err(SignError::RedeemScriptMismatch { index });
            }
        }
    }

    let mut sigdata = SignatureData::new();
    input.fill_signature_data(&mut sigdata);

    let creator = TransactionSignatureCreator::new(tx, index, utxo.value, sighash_type);
    let complete = produce_signature(provider, &creator, &utxo.script_pubkey, &mut sigdata);
    input.from_signature_data(&sigdata);

    log::debug!(
        "psbt input {}: {} signatures, complete={}",
        index,
        sigdata.signatures.len(),
        complete
    );
    Ok(complete)
}

/// Runs every input through `provider` and records redeem scripts and key
/// origins for the outputs.
///
/// With `sign` unset only public data is added. Key origins are withheld
/// unless `bip32derivs` is set. Returns whether every input is finalized.
pub fn fill_psbt(
    provider: &dyn SigningProvider,
    psbt: &mut PartiallySignedTransaction,
    sighash_type: SigHashType,
    sign: bool,
    bip32derivs: bool,
) -> Result<bool, SignError> {
    let PartiallySignedTransaction {
        tx,
        inputs,
        outputs,
        ..
    } = psbt;
    let tx = tx.as_ref().ok_or(SignError::MissingUnsignedTx)?;

    let input_provider = HidingSigningProvider::new(provider, !sign, !bip32derivs);
    let mut complete = true;
    for (index, input) in inputs.iter_mut().enumerate() {
        if input.utxo.is_none() && !input.is_finalized() {
            log::debug!("psbt input {}: spent output unknown, skipping", index);
            complete = false;
            continue;
        }
        // only a signing pass has to agree with the sighash recorded in the input
        let input_sighash = match input.sighash_type {
            Some(recorded) if !sign => recorded,
            _ => sighash_type,
        };
        complete &= sign_psbt_input(&input_provider, tx, input, index, input_sighash)?;
    }

    let output_provider = HidingSigningProvider::new(provider, true, !bip32derivs);
    for (output, txout) in outputs.iter_mut().zip(&tx.output) {
        let mut sigdata = SignatureData::new();
        output.fill_signature_data(&mut sigdata);

        let creator =
            TransactionSignatureCreator::new(tx, 0, txout.value, SigHashType::ALL_FORKID);
        produce_signature(&output_provider, &creator, &txout.script_pubkey, &mut sigdata);
        output.from_signature_data(&sigdata);
    }

    Ok(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::ScriptBuf;
    use crate::provider::{key_id, FlatSigningProvider, KeyOriginInfo};
    use crate::sign::{build_multisig_script, build_p2pkh_script, build_p2sh_script};
    use crate::test_utils::{prevout, test_key, test_pubkey, unsigned_tx};

    fn provider_with(keys: &[u8]) -> FlatSigningProvider {
        let mut provider = FlatSigningProvider::new();
        for &n in keys {
            let pubkey = provider.add_key(test_key(n));
            provider.add_key_origin(pubkey, KeyOriginInfo::from_indices([n; 4], &[n as u32]));
        }
        provider
    }

    fn p2pkh_psbt(owner: u8) -> PartiallySignedTransaction {
        let tx = unsigned_tx(1, build_p2pkh_script(&test_pubkey(9)));
        let mut psbt = PartiallySignedTransaction::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].utxo = Some(prevout(build_p2pkh_script(&test_pubkey(owner))));
        psbt
    }

    #[test]
    fn test_sign_p2pkh_input() {
        let mut psbt = p2pkh_psbt(1);
        let tx = psbt.tx.clone().unwrap();
        let complete = sign_psbt_input(
            &provider_with(&[1]),
            &tx,
            &mut psbt.inputs[0],
            0,
            SigHashType::default(),
        )
        .unwrap();
        assert!(complete);
        assert!(psbt.inputs[0].is_finalized());
        assert!(psbt.is_sane());

        // finalized inputs are not touched again, even with a different sighash
        let again = sign_psbt_input(
            &FlatSigningProvider::new(),
            &tx,
            &mut psbt.inputs[0],
            0,
            SigHashType::from_u32(0x42),
        )
        .unwrap();
        assert!(again);
    }

    #[test]
    fn test_sign_psbt_input_errors() {
        let provider = provider_with(&[1]);
        let mut psbt = p2pkh_psbt(1);
        let tx = psbt.tx.clone().unwrap();
        let sighash = SigHashType::default();

        let result = sign_psbt_input(&provider, &tx, &mut psbt.inputs[0], 3, sighash);
        assert_eq!(
            result,
            Err(SignError::InputIndexOutOfRange {
                index: 3,
                inputs: 1
            })
        );

        let mut no_utxo = PsbtInput::default();
        let result = sign_psbt_input(&provider, &tx, &mut no_utxo, 0, sighash);
        assert_eq!(result, Err(SignError::MissingUtxo { index: 0 }));

        psbt.inputs[0].sighash_type = Some(SigHashType::from_u32(0xc1));
        let result = sign_psbt_input(&provider, &tx, &mut psbt.inputs[0], 0, sighash);
        assert!(matches!(result, Err(SignError::SighashMismatch { index: 0, .. })));

        let redeem = build_multisig_script(1, &[test_pubkey(1)]);
        let mut p2sh = PsbtInput {
            utxo: Some(prevout(build_p2sh_script(&redeem))),
            redeem_script: build_multisig_script(1, &[test_pubkey(2)]),
            ..Default::default()
        };
        let result = sign_psbt_input(&provider, &tx, &mut p2sh, 0, sighash);
        assert_eq!(result, Err(SignError::RedeemScriptMismatch { index: 0 }));
    }

    #[test]
    fn test_partial_multisig_keeps_signature() {
        let redeem = build_multisig_script(2, &[test_pubkey(1), test_pubkey(2)]);
        let tx = unsigned_tx(1, ScriptBuf::new());
        let mut psbt = PartiallySignedTransaction::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].utxo = Some(prevout(build_p2sh_script(&redeem)));

        let mut provider = provider_with(&[1]);
        provider.add_script(redeem.clone());
        let complete = fill_psbt(&provider, &mut psbt, SigHashType::default(), true, true).unwrap();
        assert!(!complete);

        let input = &psbt.inputs[0];
        assert!(!input.is_finalized());
        assert_eq!(input.redeem_script, redeem);
        assert!(input.partial_sigs.contains_key(&key_id(&test_pubkey(1))));
        assert_eq!(input.partial_sigs.len(), 1);
        assert!(input.hd_keypaths.contains_key(&test_pubkey(1)));
    }

    #[test]
    fn test_fill_without_signing_adds_public_data_only() {
        let mut psbt = p2pkh_psbt(1);
        let provider = provider_with(&[1, 9]);
        let complete = fill_psbt(&provider, &mut psbt, SigHashType::default(), false, true).unwrap();
        assert!(!complete);
        assert!(psbt.inputs[0].partial_sigs.is_empty());
        assert!(!psbt.inputs[0].is_finalized());
        assert!(psbt.inputs[0].hd_keypaths.contains_key(&test_pubkey(1)));
        // the change output is recognised through its key origin
        assert!(psbt.outputs[0].hd_keypaths.contains_key(&test_pubkey(9)));

        let mut hidden = p2pkh_psbt(1);
        fill_psbt(&provider, &mut hidden, SigHashType::default(), false, false).unwrap();
        assert!(hidden.inputs[0].hd_keypaths.is_empty());
        assert!(hidden.outputs[0].hd_keypaths.is_empty());
    }

    #[test]
    fn test_fill_skips_unknown_inputs() {
        let tx = unsigned_tx(2, ScriptBuf::new());
        let mut psbt = PartiallySignedTransaction::from_unsigned_tx(tx).unwrap();
        psbt.inputs[1].utxo = Some(prevout(build_p2pkh_script(&test_pubkey(2))));

        let complete =
            fill_psbt(&provider_with(&[2]), &mut psbt, SigHashType::default(), true, false).unwrap();
        assert!(!complete);
        assert!(!psbt.inputs[0].is_finalized());
        assert!(psbt.inputs[1].is_finalized());
    }

    #[test]
    fn test_fill_requires_transaction() {
        let mut psbt = PartiallySignedTransaction::default();
        let result = fill_psbt(
            &FlatSigningProvider::new(),
            &mut psbt,
            SigHashType::default(),
            true,
            true,
        );
        assert_eq!(result, Err(SignError::MissingUnsignedTx));
    }
}
