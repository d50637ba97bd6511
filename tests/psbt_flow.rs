//! Multi-party signing through PSBTs, from creation to the final transaction

use wasm_psbt::bitcoin::hashes::Hash;
use wasm_psbt::bitcoin::locktime::absolute::LockTime;
use wasm_psbt::bitcoin::secp256k1::{Secp256k1, SecretKey};
use wasm_psbt::bitcoin::transaction::Version;
use wasm_psbt::bitcoin::{
    Amount, NetworkKind, OutPoint, PrivateKey, PublicKey, ScriptBuf, Sequence, Transaction, TxIn,
    TxOut, Txid, Witness,
};
use wasm_psbt::psbt::{combine_psbts, fill_psbt};
use wasm_psbt::sign::{
    build_multisig_script, build_p2pkh_script, build_p2sh_script, data_from_transaction,
    sign_transaction, verify_script_sig, TransactionSignatureChecker,
};
use wasm_psbt::{
    is_solvable, FlatSigningProvider, KeyOriginInfo, PartiallySignedTransaction, SigHashType,
};

fn key(n: u8) -> PrivateKey {
    PrivateKey::new(SecretKey::from_slice(&[n; 32]).unwrap(), NetworkKind::Main)
}

fn pubkey(n: u8) -> PublicKey {
    key(n).public_key(&Secp256k1::signing_only())
}

fn spending_tx(inputs: u32) -> Transaction {
    Transaction {
        version: Version(2),
        lock_time: LockTime::ZERO,
        input: (0..inputs)
            .map(|vout| TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([0x11; 32]),
                    vout,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            })
            .collect(),
        output: vec![TxOut {
            value: Amount::from_sat(49_000),
            script_pubkey: build_p2pkh_script(&pubkey(9)),
        }],
    }
}

fn signer(n: u8, redeem_script: &ScriptBuf) -> FlatSigningProvider {
    let mut provider = FlatSigningProvider::new();
    let pubkey = provider.add_key(key(n));
    provider.add_key_origin(pubkey, KeyOriginInfo::from_indices([n; 4], &[0x8000_0000, n as u32]));
    provider.add_script(redeem_script.clone());
    provider
}

fn assert_spends(tx: &Transaction, index: usize, prevout: &TxOut) {
    let checker = TransactionSignatureChecker::new(tx, index, prevout.value);
    assert!(verify_script_sig(
        &tx.input[index].script_sig,
        &prevout.script_pubkey,
        &checker
    ));
}

#[test]
fn two_of_two_multisig_across_two_signers() {
    let redeem_script = build_multisig_script(2, &[pubkey(1), pubkey(2)]);
    let prevout = TxOut {
        value: Amount::from_sat(50_000),
        script_pubkey: build_p2sh_script(&redeem_script),
    };

    let mut public_only = FlatSigningProvider::new();
    public_only.add_pubkey(pubkey(1));
    public_only.add_pubkey(pubkey(2));
    public_only.add_script(redeem_script.clone());
    assert!(is_solvable(&public_only, &prevout.script_pubkey));
    assert!(!is_solvable(&FlatSigningProvider::new(), &prevout.script_pubkey));

    let mut creator = PartiallySignedTransaction::from_unsigned_tx(spending_tx(1)).unwrap();
    creator.inputs[0].utxo = Some(prevout.clone());
    let shared = creator.to_base64().unwrap();

    // each party signs its own copy
    let mut copies = Vec::new();
    for n in [1, 2] {
        let mut psbt = PartiallySignedTransaction::from_base64(&shared).unwrap();
        let complete = fill_psbt(
            &signer(n, &redeem_script),
            &mut psbt,
            SigHashType::default(),
            true,
            true,
        )
        .unwrap();
        assert!(!complete);
        assert_eq!(psbt.inputs[0].partial_sigs.len(), 1);
        assert_eq!(psbt.inputs[0].redeem_script, redeem_script);
        copies.push(PartiallySignedTransaction::deserialize(&psbt.serialize().unwrap()).unwrap());
    }

    let mut combined = combine_psbts(&copies).unwrap();
    assert_eq!(combined.inputs[0].partial_sigs.len(), 2);
    assert_eq!(combined.inputs[0].hd_keypaths.len(), 2);
    assert!(!combined.is_complete());
    assert!(combined.extract_final_transaction().is_err());

    // any party can finalize once both signatures are present
    let complete = fill_psbt(
        &FlatSigningProvider::new(),
        &mut combined,
        SigHashType::default(),
        true,
        false,
    )
    .unwrap();
    assert!(complete);
    assert!(combined.is_sane());
    assert!(combined.inputs[0].partial_sigs.is_empty());

    let tx = combined.extract_final_transaction().unwrap();
    assert_spends(&tx, 0, &prevout);

    let recovered = data_from_transaction(&tx, 0, &prevout).unwrap();
    assert!(recovered.complete);
    assert_eq!(recovered.signatures.len(), 2);
}

#[test]
fn p2pkh_sign_and_verify() {
    let prevouts: Vec<TxOut> = [3, 4]
        .iter()
        .map(|&n| TxOut {
            value: Amount::from_sat(25_000),
            script_pubkey: build_p2pkh_script(&pubkey(n)),
        })
        .collect();

    let mut provider = FlatSigningProvider::new();
    provider.add_key(key(3));
    provider.add_key(key(4));

    let mut tx = spending_tx(2);
    let sighashes = [SigHashType::default(), SigHashType::from_u32(0x01)];
    for (index, (prevout, sighash)) in prevouts.iter().zip(sighashes).enumerate() {
        let complete = sign_transaction(
            &provider,
            &mut tx,
            index,
            prevout.value,
            &prevout.script_pubkey,
            sighash,
        )
        .unwrap();
        assert!(complete);
    }

    for (index, prevout) in prevouts.iter().enumerate() {
        assert_spends(&tx, index, prevout);
    }

    // the spent amount is committed to by forkid signatures only
    let wrong_amount = TxOut {
        value: Amount::from_sat(25_001),
        script_pubkey: prevouts[0].script_pubkey.clone(),
    };
    let checker = TransactionSignatureChecker::new(&tx, 0, wrong_amount.value);
    assert!(!verify_script_sig(
        &tx.input[0].script_sig,
        &wrong_amount.script_pubkey,
        &checker
    ));
}

#[test]
fn finalized_psbt_survives_merge_with_stale_copy() {
    let prevout = TxOut {
        value: Amount::from_sat(30_000),
        script_pubkey: build_p2pkh_script(&pubkey(5)),
    };
    let mut stale = PartiallySignedTransaction::from_unsigned_tx(spending_tx(1)).unwrap();
    stale.inputs[0].utxo = Some(prevout.clone());

    let mut signed = stale.clone();
    let mut provider = FlatSigningProvider::new();
    provider.add_key(key(5));
    assert!(fill_psbt(&provider, &mut signed, SigHashType::default(), true, false).unwrap());

    for merged in [
        stale.combine(&signed).unwrap(),
        signed.combine(&stale).unwrap(),
    ] {
        assert!(merged.is_complete());
        let tx = merged.extract_final_transaction().unwrap();
        assert_spends(&tx, 0, &prevout);
    }
}
