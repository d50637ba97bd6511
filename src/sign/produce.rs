use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::bitcoin::hashes::Hash;
use crate::bitcoin::script::{Builder, PushBytes};
use crate::bitcoin::blockdata::opcodes::all::OP_PUSHBYTES_0;
use crate::bitcoin::blockdata::opcodes::Opcode;
use crate::bitcoin::{
    Amount, PubkeyHash, PublicKey, Script, ScriptBuf, ScriptHash, Transaction, TxIn, TxOut,
};
use crate::bitcoin::secp256k1::Secp256k1;
use crate::provider::{key_id, script_id, SigningProvider};
use crate::sighash::SigHashType;

use super::creator::{
    SignatureChecker, SignatureCreator, TransactionSignatureChecker, TransactionSignatureCreator,
    DUMMY_SIGNATURE_CREATOR,
};
use super::interpreter::{push_only_stack, verify_script_sig};
use super::signature_data::{SigPair, SignatureData};
use super::solver::{solve, TxoutType};
use super::SignError;

fn lookup_script(
    provider: &dyn SigningProvider,
    sigdata: &SignatureData,
    id: &ScriptHash,
) -> Option<ScriptBuf> {
    if let Some(script) = provider.get_script(id) {
        return Some(script);
    }
    if script_id(&sigdata.redeem_script) == *id {
        return Some(sigdata.redeem_script.clone());
    }
    None
}

/// Resolves a public key from signing progress first, then the provider.
///
/// Keys found through the provider are remembered in `misc_pubkeys` when
/// their origin is known.
fn lookup_pubkey(
    provider: &dyn SigningProvider,
    sigdata: &mut SignatureData,
    id: &PubkeyHash,
) -> Option<PublicKey> {
    if let Some((pubkey, _)) = sigdata.signatures.get(id) {
        return Some(*pubkey);
    }
    if let Some((pubkey, _)) = sigdata.misc_pubkeys.get(id) {
        return Some(*pubkey);
    }
    let pubkey = provider.get_pubkey(id)?;
    if let Some(origin) = provider.get_key_origin(id) {
        sigdata.misc_pubkeys.insert(*id, (pubkey, origin));
    }
    Some(pubkey)
}

/// Existing signature for `id`, or a fresh one from the creator
fn create_sig(
    creator: &dyn SignatureCreator,
    sigdata: &mut SignatureData,
    provider: &dyn SigningProvider,
    id: &PubkeyHash,
    known_pubkey: Option<PublicKey>,
    script_code: &Script,
) -> Option<Vec<u8>> {
    if let Some((_, sig)) = sigdata.signatures.get(id) {
        return Some(sig.clone());
    }
    let pubkey = lookup_pubkey(provider, sigdata, id).or(known_pubkey);
    let sig = creator.create_sig(provider, id, script_code)?;
    // a provider may hold only the private key
    let pubkey = pubkey.or_else(|| {
        provider
            .get_key(id)
            .map(|key| key.public_key(&Secp256k1::signing_only()))
            .filter(|pubkey| key_id(pubkey) == *id)
    });
    match pubkey {
        Some(pubkey) => {
            sigdata.signatures.insert(*id, (pubkey, sig.clone()));
        }
        None => log::debug!("no public key for {}, signature not recorded", id),
    }
    Some(sig)
}

struct Step {
    kind: TxoutType,
    solved: bool,
    stack: Vec<Vec<u8>>,
}

fn sign_step(
    provider: &dyn SigningProvider,
    creator: &dyn SignatureCreator,
    script_pubkey: &Script,
    sigdata: &mut SignatureData,
) -> Step {
    let kind = solve(script_pubkey);
    let mut stack = Vec::new();
    let solved = match &kind {
        TxoutType::NonStandard | TxoutType::NullData => false,
        TxoutType::PubKey(key) => {
            let id = PubkeyHash::hash(key);
            let known = PublicKey::from_slice(key).ok();
            match create_sig(creator, sigdata, provider, &id, known, script_pubkey) {
                Some(sig) => {
                    stack.push(sig);
                    true
                }
                None => false,
            }
        }
        TxoutType::PubKeyHash(id) => {
            match create_sig(creator, sigdata, provider, id, None, script_pubkey) {
                Some(sig) => match lookup_pubkey(provider, sigdata, id) {
                    Some(pubkey) => {
                        stack.push(sig);
                        stack.push(pubkey.to_bytes());
                        true
                    }
                    None => false,
                },
                None => false,
            }
        }
        TxoutType::ScriptHash(id) => match lookup_script(provider, sigdata, id) {
            Some(redeem_script) => {
                stack.push(redeem_script.into_bytes());
                true
            }
            None => false,
        },
        TxoutType::Multisig { required, keys } => {
            let mut sigs = Vec::with_capacity(*required);
            // every key gets a chance to sign, the first `required` in script order are used
            for key in keys {
                let id = PubkeyHash::hash(key);
                let known = PublicKey::from_slice(key).ok();
                if let Some(sig) = create_sig(creator, sigdata, provider, &id, known, script_pubkey)
                {
                    if sigs.len() < *required {
                        sigs.push(sig);
                    }
                }
            }
            let ok = sigs.len() == *required;
            stack.push(Vec::new());
            stack.extend(sigs);
            while stack.len() < required + 1 {
                stack.push(Vec::new());
            }
            ok
        }
    };
    Step {
        kind,
        solved,
        stack,
    }
}

/// Minimal pushes: empty as OP_0, 1..=16 as OP_N, everything else as data
fn push_all(values: &[Vec<u8>]) -> Option<ScriptBuf> {
    let mut builder = Builder::new();
    for value in values {
        builder = match value.as_slice() {
            [] => builder.push_opcode(OP_PUSHBYTES_0),
            [n @ 1..=16] => builder.push_opcode(Opcode::from(0x50 + n)),
            data => builder.push_slice(<&PushBytes>::try_from(data).ok()?),
        };
    }
    Some(builder.into_script())
}

/// Fills `sigdata` as far as the provider allows and reports whether the
/// resulting scriptSig spends `script_pubkey`.
pub fn produce_signature(
    provider: &dyn SigningProvider,
    creator: &dyn SignatureCreator,
    script_pubkey: &Script,
    sigdata: &mut SignatureData,
) -> bool {
    if sigdata.complete {
        return true;
    }

    let step = sign_step(provider, creator, script_pubkey, sigdata);
    let mut solved = step.solved;
    let mut stack = step.stack;

    if solved && matches!(step.kind, TxoutType::ScriptHash(_)) {
        let redeem_script = ScriptBuf::from_bytes(stack.remove(0));
        sigdata.redeem_script = redeem_script.clone();

        // a redeem script may not itself be P2SH
        let inner = sign_step(provider, creator, &redeem_script, sigdata);
        solved = inner.solved && !matches!(inner.kind, TxoutType::ScriptHash(_));
        log::trace!(
            "p2sh redeem script is {}, solved: {}",
            inner.kind.name(),
            solved
        );
        stack = inner.stack;
        stack.push(redeem_script.into_bytes());
    } else {
        log::trace!("{} script solved: {}", step.kind.name(), solved);
    }

    sigdata.script_sig = match push_all(&stack) {
        Some(script) => script,
        None => {
            solved = false;
            ScriptBuf::new()
        }
    };
    sigdata.complete =
        solved && verify_script_sig(&sigdata.script_sig, script_pubkey, creator.checker());
    sigdata.complete
}

/// Whether `script` could be spent given the public data in `provider`,
/// assuming every private key were available.
pub fn is_solvable(provider: &dyn SigningProvider, script: &Script) -> bool {
    let mut sigdata = SignatureData::new();
    produce_signature(provider, &DUMMY_SIGNATURE_CREATOR, script, &mut sigdata)
}

pub fn update_input(input: &mut TxIn, data: &SignatureData) {
    input.script_sig = data.script_sig.clone();
}

/// Signs input `input_index` of `tx`, which spends `amount` locked by
/// `script_pubkey`. The scriptSig is installed only once it is complete.
pub fn sign_transaction(
    provider: &dyn SigningProvider,
    tx: &mut Transaction,
    input_index: usize,
    amount: Amount,
    script_pubkey: &Script,
    sighash_type: SigHashType,
) -> Result<bool, SignError> {
    if input_index >= tx.input.len() {
        return Err(SignError::InputIndexOutOfRange {
            index: input_index,
            inputs: tx.input.len(),
        });
    }

    let mut sigdata = SignatureData::new();
    let complete = {
        let creator = TransactionSignatureCreator::new(tx, input_index, amount, sighash_type);
        produce_signature(provider, &creator, script_pubkey, &mut sigdata)
    };
    if complete {
        update_input(&mut tx.input[input_index], &sigdata);
    }
    log::debug!(
        "signed input {} with {}: complete={}",
        input_index,
        sighash_type,
        complete
    );
    Ok(complete)
}

/// Like [`sign_transaction`], taking the spent output from `prev_tx`
pub fn sign_transaction_from_prev(
    provider: &dyn SigningProvider,
    prev_tx: &Transaction,
    tx: &mut Transaction,
    input_index: usize,
    sighash_type: SigHashType,
) -> Result<bool, SignError> {
    let txin = tx.input.get(input_index).ok_or(SignError::InputIndexOutOfRange {
        index: input_index,
        inputs: tx.input.len(),
    })?;
    let vout = txin.previous_output.vout;
    let txout = prev_tx
        .output
        .get(vout as usize)
        .ok_or(SignError::PrevoutIndexOutOfRange {
            vout,
            outputs: prev_tx.output.len(),
        })?
        .clone();
    sign_transaction(
        provider,
        tx,
        input_index,
        txout.value,
        &txout.script_pubkey,
        sighash_type,
    )
}

/// Records every signature the inner checker accepts
struct SignatureExtractorChecker<'a> {
    checker: &'a dyn SignatureChecker,
    found: RefCell<BTreeMap<PubkeyHash, SigPair>>,
}

impl SignatureChecker for SignatureExtractorChecker<'_> {
    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> bool {
        if !self.checker.check_sig(sig, pubkey, script_code) {
            return false;
        }
        if let Ok(pubkey) = PublicKey::from_slice(pubkey) {
            self.found
                .borrow_mut()
                .entry(pubkey.pubkey_hash())
                .or_insert_with(|| (pubkey, sig.to_vec()));
        }
        true
    }
}

/// Recovers signing progress from the scriptSig already present in `tx`.
///
/// Valid signatures are collected; for P2SH the redeem script is taken from
/// the last push. Multisig signatures are matched to keys in script order.
pub fn data_from_transaction(
    tx: &Transaction,
    input_index: usize,
    txout: &TxOut,
) -> Result<SignatureData, SignError> {
    let txin = tx.input.get(input_index).ok_or(SignError::InputIndexOutOfRange {
        index: input_index,
        inputs: tx.input.len(),
    })?;
    let mut data = SignatureData::from_script_sig(txin.script_sig.clone());
    let mut stack = push_only_stack(&data.script_sig).unwrap_or_default();

    let tx_checker = TransactionSignatureChecker::new(tx, input_index, txout.value);
    let extractor = SignatureExtractorChecker {
        checker: &tx_checker,
        found: RefCell::new(BTreeMap::new()),
    };

    if verify_script_sig(&data.script_sig, &txout.script_pubkey, &extractor) {
        data.complete = true;
        data.signatures = extractor.found.into_inner();
        return Ok(data);
    }

    let mut kind = solve(&txout.script_pubkey);
    let mut next_script = txout.script_pubkey.clone();

    if matches!(kind, TxoutType::ScriptHash(_)) {
        if let Some(last) = stack.last().filter(|item| !item.is_empty()) {
            let redeem_script = ScriptBuf::from_bytes(last.clone());
            data.redeem_script = redeem_script.clone();
            kind = solve(&redeem_script);
            next_script = redeem_script;
            stack.pop();
        }
    }

    if let TxoutType::Multisig { keys, .. } = &kind {
        let mut last_success_key = 0;
        for sig in &stack {
            for (i, key) in keys.iter().enumerate().skip(last_success_key) {
                let known = extractor
                    .found
                    .borrow()
                    .contains_key(&PubkeyHash::hash(key));
                if known || extractor.check_sig(sig, key, &next_script) {
                    last_success_key = i + 1;
                    break;
                }
            }
        }
    }

    data.signatures = extractor.found.into_inner();
    Ok(data)
}
