//! Evaluation of push-only scriptSigs against the standard templates.
//!
//! This is not a general script interpreter: only the shapes recognised by
//! [`solve`] can be satisfied, and the scriptSig must be push-only and leave
//! nothing behind on the stack.

use crate::bitcoin::blockdata::opcodes::all::{OP_PUSHNUM_1, OP_PUSHNUM_16, OP_PUSHNUM_NEG1};
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::script::Instruction;
use crate::bitcoin::{PubkeyHash, Script, ScriptHash};

use super::creator::SignatureChecker;
use super::solver::{solve, TxoutType};

/// Stack left by executing a push-only script, `None` if it contains other opcodes
pub fn push_only_stack(script: &Script) -> Option<Vec<Vec<u8>>> {
    let mut stack = Vec::new();
    for instruction in script.instructions() {
        match instruction.ok()? {
            Instruction::PushBytes(data) => stack.push(data.as_bytes().to_vec()),
            Instruction::Op(op) if op == OP_PUSHNUM_NEG1 => stack.push(vec![0x81]),
            Instruction::Op(op)
                if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) =>
            {
                stack.push(vec![op.to_u8() - OP_PUSHNUM_1.to_u8() + 1])
            }
            Instruction::Op(_) => return None,
        }
    }
    Some(stack)
}

/// Whether `script_sig` satisfies `script_pubkey` under `checker`
pub fn verify_script_sig(
    script_sig: &Script,
    script_pubkey: &Script,
    checker: &dyn SignatureChecker,
) -> bool {
    let Some(stack) = push_only_stack(script_sig) else {
        return false;
    };
    eval_template(&stack, script_pubkey, checker, true)
}

fn eval_template(
    stack: &[Vec<u8>],
    script_pubkey: &Script,
    checker: &dyn SignatureChecker,
    allow_p2sh: bool,
) -> bool {
    match solve(script_pubkey) {
        TxoutType::PubKey(pubkey) => match stack {
            [sig] => checker.check_sig(sig, &pubkey, script_pubkey),
            _ => false,
        },
        TxoutType::PubKeyHash(hash) => match stack {
            [sig, pubkey] => {
                PubkeyHash::hash(pubkey) == hash && checker.check_sig(sig, pubkey, script_pubkey)
            }
            _ => false,
        },
        TxoutType::ScriptHash(hash) if allow_p2sh => match stack.split_last() {
            Some((redeem, rest)) if ScriptHash::hash(redeem) == hash => {
                eval_template(rest, Script::from_bytes(redeem), checker, false)
            }
            _ => false,
        },
        TxoutType::Multisig { required, keys } => {
            // one extra element for the CHECKMULTISIG off-by-one, which must be empty
            match stack.split_first() {
                Some((dummy, sigs)) if dummy.is_empty() && sigs.len() == required => {
                    check_multisig(sigs, &keys, script_pubkey, checker)
                }
                _ => false,
            }
        }
        _ => false,
    }
}

/// Signatures must appear in the same relative order as their keys
fn check_multisig(
    sigs: &[Vec<u8>],
    keys: &[Vec<u8>],
    script_code: &Script,
    checker: &dyn SignatureChecker,
) -> bool {
    let mut isig = 0;
    let mut ikey = 0;
    while isig < sigs.len() {
        if sigs.len() - isig > keys.len() - ikey {
            return false;
        }
        if !sigs[isig].is_empty() && checker.check_sig(&sigs[isig], &keys[ikey], script_code) {
            isig += 1;
        }
        ikey += 1;
    }
    true
}
