//! Output script templates.

use crate::bitcoin::blockdata::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160, OP_PUSHNUM_1,
    OP_PUSHNUM_16, OP_RETURN,
};
use crate::bitcoin::blockdata::opcodes::Opcode;
use crate::bitcoin::hashes::Hash;
use crate::bitcoin::script::{Builder, Instruction};
use crate::bitcoin::{PubkeyHash, PublicKey, Script, ScriptBuf, ScriptHash};

/// Recognised shape of an output script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxoutType {
    NonStandard,
    /// Raw serialized public key
    PubKey(Vec<u8>),
    PubKeyHash(PubkeyHash),
    ScriptHash(ScriptHash),
    /// `required` of the raw serialized `keys`, in script order
    Multisig { required: usize, keys: Vec<Vec<u8>> },
    NullData,
}

impl TxoutType {
    pub fn name(&self) -> &'static str {
        match self {
            TxoutType::NonStandard => "nonstandard",
            TxoutType::PubKey(_) => "pubkey",
            TxoutType::PubKeyHash(_) => "pubkeyhash",
            TxoutType::ScriptHash(_) => "scripthash",
            TxoutType::Multisig { .. } => "multisig",
            TxoutType::NullData => "nulldata",
        }
    }
}

/// Serialized public key sizes accepted in templates
pub(crate) fn is_valid_pubkey_size(data: &[u8]) -> bool {
    match data.first() {
        Some(0x02) | Some(0x03) => data.len() == 33,
        Some(0x04) | Some(0x06) | Some(0x07) => data.len() == 65,
        _ => false,
    }
}

fn small_int(op: Opcode) -> Option<usize> {
    let code = op.to_u8();
    if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&code) {
        Some((code - OP_PUSHNUM_1.to_u8() + 1) as usize)
    } else {
        None
    }
}

fn match_pay_to_pubkey(bytes: &[u8]) -> Option<Vec<u8>> {
    let (last, body) = bytes.split_last()?;
    if *last != OP_CHECKSIG.to_u8() {
        return None;
    }
    let (len, key) = body.split_first()?;
    if (bytes.len() == 35 && *len == 33 || bytes.len() == 67 && *len == 65)
        && is_valid_pubkey_size(key)
    {
        return Some(key.to_vec());
    }
    None
}

fn match_pay_to_pubkey_hash(bytes: &[u8]) -> Option<PubkeyHash> {
    if bytes.len() == 25
        && bytes[0] == OP_DUP.to_u8()
        && bytes[1] == OP_HASH160.to_u8()
        && bytes[2] == 20
        && bytes[23] == OP_EQUALVERIFY.to_u8()
        && bytes[24] == OP_CHECKSIG.to_u8()
    {
        let hash: [u8; 20] = bytes[3..23].try_into().ok()?;
        return Some(PubkeyHash::from_byte_array(hash));
    }
    None
}

fn match_pay_to_script_hash(bytes: &[u8]) -> Option<ScriptHash> {
    if bytes.len() == 23
        && bytes[0] == OP_HASH160.to_u8()
        && bytes[1] == 20
        && bytes[22] == OP_EQUAL.to_u8()
    {
        let hash: [u8; 20] = bytes[2..22].try_into().ok()?;
        return Some(ScriptHash::from_byte_array(hash));
    }
    None
}

fn match_multisig(script: &Script) -> Option<(usize, Vec<Vec<u8>>)> {
    if script.as_bytes().last() != Some(&OP_CHECKMULTISIG.to_u8()) {
        return None;
    }
    // non-minimal pushes do not match
    let instructions = script
        .instructions_minimal()
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let (first, rest) = instructions.split_first()?;
    let required = match first {
        Instruction::Op(op) => small_int(*op)?,
        _ => return None,
    };
    // rest = keys.., OP_n, OP_CHECKMULTISIG
    if rest.len() < 2 {
        return None;
    }
    let (key_pushes, tail) = rest.split_at(rest.len() - 2);
    let mut keys = Vec::with_capacity(key_pushes.len());
    for instruction in key_pushes {
        match instruction {
            Instruction::PushBytes(data) if is_valid_pubkey_size(data.as_bytes()) => {
                keys.push(data.as_bytes().to_vec())
            }
            _ => return None,
        }
    }
    let total = match tail[0] {
        Instruction::Op(op) => small_int(op)?,
        _ => return None,
    };
    if tail[1] != Instruction::Op(OP_CHECKMULTISIG) || keys.len() != total || total < required {
        return None;
    }
    Some((required, keys))
}

fn is_push_only(script: &Script) -> bool {
    script.instructions().all(|instruction| match instruction {
        Ok(Instruction::PushBytes(_)) => true,
        Ok(Instruction::Op(op)) => op.to_u8() <= OP_PUSHNUM_16.to_u8(),
        Err(_) => false,
    })
}

/// Classifies `script` into one of the signable templates
pub fn solve(script: &Script) -> TxoutType {
    let bytes = script.as_bytes();
    if let Some(hash) = match_pay_to_script_hash(bytes) {
        return TxoutType::ScriptHash(hash);
    }
    if bytes.first() == Some(&OP_RETURN.to_u8())
        && is_push_only(Script::from_bytes(&bytes[1..]))
    {
        return TxoutType::NullData;
    }
    if let Some(key) = match_pay_to_pubkey(bytes) {
        return TxoutType::PubKey(key);
    }
    if let Some(hash) = match_pay_to_pubkey_hash(bytes) {
        return TxoutType::PubKeyHash(hash);
    }
    if let Some((required, keys)) = match_multisig(script) {
        return TxoutType::Multisig { required, keys };
    }
    TxoutType::NonStandard
}

pub fn build_p2pk_script(pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_key(pubkey)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

pub fn build_p2pkh_script(pubkey: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&pubkey.pubkey_hash())
}

pub fn build_p2sh_script(redeem_script: &Script) -> ScriptBuf {
    ScriptBuf::new_p2sh(&crate::provider::script_id(redeem_script))
}

/// Bare `required`-of-`keys.len()` CHECKMULTISIG script, keys in the given order
pub fn build_multisig_script(required: usize, keys: &[PublicKey]) -> ScriptBuf {
    let mut builder = Builder::new().push_int(required as i64);
    for key in keys {
        builder = builder.push_key(key);
    }
    builder
        .push_int(keys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_pubkey;
    use rstest::rstest;

    #[test]
    fn test_solve_standard_templates() {
        let pubkey = test_pubkey(1);
        assert_eq!(
            solve(&build_p2pk_script(&pubkey)),
            TxoutType::PubKey(pubkey.to_bytes())
        );
        assert_eq!(
            solve(&build_p2pkh_script(&pubkey)),
            TxoutType::PubKeyHash(pubkey.pubkey_hash())
        );
        let redeem = build_p2pk_script(&pubkey);
        assert_eq!(
            solve(&build_p2sh_script(&redeem)),
            TxoutType::ScriptHash(crate::provider::script_id(&redeem))
        );
    }

    #[test]
    fn test_solve_multisig_keeps_key_order() {
        let keys = [test_pubkey(3), test_pubkey(1), test_pubkey(2)];
        let script = build_multisig_script(2, &keys);
        match solve(&script) {
            TxoutType::Multisig { required, keys: found } => {
                assert_eq!(required, 2);
                let expected: Vec<Vec<u8>> = keys.iter().map(|k| k.to_bytes()).collect();
                assert_eq!(found, expected);
            }
            other => panic!("expected multisig, got {:?}", other),
        }
    }

    #[rstest]
    #[case::empty("")]
    #[case::op_true("51")]
    #[case::truncated_push("4c05")]
    #[case::bad_key_prefix("21050000000000000000000000000000000000000000000000000000000000000000ac")]
    #[case::threshold_above_keys(
        "52210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179851ae"
    )]
    #[case::wrong_key_count(
        "51210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179852ae"
    )]
    fn test_solve_nonstandard(#[case] script_hex: &str) {
        let script = ScriptBuf::from_bytes(hex::decode(script_hex).unwrap());
        assert_eq!(solve(&script), TxoutType::NonStandard);
    }

    #[rstest]
    #[case::minimal_push(
        "51210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179851ae",
        true
    )]
    #[case::pushdata1_key(
        "514c210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179851ae",
        false
    )]
    fn test_solve_multisig_requires_minimal_pushes(
        #[case] script_hex: &str,
        #[case] matches: bool,
    ) {
        let script = ScriptBuf::from_bytes(hex::decode(script_hex).unwrap());
        assert_eq!(
            matches!(solve(&script), TxoutType::Multisig { required: 1, .. }),
            matches
        );
    }

    #[test]
    fn test_solve_null_data() {
        let script = ScriptBuf::from_bytes(hex::decode("6a0401020304").unwrap());
        assert_eq!(solve(&script), TxoutType::NullData);
        let script = ScriptBuf::from_bytes(hex::decode("6aac").unwrap());
        assert_eq!(solve(&script), TxoutType::NonStandard);
    }
}
