//! Key/value record primitives shared by the PSBT maps.

use std::collections::BTreeMap;

use crate::bitcoin::consensus::encode::serialize;
use crate::bitcoin::consensus::Decodable;
use crate::bitcoin::{PublicKey, VarInt};
use crate::provider::KeyOriginInfo;

use super::error::{Error, Field};

pub const PSBT_MAGIC_BYTES: [u8; 5] = *b"psbt\xff";
pub const PSBT_SEPARATOR: u8 = 0x00;

pub const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;

pub const PSBT_IN_UTXO: u8 = 0x00;
pub const PSBT_IN_PARTIAL_SIG: u8 = 0x02;
pub const PSBT_IN_SIGHASH: u8 = 0x03;
pub const PSBT_IN_REDEEMSCRIPT: u8 = 0x04;
pub const PSBT_IN_BIP32_DERIVATION: u8 = 0x06;
pub const PSBT_IN_SCRIPTSIG: u8 = 0x07;

pub const PSBT_OUT_REDEEMSCRIPT: u8 = 0x00;
pub const PSBT_OUT_BIP32_DERIVATION: u8 = 0x02;

const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
const PUBLIC_KEY_SIZE: usize = 65;

pub(crate) fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    buf.extend_from_slice(&serialize(&VarInt(n)));
}

/// Writes `value` prefixed by its length as a compact size
pub(crate) fn serialize_to_vector(buf: &mut Vec<u8>, value: &[u8]) {
    write_compact_size(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

/// Reads a length prefix, decodes the value with `decode` straight from the
/// stream and checks that exactly the declared number of bytes was consumed.
pub(crate) fn deserialize_from_vector<T>(
    r: &mut &[u8],
    decode: impl FnOnce(&mut &[u8]) -> Result<T, Error>,
) -> Result<T, Error> {
    let expected = VarInt::consensus_decode(r)?.0;
    let before = r.len();
    let value = decode(r)?;
    let actual = (before - r.len()) as u64;
    if actual != expected {
        return Err(Error::SizeMismatch { expected, actual });
    }
    Ok(value)
}

/// Reads one length-prefixed byte string (record key or plain value)
pub(crate) fn read_bytes(r: &mut &[u8]) -> Result<Vec<u8>, Error> {
    Ok(Vec::<u8>::consensus_decode(r)?)
}

/// Fails unless the key is the bare type byte
pub(crate) fn expect_bare_key(key: &[u8], field: Field) -> Result<(), Error> {
    if key.len() != 1 {
        return Err(Error::InvalidKeyLength(field));
    }
    Ok(())
}

/// Parses the public key following the type byte of a record key
pub(crate) fn pubkey_from_key(key: &[u8], field: Field) -> Result<PublicKey, Error> {
    if key.len() != COMPRESSED_PUBLIC_KEY_SIZE + 1 && key.len() != PUBLIC_KEY_SIZE + 1 {
        return Err(Error::InvalidKeyLength(field));
    }
    PublicKey::from_slice(&key[1..]).map_err(|_| Error::InvalidPubkey)
}

pub(crate) fn decode_hd_keypath(
    r: &mut &[u8],
    key: &[u8],
    hd_keypaths: &mut BTreeMap<PublicKey, KeyOriginInfo>,
) -> Result<(), Error> {
    let pubkey = pubkey_from_key(key, Field::Bip32Derivation)?;
    if hd_keypaths.contains_key(&pubkey) {
        return Err(Error::DuplicateKey(Field::Bip32Derivation));
    }

    let value_len = VarInt::consensus_decode(r)?.0;
    if value_len % 4 != 0 || value_len == 0 {
        return Err(Error::InvalidKeypathLength(value_len));
    }

    let fingerprint: [u8; 4] = Decodable::consensus_decode(r)?;
    let mut path = Vec::new();
    for _ in 1..value_len / 4 {
        path.push(u32::consensus_decode(r)?);
    }

    hd_keypaths.insert(pubkey, KeyOriginInfo::from_indices(fingerprint, &path));
    Ok(())
}

/// Derivation records in serialized public key order
pub(crate) fn encode_hd_keypaths(
    buf: &mut Vec<u8>,
    hd_keypaths: &BTreeMap<PublicKey, KeyOriginInfo>,
    tag: u8,
) {
    let mut entries: Vec<(Vec<u8>, &KeyOriginInfo)> = hd_keypaths
        .iter()
        .map(|(pubkey, origin)| (pubkey.to_bytes(), origin))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (pubkey, origin) in entries {
        let mut key = vec![tag];
        key.extend_from_slice(&pubkey);
        serialize_to_vector(buf, &key);

        let indices = origin.indices();
        write_compact_size(buf, (indices.len() as u64 + 1) * 4);
        buf.extend_from_slice(origin.fingerprint.as_bytes());
        for index in indices {
            buf.extend_from_slice(&index.to_le_bytes());
        }
    }
}

pub(crate) fn encode_unknown(buf: &mut Vec<u8>, unknown: &BTreeMap<Vec<u8>, Vec<u8>>) {
    for (key, value) in unknown {
        serialize_to_vector(buf, key);
        serialize_to_vector(buf, value);
    }
}

pub(crate) fn decode_unknown(
    r: &mut &[u8],
    key: Vec<u8>,
    unknown: &mut BTreeMap<Vec<u8>, Vec<u8>>,
) -> Result<(), Error> {
    if unknown.contains_key(&key) {
        return Err(Error::DuplicateKey(Field::Unknown));
    }
    let value = read_bytes(r)?;
    unknown.insert(key, value);
    Ok(())
}

/// Union keeping entries already present
pub(crate) fn union<K: Ord + Clone, V: Clone>(into: &mut BTreeMap<K, V>, from: &BTreeMap<K, V>) {
    for (k, v) in from {
        into.entry(k.clone()).or_insert_with(|| v.clone());
    }
}
