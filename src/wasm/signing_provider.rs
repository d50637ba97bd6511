use std::str::FromStr;

use wasm_bindgen::prelude::wasm_bindgen;

use crate::bitcoin::bip32::DerivationPath;
use crate::bitcoin::{Amount, NetworkKind, PrivateKey, PublicKey, ScriptBuf};
use crate::error::WasmPsbtError;
use crate::provider::{FlatSigningProvider, KeyOriginInfo};
use crate::sighash::SigHashType;
use crate::sign::{is_solvable, sign_transaction};
use crate::transaction::{decode_transaction, encode_transaction};

/// Keys and scripts available to a signer
#[wasm_bindgen]
#[derive(Debug, Clone, Default)]
pub struct WasmSigningProvider(pub(crate) FlatSigningProvider);

pub(crate) fn parse_sighash(sighash: Option<u32>) -> SigHashType {
    sighash
        .map(SigHashType::from_u32)
        .unwrap_or_default()
}

#[wasm_bindgen]
impl WasmSigningProvider {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmSigningProvider {
        WasmSigningProvider::default()
    }

    /// Adds a raw 32-byte private key, returning its public key
    #[wasm_bindgen(js_name = addPrivateKey)]
    pub fn add_private_key(
        &mut self,
        prv: &[u8],
        compressed: Option<bool>,
    ) -> Result<Vec<u8>, WasmPsbtError> {
        let mut key = PrivateKey::from_slice(prv, NetworkKind::Main)
            .map_err(|_| WasmPsbtError::new("Invalid private key"))?;
        key.compressed = compressed.unwrap_or(true);
        Ok(self.0.add_key(key).to_bytes())
    }

    #[wasm_bindgen(js_name = addPublicKey)]
    pub fn add_public_key(&mut self, pubkey: &[u8]) -> Result<(), WasmPsbtError> {
        let pubkey = PublicKey::from_slice(pubkey)
            .map_err(|e| WasmPsbtError::new(&format!("Invalid public key: {}", e)))?;
        self.0.add_pubkey(pubkey);
        Ok(())
    }

    #[wasm_bindgen(js_name = addScript)]
    pub fn add_script(&mut self, script: &[u8]) {
        self.0.add_script(ScriptBuf::from_bytes(script.to_vec()));
    }

    /// Records where a key comes from
    ///
    /// # Arguments
    /// * `pubkey` - The public key
    /// * `fingerprint` - 4-byte master key fingerprint
    /// * `path` - Derivation path, e.g. `m/44'/145'/0'/0/1`
    #[wasm_bindgen(js_name = addKeyOrigin)]
    pub fn add_key_origin(
        &mut self,
        pubkey: &[u8],
        fingerprint: &[u8],
        path: &str,
    ) -> Result<(), WasmPsbtError> {
        let pubkey = PublicKey::from_slice(pubkey)
            .map_err(|e| WasmPsbtError::new(&format!("Invalid public key: {}", e)))?;
        let fingerprint: [u8; 4] = fingerprint
            .try_into()
            .map_err(|_| WasmPsbtError::new("Fingerprint must be 4 bytes"))?;
        let path = DerivationPath::from_str(path)
            .map_err(|e| WasmPsbtError::new(&format!("Invalid derivation path: {}", e)))?;
        self.0
            .add_key_origin(pubkey, KeyOriginInfo::new(fingerprint.into(), path));
        Ok(())
    }

    /// Generates and stores a fresh key, returning its public key
    #[wasm_bindgen(js_name = generateKey)]
    pub fn generate_key(&mut self, compressed: Option<bool>) -> Result<Vec<u8>, WasmPsbtError> {
        self.0
            .generate_key(compressed.unwrap_or(true))
            .map(|pubkey| pubkey.to_bytes())
            .map_err(|e| WasmPsbtError::new(&format!("Failed to generate key: {}", e)))
    }

    #[wasm_bindgen(js_name = isSolvable)]
    pub fn is_solvable(&self, script: &[u8]) -> bool {
        is_solvable(&self.0, ScriptBuf::from_bytes(script.to_vec()).as_script())
    }

    /// Signs one input of a serialized transaction.
    ///
    /// # Returns
    /// The transaction, with the new scriptSig installed when signing completed
    #[wasm_bindgen(js_name = signTransaction)]
    pub fn sign_transaction(
        &self,
        tx: &[u8],
        input_index: usize,
        value: u64,
        script_pubkey: &[u8],
        sighash: Option<u32>,
    ) -> Result<Vec<u8>, WasmPsbtError> {
        let mut tx = decode_transaction(tx)?;
        sign_transaction(
            &self.0,
            &mut tx,
            input_index,
            Amount::from_sat(value),
            ScriptBuf::from_bytes(script_pubkey.to_vec()).as_script(),
            parse_sighash(sighash),
        )?;
        Ok(encode_transaction(&tx))
    }
}
