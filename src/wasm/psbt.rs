use std::str::FromStr;

use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsCast;

use crate::bitcoin::locktime::absolute::LockTime;
use crate::bitcoin::transaction::Version;
use crate::bitcoin::{
    Amount, NetworkKind, OutPoint, PrivateKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use crate::error::WasmPsbtError;
use crate::provider::FlatSigningProvider;
use crate::psbt::{fill_psbt, PartiallySignedTransaction, PsbtInput, PsbtOutput};
use crate::transaction::encode_transaction;

use super::signing_provider::{parse_sighash, WasmSigningProvider};

#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct WrapPsbt(PartiallySignedTransaction);

impl WrapPsbt {
    fn tx_mut(&mut self) -> Result<&mut Transaction, WasmPsbtError> {
        self.0
            .tx
            .as_mut()
            .ok_or_else(|| WasmPsbtError::new("PSBT has no unsigned transaction"))
    }
}

#[wasm_bindgen()]
impl WrapPsbt {
    /// Create an empty PSBT
    ///
    /// # Arguments
    /// * `version` - Transaction version (default: 2)
    /// * `lock_time` - Transaction lock time (default: 0)
    #[wasm_bindgen(constructor)]
    pub fn new(version: Option<i32>, lock_time: Option<u32>) -> WrapPsbt {
        let tx = Transaction {
            version: Version(version.unwrap_or(2)),
            lock_time: LockTime::from_consensus(lock_time.unwrap_or(0)),
            input: vec![],
            output: vec![],
        };
        WrapPsbt(PartiallySignedTransaction {
            tx: Some(tx),
            ..Default::default()
        })
    }

    pub fn deserialize(psbt: &[u8]) -> Result<WrapPsbt, WasmPsbtError> {
        Ok(WrapPsbt(PartiallySignedTransaction::deserialize(psbt)?))
    }

    pub fn serialize(&self) -> Result<Vec<u8>, WasmPsbtError> {
        Ok(self.0.serialize()?)
    }

    #[wasm_bindgen(js_name = fromBase64)]
    pub fn from_base64(psbt: &str) -> Result<WrapPsbt, WasmPsbtError> {
        Ok(WrapPsbt(PartiallySignedTransaction::from_base64(psbt)?))
    }

    #[wasm_bindgen(js_name = toBase64)]
    pub fn to_base64(&self) -> Result<String, WasmPsbtError> {
        Ok(self.0.to_base64()?)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn clone(&self) -> WrapPsbt {
        Clone::clone(self)
    }

    /// Add an input to the PSBT
    ///
    /// # Arguments
    /// * `txid` - Transaction ID (hex string, 32 bytes reversed)
    /// * `vout` - Output index being spent
    /// * `value` - Value in satoshis of the output being spent
    /// * `script` - The scriptPubKey of the output being spent
    /// * `sequence` - Sequence number (default: 0xFFFFFFFF)
    ///
    /// # Returns
    /// The index of the newly added input
    #[wasm_bindgen(js_name = addInput)]
    pub fn add_input(
        &mut self,
        txid: &str,
        vout: u32,
        value: u64,
        script: &[u8],
        sequence: Option<u32>,
    ) -> Result<usize, WasmPsbtError> {
        let txid = Txid::from_str(txid)
            .map_err(|e| WasmPsbtError::new(&format!("Invalid txid: {}", e)))?;

        self.tx_mut()?.input.push(TxIn {
            previous_output: OutPoint { txid, vout },
            script_sig: ScriptBuf::new(),
            sequence: Sequence(sequence.unwrap_or(0xFFFFFFFF)),
            witness: Witness::default(),
        });
        self.0.inputs.push(PsbtInput {
            utxo: Some(TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::from_bytes(script.to_vec()),
            }),
            ..Default::default()
        });

        Ok(self.0.inputs.len() - 1)
    }

    /// Add an output to the PSBT
    ///
    /// # Returns
    /// The index of the newly added output
    #[wasm_bindgen(js_name = addOutput)]
    pub fn add_output(&mut self, script: &[u8], value: u64) -> Result<usize, WasmPsbtError> {
        self.tx_mut()?.output.push(TxOut {
            value: Amount::from_sat(value),
            script_pubkey: ScriptBuf::from_bytes(script.to_vec()),
        });
        self.0.outputs.push(PsbtOutput::default());
        Ok(self.0.outputs.len() - 1)
    }

    /// Get the unsigned transaction bytes
    #[wasm_bindgen(js_name = getUnsignedTx)]
    pub fn get_unsigned_tx(&self) -> Result<Vec<u8>, WasmPsbtError> {
        self.0
            .tx
            .as_ref()
            .map(encode_transaction)
            .ok_or_else(|| WasmPsbtError::new("PSBT has no unsigned transaction"))
    }

    #[wasm_bindgen(js_name = unsignedTxid)]
    pub fn unsigned_txid(&self) -> Option<String> {
        self.0.unsigned_txid().map(|txid| txid.to_string())
    }

    /// Merge the signing state of another PSBT over the same transaction
    pub fn combine(&mut self, other: &WrapPsbt) -> Result<(), WasmPsbtError> {
        Ok(self.0.merge(&other.0)?)
    }

    /// Sign every input the provider has keys for
    ///
    /// # Returns
    /// `true` when every input is finalized
    pub fn sign(
        &mut self,
        provider: &WasmSigningProvider,
        sighash: Option<u32>,
    ) -> Result<bool, WasmPsbtError> {
        Ok(fill_psbt(
            &provider.0,
            &mut self.0,
            parse_sighash(sighash),
            true,
            true,
        )?)
    }

    /// Sign with raw private keys
    ///
    /// # Arguments
    /// * `keys` - Array of 32-byte private keys (Uint8Array)
    /// * `sighash` - Sighash type (default: ALL|FORKID)
    ///
    /// # Returns
    /// `true` when every input is finalized
    #[wasm_bindgen(js_name = signWithPrivateKeys)]
    pub fn sign_with_private_keys(
        &mut self,
        keys: js_sys::Array,
        sighash: Option<u32>,
    ) -> Result<bool, WasmPsbtError> {
        let mut provider = FlatSigningProvider::new();
        for value in keys.iter() {
            let bytes = value
                .dyn_into::<js_sys::Uint8Array>()
                .map_err(|_| WasmPsbtError::new("Private keys must be Uint8Array"))?
                .to_vec();
            let key = PrivateKey::from_slice(&bytes, NetworkKind::Main)
                .map_err(|_| WasmPsbtError::new("Invalid private key"))?;
            provider.add_key(key);
        }
        Ok(fill_psbt(
            &provider,
            &mut self.0,
            parse_sighash(sighash),
            true,
            false,
        )?)
    }

    /// Add redeem scripts and key origins without signing
    ///
    /// # Arguments
    /// * `bip32derivs` - Include key origins (default: true)
    pub fn update(
        &mut self,
        provider: &WasmSigningProvider,
        bip32derivs: Option<bool>,
    ) -> Result<(), WasmPsbtError> {
        fill_psbt(
            &provider.0,
            &mut self.0,
            parse_sighash(None),
            false,
            bip32derivs.unwrap_or(true),
        )?;
        Ok(())
    }

    #[wasm_bindgen(js_name = inputCount)]
    pub fn input_count(&self) -> usize {
        self.0.inputs.len()
    }

    #[wasm_bindgen(js_name = outputCount)]
    pub fn output_count(&self) -> usize {
        self.0.outputs.len()
    }

    #[wasm_bindgen(js_name = isComplete)]
    pub fn is_complete(&self) -> bool {
        self.0.is_complete()
    }

    /// Extract the signed transaction once every input is finalized
    #[wasm_bindgen(js_name = finalizedTx)]
    pub fn finalized_tx(&self) -> Result<Vec<u8>, WasmPsbtError> {
        let tx = self.0.extract_final_transaction()?;
        Ok(encode_transaction(&tx))
    }
}
