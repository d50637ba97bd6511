use core::fmt;
use wasm_bindgen::JsValue;

/// Error type surfaced across the wasm boundary
#[derive(Debug, Clone)]
pub struct WasmPsbtError {
    message: String,
}

impl WasmPsbtError {
    pub fn new(message: &str) -> Self {
        WasmPsbtError {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for WasmPsbtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WasmPsbtError {}

impl From<WasmPsbtError> for JsValue {
    fn from(err: WasmPsbtError) -> JsValue {
        JsValue::from_str(&err.message)
    }
}

impl From<crate::psbt::Error> for WasmPsbtError {
    fn from(err: crate::psbt::Error) -> Self {
        WasmPsbtError::new(&format!("PSBT error: {}", err))
    }
}

impl From<crate::sign::SignError> for WasmPsbtError {
    fn from(err: crate::sign::SignError) -> Self {
        WasmPsbtError::new(&format!("Signing error: {}", err))
    }
}

impl From<crate::transaction::DecodeTransactionError> for WasmPsbtError {
    fn from(err: crate::transaction::DecodeTransactionError) -> Self {
        WasmPsbtError::new(&err.to_string())
    }
}
