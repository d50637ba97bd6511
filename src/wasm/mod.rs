mod psbt;
mod signing_provider;

use wasm_bindgen::prelude::wasm_bindgen;

pub use psbt::WrapPsbt;
pub use signing_provider::WasmSigningProvider;

/// Package version and the commit it was built from
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    format!(
        "{}+{}",
        env!("WASM_PSBT_VERSION"),
        env!("WASM_PSBT_GIT_HASH")
    )
}
