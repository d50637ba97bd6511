use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

use wasm_psbt::bitcoin::{NetworkKind, PrivateKey, ScriptBuf};
use wasm_psbt::psbt::fill_psbt;
use wasm_psbt::{FlatSigningProvider, SigHashType};

use super::{load_psbt, print_psbt, OutputFormat};

pub fn build_provider(keys: &[String], scripts: &[String]) -> Result<FlatSigningProvider> {
    let mut provider = FlatSigningProvider::new();
    for key in keys {
        let bytes = hex::decode(key).context("Invalid hex for private key")?;
        let key = PrivateKey::from_slice(&bytes, NetworkKind::Main).context("Invalid private key")?;
        provider.add_key(key);
    }
    for script in scripts {
        let bytes = hex::decode(script).context("Invalid hex for redeem script")?;
        provider.add_script(ScriptBuf::from_bytes(bytes));
    }
    Ok(provider)
}

pub fn handle_sign_command(
    path: PathBuf,
    keys: &[String],
    scripts: &[String],
    sighash: &str,
    sign: bool,
    format: OutputFormat,
) -> Result<()> {
    let sighash = SigHashType::from_str(sighash)
        .map_err(|e| anyhow::anyhow!("Invalid sighash type {}: {}", sighash, e))?;
    let provider = build_provider(keys, scripts)?;

    let mut psbt = load_psbt(&path)?;
    let complete = fill_psbt(&provider, &mut psbt, sighash, sign, true)?;
    log::info!("signed with {} keys, complete: {}", keys.len(), complete);

    print_psbt(&psbt, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider() {
        let keys = vec!["01".repeat(32)];
        let scripts = vec!["51".to_string()];
        let provider = build_provider(&keys, &scripts).unwrap();
        assert_eq!(provider.keys.len(), 1);
        assert_eq!(provider.scripts.len(), 1);

        assert!(build_provider(&["zz".to_string()], &[]).is_err());
        assert!(build_provider(&["00".repeat(32)], &[]).is_err());
    }
}
