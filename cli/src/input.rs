//! Reading PSBTs and transactions from files or stdin

use anyhow::{Context, Result};
use base64::Engine;
use std::io::Read;
use std::path::Path;

/// Reads the whole file, or stdin when `path` is `-`
pub fn read_input_bytes(path: &Path, what: &str) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read {} from stdin", what))?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read {} from {}", what, path.display()))
}

/// Accepts hex, base64 or raw bytes
pub fn decode_input(raw: &[u8]) -> Result<Vec<u8>> {
    let Ok(text) = std::str::from_utf8(raw) else {
        return Ok(raw.to_vec());
    };
    let text = text.trim();
    if text.is_empty() {
        anyhow::bail!("Input is empty");
    }

    if text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(text).context("Invalid hex input");
    }
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(text) {
        return Ok(bytes);
    }
    Ok(raw.to_vec())
}
