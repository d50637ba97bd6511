use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

mod decode;
mod sign;

use crate::input::{decode_input, read_input_bytes};
use wasm_psbt::PartiallySignedTransaction;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Base64,
    Hex,
}

#[derive(Subcommand)]
pub enum PsbtCommand {
    /// Parse a PSBT file and display its contents
    Decode {
        /// Path to the PSBT file (use '-' to read from stdin)
        path: PathBuf,
        /// Print a JSON summary instead of a tree
        #[arg(long)]
        json: bool,
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Merge the signatures of several PSBTs over the same transaction
    Combine {
        /// PSBT files to merge
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Extract the signed transaction from a finalized PSBT (hex)
    Extract {
        /// Path to the PSBT file (use '-' to read from stdin)
        path: PathBuf,
    },
    /// Sign every input the given keys can sign
    Sign {
        /// Path to the PSBT file (use '-' to read from stdin)
        path: PathBuf,
        /// 32-byte private key as hex, may be repeated
        #[arg(long = "key", short)]
        keys: Vec<String>,
        /// Redeem script as hex, may be repeated
        #[arg(long = "script")]
        scripts: Vec<String>,
        /// Sighash type, e.g. ALL|FORKID or ALL|FORKID|ANYONECANPAY
        #[arg(long, default_value = "ALL|FORKID")]
        sighash: String,
        /// Only add public data, do not sign
        #[arg(long)]
        no_sign: bool,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

pub(crate) fn load_psbt(path: &std::path::Path) -> Result<PartiallySignedTransaction> {
    let raw_bytes = read_input_bytes(path, "PSBT")?;
    let bytes = decode_input(&raw_bytes)?;
    PartiallySignedTransaction::deserialize(&bytes)
        .map_err(|e| anyhow::anyhow!("Failed to parse PSBT from {}: {}", path.display(), e))
}

pub(crate) fn print_psbt(psbt: &PartiallySignedTransaction, format: OutputFormat) -> Result<()> {
    let bytes = psbt.serialize()?;
    match format {
        OutputFormat::Base64 => {
            use base64::Engine;
            println!("{}", base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        OutputFormat::Hex => println!("{}", hex::encode(bytes)),
    }
    Ok(())
}

pub fn handle_command(command: PsbtCommand) -> Result<()> {
    match command {
        PsbtCommand::Decode {
            path,
            json,
            no_color,
        } => decode::handle_decode_command(path, json, no_color),
        PsbtCommand::Combine { paths, format } => {
            let psbts = paths
                .iter()
                .map(|path| load_psbt(path))
                .collect::<Result<Vec<_>>>()?;
            let merged = wasm_psbt::psbt::combine_psbts(&psbts)?;
            log::info!("combined {} PSBTs", psbts.len());
            print_psbt(&merged, format)
        }
        PsbtCommand::Extract { path } => {
            let psbt = load_psbt(&path)?;
            let tx = psbt.extract_final_transaction()?;
            println!(
                "{}",
                hex::encode(wasm_psbt::transaction::encode_transaction(&tx))
            );
            Ok(())
        }
        PsbtCommand::Sign {
            path,
            keys,
            scripts,
            sighash,
            no_sign,
            format,
        } => sign::handle_sign_command(path, &keys, &scripts, &sighash, !no_sign, format),
    }
}
