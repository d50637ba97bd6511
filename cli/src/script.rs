use anyhow::{Context, Result};
use clap::Subcommand;
use wasm_psbt::bitcoin::Script;
use wasm_psbt::sign::{build_p2sh_script, solve, TxoutType};

#[derive(Subcommand)]
pub enum ScriptCommand {
    /// Classify an output script (hex) against the standard templates
    Classify {
        /// Output script as hex
        script: String,
    },
    /// Wrap a redeem script (hex) into its P2SH output script
    P2sh {
        /// Redeem script as hex
        script: String,
    },
}

fn describe(kind: &TxoutType) -> String {
    match kind {
        TxoutType::PubKey(key) => format!("{} {}", kind.name(), hex::encode(key)),
        TxoutType::PubKeyHash(hash) => format!("{} {}", kind.name(), hash),
        TxoutType::ScriptHash(hash) => format!("{} {}", kind.name(), hash),
        TxoutType::Multisig { required, keys } => {
            format!("{} {}-of-{}", kind.name(), required, keys.len())
        }
        TxoutType::NonStandard | TxoutType::NullData => kind.name().to_string(),
    }
}

pub fn handle_command(command: ScriptCommand) -> Result<()> {
    match command {
        ScriptCommand::Classify { script } => {
            let bytes = hex::decode(&script).context("Invalid hex string for output script")?;
            println!("{}", describe(&solve(Script::from_bytes(&bytes))));
            Ok(())
        }
        ScriptCommand::P2sh { script } => {
            let bytes = hex::decode(&script).context("Invalid hex string for redeem script")?;
            let output = build_p2sh_script(Script::from_bytes(&bytes));
            println!("{}", hex::encode(output.as_bytes()));
            Ok(())
        }
    }
}
