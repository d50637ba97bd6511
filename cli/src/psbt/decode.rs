use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use wasm_psbt::psbt::{PsbtInput, PsbtOutput};
use wasm_psbt::sign::solve;
use wasm_psbt::{KeyOriginInfo, PartiallySignedTransaction};

use super::load_psbt;
use crate::format::{render_tree_with_scheme, ColorScheme, Node};

#[derive(Debug, Serialize)]
struct KeyPathSummary {
    pubkey: String,
    fingerprint: String,
    path: String,
}

#[derive(Debug, Serialize)]
struct InputSummary {
    prevout: String,
    value: Option<u64>,
    script_type: Option<&'static str>,
    sighash: Option<String>,
    partial_sigs: Vec<String>,
    redeem_script: Option<String>,
    final_script_sig: Option<String>,
    bip32_derivs: Vec<KeyPathSummary>,
    unknown: usize,
}

#[derive(Debug, Serialize)]
struct OutputSummary {
    value: u64,
    script_pubkey: String,
    script_type: &'static str,
    redeem_script: Option<String>,
    bip32_derivs: Vec<KeyPathSummary>,
}

#[derive(Debug, Serialize)]
struct PsbtSummary {
    txid: String,
    version: i32,
    locktime: u32,
    complete: bool,
    inputs: Vec<InputSummary>,
    outputs: Vec<OutputSummary>,
    unknown: usize,
}

fn non_empty_hex(bytes: &[u8]) -> Option<String> {
    (!bytes.is_empty()).then(|| hex::encode(bytes))
}

fn key_paths<'a>(
    paths: impl Iterator<Item = (&'a wasm_psbt::bitcoin::PublicKey, &'a KeyOriginInfo)>,
) -> Vec<KeyPathSummary> {
    paths
        .map(|(pubkey, origin)| KeyPathSummary {
            pubkey: pubkey.to_string(),
            fingerprint: origin.fingerprint.to_string(),
            path: if origin.path.is_master() {
                "m".to_string()
            } else {
                format!("m/{}", origin.path)
            },
        })
        .collect()
}

fn summarize_input(txin: &wasm_psbt::bitcoin::TxIn, input: &PsbtInput) -> InputSummary {
    InputSummary {
        prevout: txin.previous_output.to_string(),
        value: input.utxo.as_ref().map(|utxo| utxo.value.to_sat()),
        script_type: input
            .utxo
            .as_ref()
            .map(|utxo| solve(&utxo.script_pubkey).name()),
        sighash: input.sighash_type.map(|sighash| sighash.to_string()),
        partial_sigs: input
            .partial_sigs
            .values()
            .map(|(pubkey, _)| pubkey.to_string())
            .collect(),
        redeem_script: non_empty_hex(input.redeem_script.as_bytes()),
        final_script_sig: non_empty_hex(input.final_script_sig.as_bytes()),
        bip32_derivs: key_paths(input.hd_keypaths.iter()),
        unknown: input.unknown.len(),
    }
}

fn summarize_output(txout: &wasm_psbt::bitcoin::TxOut, output: &PsbtOutput) -> OutputSummary {
    OutputSummary {
        value: txout.value.to_sat(),
        script_pubkey: hex::encode(txout.script_pubkey.as_bytes()),
        script_type: solve(&txout.script_pubkey).name(),
        redeem_script: non_empty_hex(output.redeem_script.as_bytes()),
        bip32_derivs: key_paths(output.hd_keypaths.iter()),
    }
}

fn summarize(psbt: &PartiallySignedTransaction) -> Result<PsbtSummary> {
    let tx = psbt
        .tx
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("PSBT has no unsigned transaction"))?;
    Ok(PsbtSummary {
        txid: tx.compute_txid().to_string(),
        version: tx.version.0,
        locktime: tx.lock_time.to_consensus_u32(),
        complete: psbt.is_complete(),
        inputs: tx
            .input
            .iter()
            .zip(&psbt.inputs)
            .map(|(txin, input)| summarize_input(txin, input))
            .collect(),
        outputs: tx
            .output
            .iter()
            .zip(&psbt.outputs)
            .map(|(txout, output)| summarize_output(txout, output))
            .collect(),
        unknown: psbt.unknown.len(),
    })
}

fn key_path_nodes(node: &mut Node, paths: &[KeyPathSummary]) {
    for path in paths {
        node.add_child(Node::leaf(
            "bip32_deriv",
            format!("{} [{}]{}", path.pubkey, path.fingerprint, &path.path[1..]),
        ));
    }
}

fn summary_tree(summary: &PsbtSummary, scheme: &ColorScheme) -> Node {
    let mut root = Node::new("psbt")
        .with_child(Node::leaf("txid", summary.txid.clone()))
        .with_child(Node::leaf("version", summary.version.to_string()))
        .with_child(Node::leaf("locktime", summary.locktime.to_string()))
        .with_child(Node::leaf(
            "complete",
            if summary.complete {
                "true".to_string()
            } else {
                scheme.warn("false")
            },
        ));

    for (i, input) in summary.inputs.iter().enumerate() {
        let mut node = Node::new(format!("input {}", i))
            .with_child(Node::leaf("prevout", input.prevout.clone()));
        match (input.value, input.script_type) {
            (Some(value), Some(script_type)) => {
                node.add_child(Node::leaf("value", value.to_string()));
                node.add_child(Node::leaf("script_type", script_type));
            }
            _ => node.add_child(Node::leaf("utxo", scheme.warn("missing"))),
        }
        if let Some(sighash) = &input.sighash {
            node.add_child(Node::leaf("sighash", sighash.clone()));
        }
        for pubkey in &input.partial_sigs {
            node.add_child(Node::leaf("partial_sig", pubkey.clone()));
        }
        if let Some(script) = &input.redeem_script {
            node.add_child(Node::leaf("redeem_script", script.clone()));
        }
        if let Some(script) = &input.final_script_sig {
            node.add_child(Node::leaf("final_script_sig", script.clone()));
        }
        key_path_nodes(&mut node, &input.bip32_derivs);
        root.add_child(node);
    }

    for (i, output) in summary.outputs.iter().enumerate() {
        let mut node = Node::new(format!("output {}", i))
            .with_child(Node::leaf("value", output.value.to_string()))
            .with_child(Node::leaf("script_pubkey", output.script_pubkey.clone()))
            .with_child(Node::leaf("script_type", output.script_type));
        if let Some(script) = &output.redeem_script {
            node.add_child(Node::leaf("redeem_script", script.clone()));
        }
        key_path_nodes(&mut node, &output.bip32_derivs);
        root.add_child(node);
    }
    root
}

pub fn handle_decode_command(path: PathBuf, json: bool, no_color: bool) -> Result<()> {
    let psbt = load_psbt(&path)?;
    let summary = summarize(&psbt)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let color_scheme = if no_color {
        ColorScheme::no_color()
    } else {
        ColorScheme::default()
    };
    render_tree_with_scheme(&summary_tree(&summary, &color_scheme), &color_scheme)
}
