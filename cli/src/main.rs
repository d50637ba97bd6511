use anyhow::Result;
use clap::{Parser, Subcommand};

mod format;
mod input;
mod psbt;
mod script;

#[derive(Parser)]
#[command(name = "wasm-psbt-cli")]
#[command(about = "Inspect, combine and sign forkid PSBTs", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// PSBT operations
    #[command(subcommand)]
    Psbt(psbt::PsbtCommand),
    /// Output script operations
    #[command(subcommand)]
    Script(script::ScriptCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match cli.command {
        Commands::Psbt(command) => psbt::handle_command(command),
        Commands::Script(command) => script::handle_command(command),
    }
}
