use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use rewind::config;
use rewind::domain::trace::parse_address;
use rewind::logging;
use rewind::modules::export::write_model;
use rewind::store::ProjectWriter;
use rewind::{ReplayPipeline, RewindError, RunOptions};

#[derive(Debug, Parser)]
#[command(
    name = "rewind",
    version,
    about = "Rewind: rebuild a replayable Foundry test from a transaction call trace"
)]
struct Args {
    /// Trace JSON file
    trace: PathBuf,

    /// Main actor address (defaults to the trace's sender)
    #[arg(long)]
    main: Option<String>,

    /// Chain name, alias or id (defaults to the trace's chain, then mainnet)
    #[arg(long)]
    chain: Option<String>,

    /// Fork block (defaults to the trace's block number)
    #[arg(long)]
    block: Option<u64>,

    /// Foundry project directory to write
    #[arg(long, default_value = "replay")]
    out: PathBuf,

    /// Print the test source instead of writing a project
    #[arg(long)]
    stdout: bool,

    /// Replace existing foundry.toml, remappings.txt, .env.example and README.md
    #[arg(long)]
    force: bool,

    /// Extra directory scanned for ABI artifacts (repeatable)
    #[arg(long = "abi-dir")]
    abi_dirs: Vec<PathBuf>,

    /// Node keys after a trigger that count as inside its callback
    #[arg(long)]
    window: Option<u64>,

    /// Never query signature registries, Sourcify or RPC
    #[arg(long)]
    offline: bool,

    /// Fetch verified ABIs from Sourcify for called contracts
    #[arg(long)]
    fetch_abis: bool,

    /// Also write the reconstructed call model as JSON
    #[arg(long)]
    model_json: Option<PathBuf>,

    /// Config file (defaults to REWIND_CONFIG or the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    let mut config = config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.offline {
        config.resolver.offline = true;
    }

    let main = args
        .main
        .as_deref()
        .map(|text| parse_address(text).ok_or_else(|| RewindError::InvalidAddress(text.to_string())))
        .transpose()?;

    let text = fs::read_to_string(&args.trace)
        .with_context(|| format!("Failed to read trace {}", args.trace.display()))?;

    let pipeline = ReplayPipeline::from_config(config)?;
    let options = RunOptions {
        main,
        chain: args.chain,
        block: args.block,
        window: args.window,
        abi_dirs: args.abi_dirs,
        fetch_abis: args.fetch_abis,
    };
    let output = pipeline
        .run_json(&text, &options)
        .await
        .with_context(|| format!("Failed to reconstruct replay from {}", args.trace.display()))?;

    if let Some(path) = &args.model_json {
        let calls = write_model(path, &output.model)?;
        info!(path = %path.display(), calls, "call model exported");
    }

    if args.stdout {
        print!("{}", output.source);
        return Ok(());
    }

    let files = ProjectWriter::new(&args.out).overwrite(args.force).write(&output)?;
    for file in files.iter().filter(|f| f.written) {
        eprintln!("wrote {}", file.path.display());
    }
    eprintln!("run: cd {} && forge test -vvvv", args.out.display());
    Ok(())
}
