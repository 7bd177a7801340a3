#![forbid(unsafe_code)]
//! Drive the consensus set through a run of blocks and watch maintenance work.

use clap::{Parser, Subcommand};
use colored::*;
use trinity_maintenance::blockchain::{check_invariants, Block, ConsensusSet};
use trinity_maintenance::config::{load_config, Config};
use trinity_maintenance::crypto::{address_from_string, address_to_hex};
use trinity_maintenance::persistence::{Database, InMemoryPersistence, Persistence};
use trinity_maintenance::types::{Currency, FileContract, Output};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, default_value = "config.toml")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mines a run of blocks on top of the stored chain
    Simulate {
        /// Number of blocks to add
        #[arg(long, default_value_t = 30)]
        blocks: u64,
        /// Miner payout per block
        #[arg(long, default_value_t = 100)]
        payout: Currency,
        /// Form a file contract every N blocks (0 disables)
        #[arg(long, default_value_t = 5)]
        contract_every: u64,
        /// Length of each contract's proof window
        #[arg(long, default_value_t = 4)]
        contract_window: u64,
        /// Missed proof payout of each contract
        #[arg(long, default_value_t = 50)]
        penalty: Currency,
        /// Blocks to revert once the run is done
        #[arg(long, default_value_t = 0)]
        reorg: u64,
        /// Store block nodes in the configured SQLite database
        #[arg(long)]
        persist: bool,
    },
    /// Prints the consensus set stored in the configured database
    Inspect,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Simulate {
            blocks,
            payout,
            contract_every,
            contract_window,
            penalty,
            reorg,
            persist,
        } => {
            let persistence = open_persistence(&config, persist)?;
            let mut cs = ConsensusSet::load(config.consensus.clone(), persistence)?;
            simulate(&mut cs, blocks, payout, contract_every, contract_window, penalty)?;
            summarize(&cs);
            if reorg > 0 {
                revert(&mut cs, reorg)?;
                summarize(&cs);
            }
        }
        Commands::Inspect => {
            let persistence = open_persistence(&config, true)?;
            let cs = ConsensusSet::load(config.consensus.clone(), persistence)?;
            summarize(&cs);
        }
    }

    Ok(())
}

fn open_persistence(config: &Config, persist: bool) -> Result<Box<dyn Persistence>, Box<dyn std::error::Error>> {
    if !persist {
        return Ok(Box::new(InMemoryPersistence::new()));
    }
    let path = std::path::Path::new(&config.database.path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Box::new(Database::open(&config.database.path)?))
}

fn simulate(
    cs: &mut ConsensusSet,
    blocks: u64,
    payout: Currency,
    contract_every: u64,
    contract_window: u64,
    penalty: Currency,
) -> Result<(), Box<dyn std::error::Error>> {
    let miner = address_from_string("trinity-miner");
    let host = address_from_string("trinity-host");

    for _ in 0..blocks {
        let height = cs.height() + 1;
        let contracts = if contract_every > 0 && height % contract_every == 0 {
            vec![FileContract {
                window_start: height + 1,
                window_end: height + 1 + contract_window.max(1),
                payout: penalty,
                missed_proof_outputs: vec![Output::new(penalty, host)],
                unlock_hash: host,
                ..Default::default()
            }]
        } else {
            Vec::new()
        };
        let block = Block::new(height, cs.tip().block.id(), vec![Output::new(payout, miner)], contracts);
        let id = cs.accept_block(block)?;
        println!(
            "{} {:>6}  {}  {}",
            "⛏️  block".bright_green(),
            height,
            id.to_string()[..16].dimmed(),
            format!("{} diffs", cs.tip().diff_count()).cyan()
        );
    }
    Ok(())
}

fn revert(cs: &mut ConsensusSet, count: u64) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..count {
        let node = cs.revert_tip()?;
        println!("{} {:>6}", "↩️  reverted".yellow(), node.height);
    }
    check_invariants(cs.state(), cs.height(), cs.config.maturity_delay)?;
    println!("{}", "✅ Invariants hold after reorg".green().bold());
    Ok(())
}

fn summarize(cs: &ConsensusSet) {
    let state = cs.state();
    let miner = address_from_string("trinity-miner");
    let host = address_from_string("trinity-host");

    println!();
    println!("{}", "┌──────────────── CONSENSUS SET ────────────────┐".bright_cyan());
    println!("  height            {}", cs.height().to_string().bold());
    println!("  maturity delay    {}", cs.config.maturity_delay);
    println!("  matured outputs   {}", state.outputs.len());
    println!(
        "  delayed outputs   {} in {} buckets",
        state.delayed_output_count(),
        state.delayed_outputs.len()
    );
    println!("  file contracts    {}", state.file_contracts.len());
    for (name, addr) in [("miner", miner), ("host", host)] {
        println!(
            "  {:<6} {}…  spendable {}  pending {}",
            name,
            &address_to_hex(&addr)[..12],
            state.spendable_balance(&addr).to_string().green(),
            state.pending_balance(&addr).to_string().yellow()
        );
    }
    println!("{}", "└───────────────────────────────────────────────┘".bright_cyan());
}
