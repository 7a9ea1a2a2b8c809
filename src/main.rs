//! Tier Engine CLI
//!
//! Replays snapshot, allocation and tally decisions from JSON inputs.
//! Every command is a pure recomputation; nothing is persisted.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tier_engine::{
    create_snapshot, distribute_with_report, export_snapshot, import_snapshot, import_votes,
    tally_milestone_votes, verify_tier_proof, ApprovalThreshold, DuplicateWalletPolicy,
    EngineConfig, PresaleAllocationConfig, StakeRecord, Timestamp, TokenAmount,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tier-engine", version, about = "Tiered allocation and governance engine")]
struct Args {
    /// Engine config (JSON). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a tier snapshot from staking records
    Snapshot {
        #[arg(long)]
        presale: String,

        /// JSON array of {wallet, staked_amount, stake_timestamp}
        #[arg(long)]
        stakers: PathBuf,

        /// Snapshot time in ms (default: now)
        #[arg(long)]
        at: Option<Timestamp>,
    },

    /// Verify one participant's Merkle proof against a snapshot root
    Verify {
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        wallet: String,
    },

    /// Distribute the sale pool across snapshot participants
    Allocate {
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        pool: TokenAmount,

        #[arg(long)]
        base_unit: TokenAmount,

        #[arg(long)]
        max_per_wallet: TokenAmount,

        /// Fail if a wallet appears under more than one tier
        #[arg(long)]
        reject_duplicates: bool,
    },

    /// Tally milestone votes against a snapshot
    Tally {
        #[arg(long)]
        snapshot: PathBuf,

        /// JSON array of milestone votes
        #[arg(long)]
        votes: PathBuf,

        #[arg(long)]
        milestone: String,

        /// Override the configured approval threshold (bps)
        #[arg(long)]
        threshold_bps: Option<u32>,
    },
}

fn load_snapshot(path: &Path) -> Result<tier_engine::TierSnapshot, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)?;
    Ok(import_snapshot(&data)?)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match args.command {
        Command::Snapshot { presale, stakers, at } => {
            let data = std::fs::read_to_string(&stakers)?;
            let records: Vec<StakeRecord> = serde_json::from_str(&data)?;
            let at = at
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as Timestamp);
            let snapshot = create_snapshot(&presale, &records, at, &config)?;
            info!("Snapshot {} root {}", presale, snapshot.root_hex());
            println!("{}", export_snapshot(&snapshot)?);
        }

        Command::Verify { snapshot, wallet } => {
            let snapshot = load_snapshot(&snapshot)?;
            let participant = snapshot
                .participant(&wallet)
                .ok_or_else(|| format!("wallet {} not in snapshot", wallet))?;
            let valid = verify_tier_proof(
                &participant.wallet,
                participant.staked_amount,
                participant.tier,
                participant.stake_timestamp,
                &participant.snapshot_proof,
                &snapshot.merkle_root,
            );
            let verdict = if valid { "VALID" } else { "INVALID" };
            println!("{} {} {}", participant.wallet, participant.tier, verdict);
            if !valid {
                return Err("proof verification failed".into());
            }
        }

        Command::Allocate { snapshot, pool, base_unit, max_per_wallet, reject_duplicates } => {
            let snapshot = load_snapshot(&snapshot)?;
            let policy = if reject_duplicates {
                DuplicateWalletPolicy::Reject
            } else {
                DuplicateWalletPolicy::LastWriterWins
            };
            let alloc_config = PresaleAllocationConfig::new(pool, base_unit, max_per_wallet)
                .with_duplicate_policy(policy)
                .with_participant_limit(config.max_participants);
            let requests = snapshot.allocation_requests();
            let outcome = distribute_with_report(&requests, &alloc_config, &config.tiers)?;
            info!(
                "Allocated {} of {} to {} wallets ({} unallocated)",
                outcome.total_distributed(),
                pool,
                outcome.results.len(),
                outcome.unallocated
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Tally { snapshot, votes, milestone, threshold_bps } => {
            let snapshot = load_snapshot(&snapshot)?;
            let votes = import_votes(&std::fs::read_to_string(&votes)?)?;
            let threshold_bps = threshold_bps.unwrap_or(config.approval_threshold_bps);
            let threshold = ApprovalThreshold::from_bps(threshold_bps)?;
            let tally = tally_milestone_votes(&milestone, &votes, &snapshot, threshold);
            println!("{}", serde_json::to_string_pretty(&tally)?);
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tier_engine=info".parse().unwrap()),
        )
        .init();

    if let Err(e) = run(Args::parse()) {
        error!("{}", e);
        std::process::exit(1);
    }
}
