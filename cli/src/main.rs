//! CommitClub command-line interface.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use commitclub_engine::{ClubConfig, JoinPolicy};
use commitclub_types::{AccountId, Amount, CodeHash, CommitId, Timestamp};

#[derive(Parser)]
#[command(name = "commitclub", about = "Stake on showing up: group commitments with check-ins and payouts")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; flags and env vars
    /// override them.
    #[arg(long, env = "COMMITCLUB_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "COMMITCLUB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// LMDB map size in megabytes.
    #[arg(long, env = "COMMITCLUB_MAP_SIZE_MB")]
    map_size_mb: Option<usize>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "COMMITCLUB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "COMMITCLUB_LOG_FORMAT")]
    log_format: Option<String>,

    /// Join policy: "until_settled" or "until_deadline".
    #[arg(long, env = "COMMITCLUB_JOIN_POLICY")]
    join_policy: Option<String>,

    /// Override the current time (unix seconds).
    #[arg(long, env = "COMMITCLUB_NOW")]
    now: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    #[command(flatten)]
    Club(ClubCommand),
    /// Show an account's credited balance.
    Balance { account: AccountId },
    /// Print the hash of a passphrase.
    HashCode { code: String },
    /// Check the store for inconsistencies.
    CheckIntegrity,
    /// Print the effective configuration as TOML.
    Config,
}

/// Subcommands that run against the commitment engine.
#[derive(clap::Subcommand)]
enum ClubCommand {
    /// Create a commitment.
    Create {
        #[arg(long)]
        organizer: AccountId,
        #[arg(long)]
        name: String,
        /// Stake every joiner must deposit, in tokens (e.g. "1.5").
        #[arg(long, value_parser = parse_amount)]
        stake: Amount,
        #[arg(long)]
        min_check_ins: u32,
        /// Absolute deadline in unix seconds.
        #[arg(long, conflicts_with = "duration", required_unless_present = "duration")]
        deadline: Option<u64>,
        /// Deadline relative to now, in seconds.
        #[arg(long)]
        duration: Option<u64>,
        /// Check-in passphrase; hashed before it is stored.
        #[arg(long, conflicts_with = "code_hash", required_unless_present = "code_hash")]
        code: Option<String>,
        /// Precomputed passphrase hash (64 hex characters).
        #[arg(long)]
        code_hash: Option<CodeHash>,
    },
    /// Join a commitment by depositing its stake.
    Join {
        id: CommitId,
        #[arg(long)]
        account: AccountId,
        #[arg(long, value_parser = parse_amount)]
        deposit: Amount,
    },
    /// Check in to a commitment with its passphrase.
    CheckIn {
        id: CommitId,
        #[arg(long)]
        account: AccountId,
        #[arg(long)]
        code: String,
    },
    /// Settle a commitment whose deadline has passed.
    Settle { id: CommitId },
    /// Show one commitment as JSON.
    Show { id: CommitId },
    /// List commitments.
    List {
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a commitment's lifecycle status and projected payouts.
    Status { id: CommitId },
    /// List outstanding liabilities.
    Liabilities {
        /// Only liabilities of this commitment.
        #[arg(long)]
        commit: Option<CommitId>,
    },
    /// Retry undelivered payouts.
    Retry {
        /// Commitment of the liability to retry; omit with --all.
        #[arg(required_unless_present = "all", requires = "account")]
        id: Option<CommitId>,
        #[arg(long)]
        account: Option<AccountId>,
        #[arg(long, conflicts_with_all = ["id", "account"])]
        all: bool,
    },
}

fn parse_amount(s: &str) -> Result<Amount, String> {
    Amount::parse_decimal(s).map_err(|e| e.to_string())
}

/// Merge the config file, if any, with flag and env overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<ClubConfig> {
    let mut config = match &cli.config {
        Some(path) => ClubConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClubConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(mb) = cli.map_size_mb {
        config.map_size_mb = mb;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(policy) = &cli.join_policy {
        config.join_policy = parse_join_policy(policy)?;
    }
    config.validate()?;
    Ok(config)
}

fn parse_join_policy(s: &str) -> anyhow::Result<JoinPolicy> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "until_settled" => Ok(JoinPolicy::UntilSettled),
        "until_deadline" => Ok(JoinPolicy::UntilDeadline),
        other => anyhow::bail!("unknown join policy {other:?}"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    commitclub_utils::init_tracing(
        &config.log_level,
        commitclub_utils::LogFormat::parse(&config.log_format),
    );

    let now = cli.now.map_or_else(Timestamp::now, Timestamp::new);
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        join_policy = config.join_policy.as_str(),
        %now,
        "configuration resolved"
    );
    commands::run(cli.command, &config, now)
}
