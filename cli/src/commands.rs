//! Subcommand handlers.

use anyhow::Context;
use serde::Serialize;

use commitclub_crypto::hash_code;
use commitclub_engine::{ClubConfig, CommitClub, RetryOutcome, SettlementReport};
use commitclub_ledger::CommitmentParams;
use commitclub_store::{BalanceBook, BalanceStore, Commitment, Liability, Outcome};
use commitclub_store_lmdb::{
    check_integrity, LmdbBalanceStore, LmdbCommitmentStore, LmdbEnvironment, LmdbLiabilityStore,
};
use commitclub_types::Timestamp;
use commitclub_utils::format_duration;

use crate::{ClubCommand, Command};

type Club = CommitClub<LmdbCommitmentStore, LmdbLiabilityStore, BalanceBook<LmdbBalanceStore>>;

fn open(config: &ClubConfig) -> anyhow::Result<LmdbEnvironment> {
    LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())
        .with_context(|| format!("opening store at {}", config.data_dir.display()))
}

fn club(env: &LmdbEnvironment, config: &ClubConfig) -> Club {
    CommitClub::new(
        env.commitment_store(),
        env.liability_store(),
        BalanceBook::new(env.balance_store()),
    )
    .with_join_policy(config.join_policy)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(command: Command, config: &ClubConfig, now: Timestamp) -> anyhow::Result<()> {
    match command {
        Command::HashCode { code } => {
            println!("{}", hash_code(&code));
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::CheckIntegrity => {
            let env = open(config)?;
            let report = check_integrity(&env)?;
            println!(
                "checked {} commitments, {} liabilities",
                report.commitments_checked, report.liabilities_checked
            );
            if report.is_healthy() {
                println!("ok");
                return Ok(());
            }
            for error in &report.errors {
                println!("  {error}");
            }
            anyhow::bail!("{} integrity errors", report.errors.len())
        }
        Command::Balance { account } => {
            let env = open(config)?;
            println!("{}", env.balance_store().balance(&account)?);
            Ok(())
        }
        Command::Club(command) => {
            let env = open(config)?;
            let mut club = club(&env, config);
            run_club(&mut club, command, now)
        }
    }
}

fn run_club(club: &mut Club, command: ClubCommand, now: Timestamp) -> anyhow::Result<()> {
    match command {
        ClubCommand::Create {
            organizer,
            name,
            stake,
            min_check_ins,
            deadline,
            duration,
            code,
            code_hash,
        } => {
            let deadline = match (deadline, duration) {
                (Some(at), _) => Timestamp::new(at),
                (None, Some(secs)) => now.plus_secs(secs),
                (None, None) => anyhow::bail!("either --deadline or --duration is required"),
            };
            let code_hash = match (code, code_hash) {
                (Some(code), _) => hash_code(&code),
                (None, Some(hash)) => hash,
                (None, None) => anyhow::bail!("either --code or --code-hash is required"),
            };
            let id = club.create_commit(
                &organizer,
                CommitmentParams {
                    name,
                    stake_amount: stake,
                    min_check_ins,
                    deadline,
                    code_hash,
                },
                now,
            )?;
            println!("created commitment {id}");
        }
        ClubCommand::Join {
            id,
            account,
            deposit,
        } => {
            club.join_commit(id, &account, deposit, now)?;
            let c = club.get_commitment(id)?;
            println!("{account} joined {id}; pool is {}", c.total_staked);
        }
        ClubCommand::CheckIn { id, account, code } => {
            club.check_in(id, &account, &code, now)?;
            let c = club.get_commitment(id)?;
            println!(
                "{account} checked in to {id} ({}/{} check-ins)",
                c.attendees.len(),
                c.min_check_ins
            );
        }
        ClubCommand::Settle { id } => {
            let report = club.settle_commit(id, now)?;
            print_settlement(&report);
        }
        ClubCommand::Show { id } => print_json(&club.get_commitment(id)?)?,
        ClubCommand::List { offset, limit } => {
            for c in club.list_commitments(offset, limit)? {
                println!("{}", summary_line(&c, now));
            }
        }
        ClubCommand::Status { id } => {
            let c = club.get_commitment(id)?;
            println!("{}", summary_line(&c, now));
            if !c.settled && !c.deadline.has_passed(now) {
                println!(
                    "settles in {}",
                    format_duration(c.deadline.secs_until(now))
                );
            }
            let record = club.preview_settlement(id, now)?;
            for payment in &record.payouts {
                if c.settled {
                    println!(
                        "  {} to {} ({})",
                        payment.amount,
                        payment.account,
                        payment.status.as_str()
                    );
                } else {
                    println!("  projected {} to {}", payment.amount, payment.account);
                }
            }
        }
        ClubCommand::Liabilities { commit } => {
            let liabilities = match commit {
                Some(id) => club.liabilities_for(id)?,
                None => club.liabilities()?,
            };
            for l in &liabilities {
                print_liability(l);
            }
            if liabilities.is_empty() {
                println!("no outstanding liabilities");
            }
        }
        ClubCommand::Retry { id, account, all } => {
            let outcomes = if all {
                club.retry_all_liabilities(now)?
            } else {
                let (Some(id), Some(account)) = (id, account) else {
                    anyhow::bail!("retry needs a commitment id and --account, or --all");
                };
                vec![club.retry_liability(id, &account, now)?]
            };
            for outcome in &outcomes {
                let l = outcome.liability();
                match outcome {
                    RetryOutcome::Delivered(_) => {
                        println!("delivered {} to {} for {}", l.amount, l.account, l.commit_id)
                    }
                    RetryOutcome::StillOwed(_) => println!(
                        "still owed {} to {} for {} after {} attempts: {}",
                        l.amount, l.account, l.commit_id, l.attempts, l.reason
                    ),
                }
            }
        }
    }
    Ok(())
}

fn summary_line(c: &Commitment, now: Timestamp) -> String {
    format!(
        "{:>6}  {:<20}  {:<19}  stake {}  joiners {}  check-ins {}/{}  pool {}",
        c.id.to_string(),
        c.status(now).as_str(),
        c.name,
        c.stake_amount,
        c.joiners.len(),
        c.attendees.len(),
        c.min_check_ins,
        c.pool_balance()
    )
}

fn print_settlement(report: &SettlementReport) {
    let id = report.commit_id;
    match &report.record.outcome {
        Outcome::Split {
            share,
            remainder,
            remainder_to,
        } => {
            println!(
                "settled {id}: {} attendees split the pool, {share} each",
                report.record.attendee_count
            );
            if !remainder.is_zero() {
                println!("  remainder {remainder} to {remainder_to}");
            }
        }
        Outcome::Refund { per_joiner } => {
            println!("settled {id}: threshold missed, refunding {per_joiner} per joiner");
        }
    }
    for (account, amount) in &report.delivered {
        println!("  paid {amount} to {account}");
    }
    for l in &report.liabilities {
        print_liability(l);
    }
    if !report.unrecorded.is_empty() {
        println!(
            "  {} owed payouts were not queued for retry; run `retry --all` to restore them",
            report.unrecorded.len()
        );
    }
}

fn print_liability(l: &Liability) {
    println!(
        "  owed {} to {} for {} ({} attempts): {}",
        l.amount, l.account, l.commit_id, l.attempts, l.reason
    );
}
