//! LMDB database integrity checks.
//!
//! Run on startup (or on demand from the CLI) to detect corruption and ledger invariant
//! violations before any new operation is applied.

use std::collections::{BTreeMap, HashSet};

use commitclub_store::{Commitment, CommitmentStore, DeliveryStatus, LiabilityStore};
use commitclub_types::{AccountId, Amount, CommitId};

use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub commitments_checked: u64,
    pub liabilities_checked: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check every stored commitment and liability.
///
/// Besides each commitment's own invariants, every payment a settlement record marks
/// `Owed` must have a liability of the same amount and every liability must match such a
/// payment. A payment still `Pending` on a settled record has an unknown delivery outcome
/// and is reported for manual reconciliation.
///
/// Decoding failures and invariant violations are recorded in the report rather than
/// causing a hard error; only failure to open a read transaction is fatal.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let commitments = env.commitment_store();

    let next_id = commitments.next_commit_id()?;
    let count = commitments.commitment_count()?;
    let mut known_ids = HashSet::new();
    let mut owed: BTreeMap<(CommitId, AccountId), Amount> = BTreeMap::new();

    const PAGE: usize = 256;
    let mut offset = 0u64;
    while offset < count {
        let page = match commitments.iter_commitments(offset, PAGE) {
            Ok(page) => page,
            Err(e) => {
                report.errors.push(format!("failed to read commitments at {offset}: {e}"));
                break;
            }
        };
        if page.is_empty() {
            break;
        }
        for commitment in &page {
            report.commitments_checked += 1;
            known_ids.insert(commitment.id);
            if commitment.id >= next_id {
                report.errors.push(format!(
                    "commitment {} is not below next id {next_id}",
                    commitment.id
                ));
            }
            check_commitment(commitment, &mut report.errors);
            if let Some(record) = &commitment.settlement {
                for payment in &record.payouts {
                    if payment.status == DeliveryStatus::Owed {
                        owed.insert((commitment.id, payment.account.clone()), payment.amount);
                    }
                }
            }
        }
        offset += page.len() as u64;
    }

    match env.liability_store().iter_liabilities() {
        Ok(liabilities) => {
            for liability in liabilities {
                report.liabilities_checked += 1;
                if !known_ids.contains(&liability.commit_id) {
                    report.errors.push(format!(
                        "liability for {} references unknown commitment {}",
                        liability.account, liability.commit_id
                    ));
                    continue;
                }
                match owed.remove(&(liability.commit_id, liability.account.clone())) {
                    Some(amount) if amount == liability.amount => {}
                    Some(amount) => report.errors.push(format!(
                        "commitment {}: liability to {} is {} but the owed payout is {amount}",
                        liability.commit_id, liability.account, liability.amount
                    )),
                    None => report.errors.push(format!(
                        "commitment {}: liability to {} has no owed payout",
                        liability.commit_id, liability.account
                    )),
                }
            }
            for ((id, account), amount) in owed {
                report.errors.push(format!(
                    "commitment {id}: payout of {amount} to {account} is owed but has no liability"
                ));
            }
        }
        Err(e) => report.errors.push(format!("failed to read liabilities: {e}")),
    }

    if report.is_healthy() {
        tracing::debug!(
            commitments = report.commitments_checked,
            liabilities = report.liabilities_checked,
            "integrity check passed"
        );
    } else {
        tracing::warn!(errors = report.errors.len(), "integrity check found problems");
    }
    Ok(report)
}

fn check_commitment(c: &Commitment, errors: &mut Vec<String>) {
    let joiners: HashSet<_> = c.joiners.iter().collect();
    if joiners.len() != c.joiners.len() {
        errors.push(format!("commitment {}: duplicate joiner", c.id));
    }
    let attendees: HashSet<_> = c.attendees.iter().collect();
    if attendees.len() != c.attendees.len() {
        errors.push(format!("commitment {}: duplicate attendee", c.id));
    }
    if !attendees.is_subset(&joiners) {
        errors.push(format!("commitment {}: attendee who never joined", c.id));
    }
    match c.stake_amount.checked_mul(c.joiners.len() as u64) {
        Some(expected) if expected == c.total_staked => {}
        _ => errors.push(format!(
            "commitment {}: total staked {} does not match {} joiners at {}",
            c.id,
            c.total_staked,
            c.joiners.len(),
            c.stake_amount
        )),
    }
    match (&c.settlement, c.settled) {
        (Some(record), true) => {
            if record.total_distributed != c.total_staked {
                errors.push(format!(
                    "commitment {}: distributed {} but staked {}",
                    c.id, record.total_distributed, c.total_staked
                ));
            }
            for payment in &record.payouts {
                if payment.status == DeliveryStatus::Pending {
                    errors.push(format!(
                        "commitment {}: payout of {} to {} has unknown delivery status",
                        c.id, payment.amount, payment.account
                    ));
                }
            }
        }
        (None, false) => {}
        _ => errors.push(format!(
            "commitment {}: settled flag and settlement record disagree",
            c.id
        )),
    }
}
