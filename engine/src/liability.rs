//! Retrying payouts that failed during settlement.
//!
//! The settlement record is the source of truth for what a commitment still owes: a payment
//! marked `Owed` there is a debt whether or not a [`Liability`] row exists for it. The
//! liability store is the work queue for retries and can be rebuilt from the records with
//! [`restore_liabilities`].

use commitclub_ledger::CommitmentLedger;
use commitclub_store::{CommitmentStore, DeliveryStatus, Liability, LiabilityStore, Payout};
use commitclub_types::{AccountId, CommitId, Timestamp};
use tracing::{error, info};

use crate::settlement::record_delivery;
use crate::ClubError;

const RESTORE_PAGE: usize = 256;

/// What happened to one retried liability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The transfer went through and the liability is gone.
    Delivered(Liability),
    /// The transfer failed again; the updated liability is stored.
    StillOwed(Liability),
}

impl RetryOutcome {
    pub fn liability(&self) -> &Liability {
        match self {
            Self::Delivered(l) | Self::StillOwed(l) => l,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Retry the liability `commit_id` owes `account`.
///
/// Before the transfer the payment is moved from `Owed` to `Pending` on the settlement
/// record in one ledger write, so two retries of the same debt cannot both pay: the second
/// finds the payment no longer owed and fails with `Corrupted`. A crash after that write
/// leaves the payment `Pending`, which the integrity check reports. A failed transfer puts
/// the payment back to `Owed` and stores the liability with `attempts` incremented.
pub fn retry_liability<S, L, P>(
    ledger: &mut CommitmentLedger<S>,
    liabilities: &L,
    payout: &mut P,
    commit_id: CommitId,
    account: &AccountId,
    now: Timestamp,
) -> Result<RetryOutcome, ClubError>
where
    S: CommitmentStore,
    L: LiabilityStore,
    P: Payout,
{
    let mut liability = liabilities
        .get_liability(commit_id, account)?
        .ok_or_else(|| ClubError::LiabilityNotFound {
            id: commit_id,
            account: account.clone(),
        })?;

    ledger.update(commit_id, |c| {
        let payment = c
            .settlement
            .as_mut()
            .and_then(|r| r.payment_mut(account))
            .ok_or_else(|| ClubError::Corrupted {
                id: commit_id,
                reason: format!("liability to {account} has no matching payout"),
            })?;
        if payment.status != DeliveryStatus::Owed {
            return Err(ClubError::Corrupted {
                id: commit_id,
                reason: format!("liability to {account} but payout is {}", payment.status.as_str()),
            });
        }
        if payment.amount != liability.amount {
            return Err(ClubError::Corrupted {
                id: commit_id,
                reason: format!(
                    "liability to {account} is {} but payout is {}",
                    liability.amount, payment.amount
                ),
            });
        }
        payment.status = DeliveryStatus::Pending;
        Ok(())
    })?;

    match payout.transfer(account, liability.amount) {
        Ok(()) => {
            if let Err(e) = record_delivery(ledger, commit_id, &[(account.clone(), DeliveryStatus::Delivered)]) {
                error!(
                    commit = %commit_id,
                    %account,
                    amount = %liability.amount,
                    error = %e,
                    "retried payout delivered but not recorded"
                );
            }
            if let Err(e) = liabilities.delete_liability(commit_id, account) {
                error!(commit = %commit_id, %account, error = %e, "failed to clear delivered liability");
            }
            Ok(RetryOutcome::Delivered(liability))
        }
        Err(e) => {
            liability.attempts = liability.attempts.saturating_add(1);
            liability.last_attempt_at = now;
            liability.reason = e.to_string();
            record_delivery(ledger, commit_id, &[(account.clone(), DeliveryStatus::Owed)])?;
            liabilities.put_liability(&liability)?;
            Ok(RetryOutcome::StillOwed(liability))
        }
    }
}

/// Store a liability for every payment marked `Owed` on a settlement record that has none.
///
/// Returns the liabilities created. Existing liabilities are left untouched.
pub fn restore_liabilities<S, L>(
    ledger: &CommitmentLedger<S>,
    liabilities: &L,
    now: Timestamp,
) -> Result<Vec<Liability>, ClubError>
where
    S: CommitmentStore,
    L: LiabilityStore,
{
    let mut restored = Vec::new();
    let mut offset = 0u64;
    loop {
        let page = ledger.list(offset, RESTORE_PAGE)?;
        if page.is_empty() {
            break;
        }
        offset += page.len() as u64;

        for commitment in &page {
            let Some(record) = &commitment.settlement else {
                continue;
            };
            for payment in record.payouts.iter().filter(|p| p.status == DeliveryStatus::Owed) {
                if liabilities.get_liability(commitment.id, &payment.account)?.is_some() {
                    continue;
                }
                let liability = Liability {
                    commit_id: commitment.id,
                    account: payment.account.clone(),
                    amount: payment.amount,
                    reason: "restored from settlement record".into(),
                    recorded_at: now,
                    attempts: 1,
                    last_attempt_at: record.settled_at,
                };
                liabilities.put_liability(&liability)?;
                info!(commit = %commitment.id, account = %payment.account, amount = %payment.amount, "restored liability");
                restored.push(liability);
            }
        }
    }
    Ok(restored)
}

/// Restore missing liabilities, then retry every stored liability in key order. Stops at
/// the first error.
pub fn retry_all<S, L, P>(
    ledger: &mut CommitmentLedger<S>,
    liabilities: &L,
    payout: &mut P,
    now: Timestamp,
) -> Result<Vec<RetryOutcome>, ClubError>
where
    S: CommitmentStore,
    L: LiabilityStore,
    P: Payout,
{
    restore_liabilities(ledger, liabilities, now)?;
    let pending = liabilities.iter_liabilities()?;
    let mut outcomes = Vec::with_capacity(pending.len());
    for l in pending {
        outcomes.push(retry_liability(ledger, liabilities, payout, l.commit_id, &l.account, now)?);
    }
    Ok(outcomes)
}
