//! The CommitClub service: the four core operations, read views, and liability retries
//! behind one serialization point.

use commitclub_ledger::{CommitmentLedger, CommitmentParams};
use commitclub_store::{
    Commitment, CommitmentStatus, CommitmentStore, Liability, LiabilityStore, Payout,
    SettlementRecord,
};
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};
use tracing::{debug, info, warn};

use crate::liability::{restore_liabilities, retry_all, retry_liability};
use crate::settlement::plan_settlement;
use crate::{
    CheckInVerifier, ClubError, ClubEvent, EventBus, JoinPolicy, RetryOutcome, SettlementEngine,
    SettlementReport, StakeAccountant,
};

/// Owns the ledger, the liability store and the payout sink.
///
/// Every mutating operation takes `&mut self`, so callers sharing one instance get a
/// total order of operations from whatever lock they wrap it in.
pub struct CommitClub<C, L, P> {
    ledger: CommitmentLedger<C>,
    liabilities: L,
    payout: P,
    accountant: StakeAccountant,
    verifier: CheckInVerifier,
    settlement: SettlementEngine,
    events: EventBus,
}

impl<C, L, P> CommitClub<C, L, P>
where
    C: CommitmentStore,
    L: LiabilityStore,
    P: Payout,
{
    pub fn new(commitments: C, liabilities: L, payout: P) -> Self {
        Self {
            ledger: CommitmentLedger::new(commitments),
            liabilities,
            payout,
            accountant: StakeAccountant::default(),
            verifier: CheckInVerifier::new(),
            settlement: SettlementEngine::new(),
            events: EventBus::new(),
        }
    }

    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.accountant = StakeAccountant::new(policy);
        self
    }

    pub fn join_policy(&self) -> JoinPolicy {
        self.accountant.policy()
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&ClubEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    // ── Core operations ─────────────────────────────────────────────────

    pub fn create_commit(
        &mut self,
        organizer: &AccountId,
        params: CommitmentParams,
        now: Timestamp,
    ) -> Result<CommitId, ClubError> {
        let name = params.name.clone();
        let stake_amount = params.stake_amount;
        let min_check_ins = params.min_check_ins;
        let deadline = params.deadline;

        let id = self
            .ledger
            .create(organizer, params, now)
            .map_err(ClubError::from)
            .inspect_err(|e| debug!(%organizer, error = %e, "create rejected"))?;

        info!(commit = %id, %organizer, %stake_amount, min_check_ins, %deadline, "commitment created");
        self.events.emit(&ClubEvent::CommitmentCreated {
            id,
            organizer: organizer.clone(),
            name,
            stake_amount,
            min_check_ins,
            deadline,
        });
        Ok(id)
    }

    pub fn join_commit(
        &mut self,
        id: CommitId,
        caller: &AccountId,
        deposit: Amount,
        now: Timestamp,
    ) -> Result<(), ClubError> {
        self.accountant
            .join(&mut self.ledger, id, caller, deposit, now)
            .inspect_err(|e| debug!(commit = %id, account = %caller, error = %e, "join rejected"))?;

        info!(commit = %id, account = %caller, %deposit, "joined");
        self.events.emit(&ClubEvent::Joined {
            id,
            account: caller.clone(),
            at: now,
        });
        Ok(())
    }

    pub fn check_in(
        &mut self,
        id: CommitId,
        caller: &AccountId,
        presented_code: &str,
        now: Timestamp,
    ) -> Result<(), ClubError> {
        self.verifier
            .check_in(&mut self.ledger, id, caller, presented_code)
            .inspect_err(|e| debug!(commit = %id, account = %caller, error = %e, "check-in rejected"))?;

        info!(commit = %id, account = %caller, "checked in");
        self.events.emit(&ClubEvent::CheckedIn {
            id,
            account: caller.clone(),
            at: now,
        });
        Ok(())
    }

    pub fn settle_commit(&mut self, id: CommitId, now: Timestamp) -> Result<SettlementReport, ClubError> {
        let report = self
            .settlement
            .settle(&mut self.ledger, &self.liabilities, &mut self.payout, id, now)
            .inspect_err(|e| debug!(commit = %id, error = %e, "settle rejected"))?;

        info!(
            commit = %id,
            attendees = report.record.attendee_count,
            total = %report.record.total_distributed,
            delivered = report.delivered.len(),
            owed = report.liabilities.len(),
            "commitment settled"
        );
        if !report.unrecorded.is_empty() {
            warn!(
                commit = %id,
                accounts = report.unrecorded.len(),
                "owed payouts kept on the settlement record only; restore before retrying"
            );
        }
        self.events.emit(&ClubEvent::Settled {
            id,
            attendee_count: report.record.attendee_count,
            total_distributed: report.record.total_distributed,
        });
        for l in &report.liabilities {
            self.events.emit(&ClubEvent::TransferFailed {
                id,
                account: l.account.clone(),
                amount: l.amount,
            });
        }
        Ok(report)
    }

    // ── Views ───────────────────────────────────────────────────────────

    pub fn get_commitment(&self, id: CommitId) -> Result<Commitment, ClubError> {
        Ok(self.ledger.get(id)?)
    }

    pub fn joiners(&self, id: CommitId) -> Result<Vec<AccountId>, ClubError> {
        Ok(self.ledger.get(id)?.joiners)
    }

    pub fn attendees(&self, id: CommitId) -> Result<Vec<AccountId>, ClubError> {
        Ok(self.ledger.get(id)?.attendees)
    }

    pub fn has_joined(&self, id: CommitId, account: &AccountId) -> Result<bool, ClubError> {
        Ok(self.ledger.get(id)?.is_joiner(account))
    }

    pub fn has_checked_in(&self, id: CommitId, account: &AccountId) -> Result<bool, ClubError> {
        Ok(self.ledger.get(id)?.is_attendee(account))
    }

    pub fn status(&self, id: CommitId, now: Timestamp) -> Result<CommitmentStatus, ClubError> {
        Ok(self.ledger.get(id)?.status(now))
    }

    pub fn commitment_count(&self) -> Result<u64, ClubError> {
        Ok(self.ledger.count()?)
    }

    pub fn list_commitments(&self, offset: u64, limit: usize) -> Result<Vec<Commitment>, ClubError> {
        Ok(self.ledger.list(offset, limit)?)
    }

    /// The payouts settlement would make at `now`, without settling. Settled commitments
    /// return their stored record.
    pub fn preview_settlement(&self, id: CommitId, now: Timestamp) -> Result<SettlementRecord, ClubError> {
        let commitment = self.ledger.get(id)?;
        match commitment.settlement {
            Some(record) => Ok(record),
            None => plan_settlement(&commitment, now),
        }
    }

    // ── Liabilities ─────────────────────────────────────────────────────

    pub fn liabilities(&self) -> Result<Vec<Liability>, ClubError> {
        Ok(self.liabilities.iter_liabilities()?)
    }

    pub fn liabilities_for(&self, id: CommitId) -> Result<Vec<Liability>, ClubError> {
        Ok(self.liabilities.liabilities_for_commit(id)?)
    }

    pub fn retry_liability(
        &mut self,
        id: CommitId,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<RetryOutcome, ClubError> {
        let outcome = retry_liability(&mut self.ledger, &self.liabilities, &mut self.payout, id, account, now)?;
        self.after_retry(&outcome);
        Ok(outcome)
    }

    /// Re-create liabilities for payments the settlement records still mark as owed.
    pub fn restore_liabilities(&self, now: Timestamp) -> Result<Vec<Liability>, ClubError> {
        restore_liabilities(&self.ledger, &self.liabilities, now)
    }

    /// Restore missing liabilities, then retry them all.
    pub fn retry_all_liabilities(&mut self, now: Timestamp) -> Result<Vec<RetryOutcome>, ClubError> {
        let outcomes = retry_all(&mut self.ledger, &self.liabilities, &mut self.payout, now)?;
        for outcome in &outcomes {
            self.after_retry(outcome);
        }
        Ok(outcomes)
    }

    fn after_retry(&self, outcome: &RetryOutcome) {
        let l = outcome.liability();
        match outcome {
            RetryOutcome::Delivered(_) => {
                info!(commit = %l.commit_id, account = %l.account, amount = %l.amount, "liability cleared");
                self.events.emit(&ClubEvent::LiabilityCleared {
                    id: l.commit_id,
                    account: l.account.clone(),
                    amount: l.amount,
                });
            }
            RetryOutcome::StillOwed(_) => {
                debug!(
                    commit = %l.commit_id,
                    account = %l.account,
                    attempts = l.attempts,
                    reason = %l.reason,
                    "liability still owed"
                );
            }
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn ledger(&self) -> &CommitmentLedger<C> {
        &self.ledger
    }

    pub fn liability_store(&self) -> &L {
        &self.liabilities
    }

    pub fn payout(&self) -> &P {
        &self.payout
    }

    pub fn payout_mut(&mut self) -> &mut P {
        &mut self.payout
    }
}
