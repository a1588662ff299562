use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ledger::{AccountId, Amount, TokenError, TokenLedger};

pub type Timestamp = u64;

pub const ROI_BPS: u64 = 100; // 1% of principal per claim window
pub const REFERRAL_BPS: u64 = 50; // 0.5% of every staked amount
pub const BPS_DENOM: u64 = 10_000;
pub const CLAIM_COOLDOWN_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum StakingError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("no participant record for {account}")]
    UnknownParticipant { account: AccountId },
    #[error("claim cooldown not elapsed, {remaining_secs}s remaining")]
    CooldownNotElapsed { remaining_secs: u64 },
    #[error("withdraw of {requested} exceeds staked amount {staked}")]
    InsufficientPrincipal { requested: Amount, staked: Amount },
    #[error("token transfer failed: {0}")]
    Transfer(#[from] TokenError),
}

/// One record per address that ever staked. Records are created on first
/// stake and never deleted, so `referrer` and `total_claimed` survive a
/// full withdrawal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ParticipantRecord {
    pub staked_amount: Amount,
    pub last_claim_time: Timestamp,
    pub total_claimed: Amount,
    pub referrer: Option<AccountId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PoolEvent {
    Staked {
        participant: AccountId,
        amount: Amount,
    },
    ReferralPaid {
        referrer: AccountId,
        staker: AccountId,
        amount: Amount,
    },
    Claimed {
        participant: AccountId,
        amount: Amount,
    },
    Withdrawn {
        participant: AccountId,
        amount: Amount,
    },
}

/// What a withdrawal actually paid out: yield settled by the auto-claim
/// (zero when the cooldown had not elapsed) plus the returned principal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawOutcome {
    pub claimed: Amount,
    pub withdrawn: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool_account: AccountId,
    pub total_staked: Amount,
    pub participants: BTreeMap<AccountId, ParticipantRecord>,
    pub events: Vec<PoolEvent>,
    pub state_root: [u8; 32],
}

/// The staking engine. Owns participant records and pool totals; custody
/// of the actual tokens stays on the [`TokenLedger`] under `pool_account`.
///
/// Every mutating operation validates against current state first and only
/// then touches the token ledger, so a rejected call leaves both the engine
/// and the ledger exactly as they were. The one deliberate exception is the
/// degraded yield payout in [`StakingPool::claim_roi`]: when the pool owes
/// more than it holds, the claim still succeeds for whatever balance is
/// left and the shortfall is forfeited.
#[derive(Debug, Serialize, Deserialize)]
pub struct StakingPool {
    pool_account: AccountId,
    participants: BTreeMap<AccountId, ParticipantRecord>,
    total_staked: Amount,
    events: Vec<PoolEvent>,
}

impl StakingPool {
    pub fn new(pool_account: AccountId) -> Self {
        Self {
            pool_account,
            participants: BTreeMap::new(),
            total_staked: 0,
            events: Vec::new(),
        }
    }

    pub fn pool_account(&self) -> &AccountId {
        &self.pool_account
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    /// The participant's record, or the zero default for an address that
    /// never staked.
    pub fn user_info(&self, account: &AccountId) -> ParticipantRecord {
        self.participants.get(account).cloned().unwrap_or_default()
    }

    /// Yield claimable right now: zero inside the cooldown window, one
    /// whole window's worth (1% of current principal) outside it. Waiting
    /// several windows does not compound.
    pub fn pending_roi(&self, account: &AccountId, now: Timestamp) -> Amount {
        match self.participants.get(account) {
            Some(record)
                if now.saturating_sub(record.last_claim_time) >= CLAIM_COOLDOWN_SECS =>
            {
                bps_share(record.staked_amount, ROI_BPS)
            }
            _ => 0,
        }
    }

    /// Pull `amount` from the caller into the pool and grow their stake.
    ///
    /// The caller must have approved the pool account on the token ledger
    /// beforehand. A referrer is recorded only while the caller's record
    /// has none, and only if the proposed account is someone else with an
    /// active stake; invalid proposals are ignored without error. Whenever
    /// the caller has a recorded referrer, that referrer immediately
    /// receives 0.5% of the newly staked amount out of the pool.
    pub fn stake(
        &mut self,
        token: &mut TokenLedger,
        caller: &AccountId,
        amount: Amount,
        proposed_referrer: Option<&AccountId>,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let candidate = proposed_referrer
            .filter(|referrer| *referrer != caller)
            .filter(|referrer| {
                self.participants
                    .get(*referrer)
                    .map_or(false, |record| record.staked_amount > 0)
            })
            .cloned();

        token.transfer_from(&self.pool_account, caller, &self.pool_account, amount)?;

        let record = self
            .participants
            .entry(caller.clone())
            .or_insert_with(|| ParticipantRecord {
                last_claim_time: now,
                ..ParticipantRecord::default()
            });
        if record.referrer.is_none() {
            record.referrer = candidate;
        }
        let active_referrer = record.referrer.clone();
        record.staked_amount += amount;
        self.total_staked += amount;
        self.events.push(PoolEvent::Staked {
            participant: caller.clone(),
            amount,
        });

        if let Some(referrer) = active_referrer {
            let bonus = bps_share(amount, REFERRAL_BPS);
            if bonus > 0 {
                token.transfer(&self.pool_account, &referrer, bonus)?;
                self.events.push(PoolEvent::ReferralPaid {
                    referrer,
                    staker: caller.clone(),
                    amount: bonus,
                });
            }
        }
        Ok(())
    }

    /// Pay out one window of yield and restart the cooldown clock.
    ///
    /// When the pool holds less than it owes, the claim degrades: it pays
    /// whatever balance remains (possibly zero), forfeits the shortfall,
    /// and still advances `last_claim_time`. Returns the amount actually
    /// paid.
    pub fn claim_roi(
        &mut self,
        token: &mut TokenLedger,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<Amount, StakingError> {
        let record = self.participants.get_mut(caller).ok_or_else(|| {
            StakingError::UnknownParticipant {
                account: caller.clone(),
            }
        })?;
        let elapsed = now.saturating_sub(record.last_claim_time);
        if elapsed < CLAIM_COOLDOWN_SECS {
            return Err(StakingError::CooldownNotElapsed {
                remaining_secs: CLAIM_COOLDOWN_SECS - elapsed,
            });
        }
        let owed = bps_share(record.staked_amount, ROI_BPS);
        let paid = owed.min(token.balance_of(&self.pool_account));
        token.transfer(&self.pool_account, caller, paid)?;
        record.total_claimed += paid;
        record.last_claim_time = now;
        if paid > 0 {
            self.events.push(PoolEvent::Claimed {
                participant: caller.clone(),
                amount: paid,
            });
        }
        Ok(paid)
    }

    /// Return `amount` of principal to the caller, auto-claiming any
    /// eligible yield first.
    ///
    /// The auto-claim follows the degraded-payout rule of
    /// [`StakingPool::claim_roi`] and is skipped silently inside the
    /// cooldown window. The principal leg has no partial policy: if the
    /// pool cannot cover auto-claim plus the full `amount`, the whole call
    /// is rejected and nothing moves.
    pub fn withdraw(
        &mut self,
        token: &mut TokenLedger,
        caller: &AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<WithdrawOutcome, StakingError> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let record = self.participants.get_mut(caller).ok_or_else(|| {
            StakingError::UnknownParticipant {
                account: caller.clone(),
            }
        })?;
        if record.staked_amount < amount {
            return Err(StakingError::InsufficientPrincipal {
                requested: amount,
                staked: record.staked_amount,
            });
        }
        let available = token.balance_of(&self.pool_account);
        let cooldown_over =
            now.saturating_sub(record.last_claim_time) >= CLAIM_COOLDOWN_SECS;
        let claimed = if cooldown_over {
            bps_share(record.staked_amount, ROI_BPS).min(available)
        } else {
            0
        };
        // principal is all-or-nothing, so check it before paying anything
        if available - claimed < amount {
            return Err(StakingError::Transfer(TokenError::InsufficientFunds {
                account: self.pool_account.clone(),
            }));
        }
        if cooldown_over {
            token.transfer(&self.pool_account, caller, claimed)?;
            record.total_claimed += claimed;
            record.last_claim_time = now;
            if claimed > 0 {
                self.events.push(PoolEvent::Claimed {
                    participant: caller.clone(),
                    amount: claimed,
                });
            }
        }
        token.transfer(&self.pool_account, caller, amount)?;
        record.staked_amount -= amount;
        self.total_staked -= amount;
        self.events.push(PoolEvent::Withdrawn {
            participant: caller.clone(),
            amount,
        });
        Ok(WithdrawOutcome {
            claimed,
            withdrawn: amount,
        })
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            pool_account: self.pool_account.clone(),
            total_staked: self.total_staked,
            participants: self.participants.clone(),
            events: self.events.clone(),
            state_root: self.state_root(),
        }
    }

    /// Merkle root over the participant records plus a pool-totals leaf.
    /// Any change to a record, the participant set or `total_staked`
    /// changes the root.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(self.participants.len() + 1);
        for (account, record) in &self.participants {
            let mut hasher = Sha256::new();
            hasher.update(b"part");
            hasher.update(account.as_bytes());
            hasher.update(record.staked_amount.to_le_bytes());
            hasher.update(record.last_claim_time.to_le_bytes());
            hasher.update(record.total_claimed.to_le_bytes());
            match &record.referrer {
                Some(referrer) => {
                    hasher.update([1u8]);
                    hasher.update(referrer.as_bytes());
                }
                None => hasher.update([0u8]),
            }
            leaves.push(hasher.finalize().into());
        }
        let mut pool_leaf = Sha256::new();
        pool_leaf.update(b"pool");
        pool_leaf.update(self.pool_account.as_bytes());
        pool_leaf.update(self.total_staked.to_le_bytes());
        leaves.push(pool_leaf.finalize().into());
        build_merkle(leaves)
    }
}

fn bps_share(amount: Amount, bps: u64) -> Amount {
    (amount as u128 * bps as u128 / BPS_DENOM as u128) as Amount
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"roipool-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(&chunk[0]);
            if chunk.len() == 2 {
                hasher.update(&chunk[1]);
            } else {
                hasher.update(&chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
