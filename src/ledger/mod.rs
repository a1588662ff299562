use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type AccountId = String;
pub type Amount = u64;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("insufficient funds in account {account}")]
    InsufficientFunds { account: AccountId },
    #[error("allowance from {owner} to {spender} too low")]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
    },
}

/// Fungible token ledger: balances keyed by account plus ERC20-style
/// allowances. The staking engine never touches balances directly; every
/// move goes through [`TokenLedger::transfer`] or
/// [`TokenLedger::transfer_from`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TokenLedger {
    accounts: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` new units in `account`. Fixture hook for the CLI and
    /// tests; nothing in the staking engine mints.
    pub fn mint(&mut self, account: &AccountId, amount: Amount) {
        let balance = self.accounts.entry(account.clone()).or_default();
        *balance += amount;
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    /// Sum of all balances. Transfers preserve it; only `mint` grows it.
    pub fn total_supply(&self) -> Amount {
        self.accounts.values().sum()
    }

    /// Let `spender` pull up to `amount` out of `owner`. Overwrites any
    /// previous allowance between the pair.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|per_spender| per_spender.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    /// Allowance-consuming pull: `spender` moves `amount` of `from`'s funds
    /// to `to`. The allowance is checked before the balance and decremented
    /// only when the whole transfer goes through.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if amount == 0 {
            return Ok(());
        }
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: from.clone(),
                spender: spender.clone(),
            });
        }
        self.debit(from, amount)?;
        if let Some(per_spender) = self.allowances.get_mut(from) {
            per_spender.insert(spender.clone(), allowed - amount);
        }
        self.credit(to, amount);
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: Amount) {
        let balance = self.accounts.entry(account.clone()).or_default();
        *balance += amount;
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<(), TokenError> {
        match self.accounts.get_mut(account) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                Ok(())
            }
            _ => Err(TokenError::InsufficientFunds {
                account: account.clone(),
            }),
        }
    }
}
