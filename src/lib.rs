//! Staking pool ledger primitives.
//!
//! Two layers compose the crate:
//!
//! - [`ledger`]: the fungible token ledger, keyed balances with
//!   ERC20-style allowances. Custody lives here.
//! - [`pool`]: the staking engine, holding per-participant records, the
//!   fixed daily yield schedule, referral bonuses and the event log.
//!
//! The engine holds no funds of its own; every deposit and payout moves
//! through the ledger's transfer primitives against a dedicated pool
//! account. Mutating operations take an explicit unix timestamp, so the
//! caller owns the clock and replays stay deterministic.

pub mod ledger;
pub mod pool;
