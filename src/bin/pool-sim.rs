use std::process;

use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};

use roipool::ledger::{AccountId, Amount, TokenLedger};
use roipool::pool::{StakingPool, Timestamp, CLAIM_COOLDOWN_SECS};

/// Drives a random mix of stake/claim/withdraw/time-advance operations
/// against an in-memory pool and checks the accounting invariants after
/// every step. Exits non-zero on the first violation.
#[derive(Parser)]
#[command(name = "pool-sim", version, about = "Randomized staking pool exercise")]
struct Args {
    /// Number of simulated participants.
    #[arg(long, default_value_t = 8)]
    participants: usize,

    /// Number of random operations to apply.
    #[arg(long, default_value_t = 2_000)]
    ops: usize,

    /// RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Tokens minted to each participant.
    #[arg(long, default_value_t = 1_000_000)]
    mint: Amount,

    /// Extra yield budget minted straight to the pool account.
    #[arg(long, default_value_t = 0)]
    fund: Amount,
}

fn main() {
    let args = Args::parse();
    if args.participants == 0 {
        eprintln!("error: --participants must be > 0");
        process::exit(2);
    }
    let mut rng = StdRng::seed_from_u64(args.seed);

    let pool_account: AccountId = "pool".to_string();
    let mut token = TokenLedger::new();
    let mut pool = StakingPool::new(pool_account.clone());

    let participants: Vec<AccountId> = (0..args.participants)
        .map(|idx| format!("user-{idx}"))
        .collect();
    for account in &participants {
        token.mint(account, args.mint);
        token.approve(account, &pool_account, args.mint);
    }
    token.mint(&pool_account, args.fund);
    let supply = token.total_supply();

    let mut now: Timestamp = 1_700_000_000;
    let mut ok = 0usize;
    let mut rejected = 0usize;

    for step in 0..args.ops {
        let account = participants[rng.gen_range(0..participants.len())].clone();
        let outcome = match rng.gen_range(0..10) {
            0..=3 => {
                let referrer = participants[rng.gen_range(0..participants.len())].clone();
                let amount = rng.gen_range(0..=args.mint / 100);
                pool.stake(&mut token, &account, amount, Some(&referrer), now)
            }
            4..=5 => pool.claim_roi(&mut token, &account, now).map(|_| ()),
            6..=8 => {
                let staked = pool.user_info(&account).staked_amount;
                let amount = rng.gen_range(0..=staked.max(10));
                pool.withdraw(&mut token, &account, amount, now).map(|_| ())
            }
            _ => {
                now += rng.gen_range(1..=CLAIM_COOLDOWN_SECS);
                Ok(())
            }
        };
        match outcome {
            Ok(()) => ok += 1,
            Err(_) => rejected += 1,
        }

        let record_sum: Amount = participants
            .iter()
            .map(|account| pool.user_info(account).staked_amount)
            .sum();
        if pool.total_staked() != record_sum {
            eprintln!(
                "step {step}: total_staked {} != sum of records {record_sum}",
                pool.total_staked()
            );
            process::exit(2);
        }
        if token.total_supply() != supply {
            eprintln!(
                "step {step}: token supply drifted: {} != {supply}",
                token.total_supply()
            );
            process::exit(2);
        }
    }

    println!(
        "pool-sim summary: ok={}, rejected={}, participants={}, total_staked={}, pool_balance={}, events={}",
        ok,
        rejected,
        pool.participant_count(),
        pool.total_staked(),
        token.balance_of(&pool_account),
        pool.events().len()
    );
}
