use std::{
    fs,
    path::{Path, PathBuf},
    process,
    time::{SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use roipool::ledger::{AccountId, Amount, TokenLedger};
use roipool::pool::{PoolEvent, StakingPool, Timestamp};

//==================== state file ====================//

/// Everything the CLI persists between invocations: the token ledger, the
/// pool, and the pool state root recorded at the last write.
#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u8,
    token: TokenLedger,
    pool: StakingPool,
    state_root_hex: String,
}

fn load_state(path: &Path) -> StateFile {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", path.display());
            process::exit(2);
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("error: cannot parse {}: {err}", path.display());
            process::exit(2);
        }
    }
}

fn save_state(path: &Path, state: &mut StateFile) {
    state.state_root_hex = hex::encode(state.pool.state_root());
    let json = serde_json::to_vec_pretty(state).expect("state json");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    if let Err(err) = fs::write(path, json) {
        eprintln!("error: cannot write {}: {err}", path.display());
        process::exit(2);
    }
}

fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

//==================== CLI ====================//

#[derive(Parser)]
#[command(name = "roipool", version, about = "Fixed daily-yield staking pool ledger")]
struct Cli {
    /// Path to the pool state file.
    #[arg(short, long, global = true, default_value = "pool.json")]
    state: PathBuf,

    /// Operation timestamp as unix seconds (defaults to the system clock).
    #[arg(long, global = true)]
    now: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh state file for a new pool.
    Init {
        /// Account that holds the pool's funds on the token ledger.
        pool_account: AccountId,
    },
    /// Mint test tokens to an account.
    Mint { account: AccountId, amount: Amount },
    /// Authorize the pool to pull tokens from an account.
    Approve { account: AccountId, amount: Amount },
    /// Stake tokens into the pool.
    Stake {
        account: AccountId,
        amount: Amount,
        /// Referrer to credit (recorded on first stake only; must already
        /// be an active staker).
        #[arg(long)]
        referrer: Option<AccountId>,
    },
    /// Claim accrued yield.
    Claim { account: AccountId },
    /// Withdraw staked principal, auto-claiming eligible yield first.
    Withdraw { account: AccountId, amount: Amount },
    /// Show yield claimable by an account right now.
    Pending { account: AccountId },
    /// Show a participant record.
    Info { account: AccountId },
    /// Show pool totals and the latest events.
    Status,
    /// Recompute the pool state root and compare it with the stored one.
    Verify,
}

fn main() {
    let cli = Cli::parse();
    let now = cli.now.unwrap_or_else(unix_now);

    match cli.command {
        Command::Init { pool_account } => {
            if cli.state.exists() {
                eprintln!("error: {} already exists", cli.state.display());
                process::exit(2);
            }
            let mut state = StateFile {
                version: 1,
                token: TokenLedger::new(),
                pool: StakingPool::new(pool_account.clone()),
                state_root_hex: String::new(),
            };
            save_state(&cli.state, &mut state);
            println!("pool '{pool_account}' initialized → {}", cli.state.display());
        }
        Command::Mint { account, amount } => {
            let mut state = load_state(&cli.state);
            state.token.mint(&account, amount);
            save_state(&cli.state, &mut state);
            println!(
                "minted {amount} → {account} (balance {})",
                state.token.balance_of(&account)
            );
        }
        Command::Approve { account, amount } => {
            let mut state = load_state(&cli.state);
            let pool_account = state.pool.pool_account().clone();
            state.token.approve(&account, &pool_account, amount);
            save_state(&cli.state, &mut state);
            println!("approved {amount} from {account} to pool '{pool_account}'");
        }
        Command::Stake {
            account,
            amount,
            referrer,
        } => {
            let mut state = load_state(&cli.state);
            match state
                .pool
                .stake(&mut state.token, &account, amount, referrer.as_ref(), now)
            {
                Ok(()) => {
                    save_state(&cli.state, &mut state);
                    println!(
                        "staked {amount} from {account} (total staked {})",
                        state.pool.total_staked()
                    );
                }
                Err(err) => {
                    eprintln!("stake failed: {err}");
                    process::exit(1);
                }
            }
        }
        Command::Claim { account } => {
            let mut state = load_state(&cli.state);
            match state.pool.claim_roi(&mut state.token, &account, now) {
                Ok(paid) => {
                    save_state(&cli.state, &mut state);
                    println!("claimed {paid} → {account}");
                }
                Err(err) => {
                    eprintln!("claim failed: {err}");
                    process::exit(1);
                }
            }
        }
        Command::Withdraw { account, amount } => {
            let mut state = load_state(&cli.state);
            match state.pool.withdraw(&mut state.token, &account, amount, now) {
                Ok(outcome) => {
                    save_state(&cli.state, &mut state);
                    println!(
                        "withdrew {} (auto-claimed {}) → {account}",
                        outcome.withdrawn, outcome.claimed
                    );
                }
                Err(err) => {
                    eprintln!("withdraw failed: {err}");
                    process::exit(1);
                }
            }
        }
        Command::Pending { account } => {
            let state = load_state(&cli.state);
            println!("{}", state.pool.pending_roi(&account, now));
        }
        Command::Info { account } => {
            let state = load_state(&cli.state);
            let record = state.pool.user_info(&account);
            println!("staked:        {}", record.staked_amount);
            println!("last claim:    {}", record.last_claim_time);
            println!("total claimed: {}", record.total_claimed);
            println!("referrer:      {}", record.referrer.as_deref().unwrap_or("-"));
            println!(
                "pending:       {}",
                state.pool.pending_roi(&account, now)
            );
        }
        Command::Status => {
            let state = load_state(&cli.state);
            let pool_account = state.pool.pool_account().clone();
            println!("pool account:  {pool_account}");
            println!("participants:  {}", state.pool.participant_count());
            println!("total staked:  {}", state.pool.total_staked());
            println!(
                "pool balance:  {}",
                state.token.balance_of(&pool_account)
            );
            println!("total supply:  {}", state.token.total_supply());
            println!("state root:    {}", hex::encode(state.pool.state_root()));
            print_recent_events(state.pool.events());
        }
        Command::Verify => {
            let state = load_state(&cli.state);
            let recomputed = hex::encode(state.pool.state_root());
            if recomputed != state.state_root_hex {
                eprintln!(
                    "state root mismatch: stored {}, recomputed {recomputed}",
                    state.state_root_hex
                );
                process::exit(2);
            }
            println!("verify: OK (state root matches)");
        }
    }
}

fn print_recent_events(events: &[PoolEvent]) {
    if events.is_empty() {
        return;
    }
    println!("recent events:");
    let tail = events.len().saturating_sub(10);
    for event in &events[tail..] {
        let line = serde_json::to_string(event).expect("event json");
        println!("  {line}");
    }
}
