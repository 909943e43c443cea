// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use brokerage_ledger::{
    due_conditions, export_csv, finalize_trade, get_ledger, list_trades, peek_next,
    setup_database, trial_balance, Config, EftFamily, LedgerFilter, ReconciliationEngine,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Brokerage trades, trust EFTs and general ledger",
    long_about = None
)]
struct Cli {
    /// SQLite database (overrides BROKERAGE_DB_PATH)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// List trades
    Trades,
    /// Finalize a trade: post its ledger rows and issue EFTs
    Finalize {
        trade_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Print ledger rows
    Ledger {
        #[arg(short, long)]
        account: Option<String>,
        #[arg(short, long)]
        trade: Option<String>,
    },
    /// Balances per account
    TrialBalance,
    /// Write the ledger to a CSV file
    ExportLedger {
        path: PathBuf,
        #[arg(short, long)]
        account: Option<String>,
    },
    /// Next EFT number per family
    EftNext,
    /// Reconcile a bank account for a month (YYYY-MM)
    Reconcile { account: String, period: String },
    /// Unsatisfied conditions coming due
    Due {
        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },
    /// Interactive browser (default)
    #[cfg(feature = "tui")]
    Tui,
}

fn main() -> Result<()> {
    brokerage_ledger::init_tracing("warn");

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(path) = cli.database {
        config.db_path = path;
    }

    let mut conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&conn)?;

    match cli.command {
        Some(Commands::Init) => {
            info!(path = %config.db_path.display(), "database initialized");
            println!("✓ Database ready at {}", config.db_path.display());
        }
        Some(Commands::Trades) => {
            for trade in list_trades(&conn)? {
                println!(
                    "#{:<5} {:<40} {:>12.2}  {}",
                    trade.trade_number,
                    trade.key_info.address,
                    trade.commission.total_commission,
                    if trade.is_finalized { "FINAL" } else { "open" }
                );
            }
        }
        Some(Commands::Finalize { trade_id, actor }) => {
            let outcome = finalize_trade(&mut conn, &trade_id, &actor)?;
            println!(
                "✓ Trade #{} finalized: journal entry {}, {} rows",
                outcome.trade_number,
                outcome.entry_number.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
                outcome.rows_posted
            );
            for eft in &outcome.efts {
                println!("  EFT {:>5}  {:>12.2}  {}", eft.number, eft.amount, eft.payee);
            }
            if !outcome.plan.receivable_outstanding.is_zero() {
                println!("  Receivable outstanding: {:.2}", outcome.plan.receivable_outstanding);
            }
        }
        Some(Commands::Ledger { account, trade }) => {
            let filter = LedgerFilter {
                account,
                trade_id: trade,
                ..LedgerFilter::default()
            };
            for e in get_ledger(&conn, &filter)? {
                println!(
                    "{:>5} {} {} {:<26} {:>12.2} {:>12.2} {:>5} {}",
                    e.entry_number,
                    e.date,
                    e.account_number,
                    e.account_name,
                    e.debit,
                    e.credit,
                    e.eft_number.map(|n| n.to_string()).unwrap_or_default(),
                    e.description
                );
            }
        }
        Some(Commands::TrialBalance) => {
            for b in trial_balance(&conn)? {
                println!(
                    "{} {:<28} {:>14.2} {:>14.2} {:>14.2}",
                    b.account_number, b.account_name, b.debits, b.credits, b.balance
                );
            }
        }
        Some(Commands::ExportLedger { path, account }) => {
            let filter = LedgerFilter {
                account,
                ..LedgerFilter::default()
            };
            let entries = get_ledger(&conn, &filter)?;
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let written = export_csv(file, &entries)?;
            println!("✓ Wrote {} rows to {}", written, path.display());
        }
        Some(Commands::EftNext) => {
            for family in EftFamily::ALL {
                println!("{:<20} {}", family.key(), peek_next(&conn, family)?);
            }
        }
        Some(Commands::Reconcile { account, period }) => {
            let engine = ReconciliationEngine::with_thresholds(
                config.recon_tolerance,
                config.recon_major_threshold,
            );
            let report = engine.report(&conn, &account, &period)?;
            println!("{}", report.summary());
            for item in &report.outstanding {
                println!(
                    "  outstanding {} {:>12.2} {}",
                    item.date, item.amount, item.description
                );
            }
        }
        Some(Commands::Due { days }) => {
            for due in due_conditions(&conn, Utc::now().date_naive(), days)? {
                println!(
                    "#{:<5} {:<32} {} {}",
                    due.trade_number, due.address, due.condition.due_date, due.condition.description
                );
            }
        }
        #[cfg(feature = "tui")]
        Some(Commands::Tui) => run_ui_mode(&conn)?,
        None => run_ui_mode(&conn)?,
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &Connection) -> Result<()> {
    let trades = list_trades(conn)?;
    let ledger = get_ledger(conn, &LedgerFilter::default())?;
    let balances = trial_balance(conn)?;

    let mut app = ui::App::new(trades, ledger, balances);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_conn: &Connection) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run a subcommand, see --help");
    std::process::exit(1);
}
