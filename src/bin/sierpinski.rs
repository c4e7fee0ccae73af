#![forbid(unsafe_code)]
//! Sierpinski ledger command-line interface

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use sierpinski_ledger::cli::LedgerSession;
use sierpinski_ledger::config::load_config;
use sierpinski_ledger::transaction::{Transaction, TransactionKind};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about = "Signed transaction ledger over a Sierpinski address space", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./sierpinski.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger state file, overriding the configured one
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Signs and appends a transfer between two wallets
    AddTransaction {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        receiver: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
    },
    /// Lists every transaction touching a wallet
    QueryTransactions {
        #[arg(long)]
        wallet: String,
    },
    /// Prints a wallet's balance
    GetBalance {
        #[arg(long)]
        wallet: String,
    },
    /// Replays the log and checks every integrity rule
    VerifyLedger,
    /// Renders the wallet hierarchy
    VisualizeLedger {
        /// Show each wallet's balance
        #[arg(long)]
        balances: bool,
    },
    /// Writes the ledger snapshot to a file
    ExportLedger {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replaces the ledger with a snapshot file
    ImportLedger {
        #[arg(long)]
        file: PathBuf,
    },
    /// Prints the address of a fractal position
    CreateWallet {
        #[arg(long, default_value_t = 0)]
        level: u32,
        #[arg(long, default_value_t = 0)]
        index: u64,
    },
    /// Creates the foundational wallet at the fractal root
    FounderOnboarding,
    /// Onboards the next member wallet, funded by the foundational wallet
    StandardOnboarding,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = load_config(cli.config.as_deref())
        .and_then(|config| config.log_level())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = LedgerSession::open(cli.config.as_deref(), cli.state)?;

    match cli.command {
        Commands::AddTransaction {
            sender,
            receiver,
            amount,
        } => {
            let tx = session.add_transaction(&sender, &receiver, amount)?;
            println!("{} {}", "Transaction added:".bright_green().bold(), tx.id);
        }
        Commands::QueryTransactions { wallet } => {
            let transactions = session.query_transactions(&wallet)?;
            if transactions.is_empty() {
                println!("{}", format!("No transactions for {}", wallet).yellow());
            } else {
                println!("{}", transaction_table(&wallet, &transactions));
            }
        }
        Commands::GetBalance { wallet } => {
            let balance = session.balance(&wallet)?;
            println!("{} {}", wallet.bright_white(), balance.to_string().bright_green().bold());
        }
        Commands::VerifyLedger => {
            let report = session.verify();
            if report.is_valid() {
                println!(
                    "{} {} transactions, {} wallets",
                    "Ledger is valid:".bright_green().bold(),
                    report.transactions_checked,
                    report.wallets_checked
                );
            } else {
                println!("{}", "Ledger is INVALID".red().bold());
                for violation in &report.violations {
                    println!("  {} {}", "•".red(), violation);
                }
                return Err(format!("{} integrity violations", report.violations.len()).into());
            }
        }
        Commands::VisualizeLedger { balances } => {
            println!("{}", session.visualize(balances));
        }
        Commands::ExportLedger { file } => {
            session.export(&file)?;
            println!("{} {}", "Ledger exported to".bright_green(), file.display());
        }
        Commands::ImportLedger { file } => {
            session.import(&file)?;
            println!(
                "{} {} ({} transactions)",
                "Ledger imported from".bright_green(),
                file.display(),
                session.ledger().len()
            );
        }
        Commands::CreateWallet { level, index } => {
            let address = session.create_wallet(level, index)?;
            println!("{}", address.bright_cyan());
        }
        Commands::FounderOnboarding => {
            let outcome = session.founder_onboarding()?;
            println!("{}", outcome.message.bright_green().bold());
            println!(
                "Key stored in {}",
                session.config().storage.keystore_file.display()
            );
        }
        Commands::StandardOnboarding => {
            let outcome = session.standard_onboarding()?;
            println!("{}", outcome.message.bright_green().bold());
            println!(
                "Key stored in {}",
                session.config().storage.keystore_file.display()
            );
        }
    }

    Ok(())
}

fn transaction_table(wallet: &str, transactions: &[&Transaction]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["Id", "Kind", "Direction", "Counterparty", "Amount", "Time"]
                .into_iter()
                .map(|h| Cell::new(h).fg(TableColor::Cyan).add_attribute(Attribute::Bold)),
        );

    for tx in transactions {
        let (direction, counterparty, color) = if tx.kind == TransactionKind::Genesis {
            ("minted", "-", TableColor::Magenta)
        } else if tx.receiver == wallet {
            ("in", tx.sender.as_str(), TableColor::Green)
        } else {
            ("out", tx.receiver.as_str(), TableColor::Red)
        };
        table.add_row(vec![
            Cell::new(tx.short_id()),
            Cell::new(tx.kind.as_str()),
            Cell::new(direction).fg(color),
            Cell::new(counterparty),
            Cell::new(tx.amount).fg(color),
            Cell::new(format_timestamp(tx.timestamp)).fg(TableColor::Grey),
        ]);
    }
    table
}

fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
