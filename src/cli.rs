//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{load_price_table, CsvAccountAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::account::{RefreshOutcome, SimulatedAccount};
use crate::domain::account_config::{build_account_config, DEFAULT_MARGIN_RESERVE_PCT};
use crate::domain::config_validation::validate_account_config;
use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "ledgerkeep", about = "Trading account balance ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Value an account snapshot in its reference currency (or --currency)
    Value {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        balances: PathBuf,
        #[arg(short, long)]
        prices: PathBuf,
        #[arg(short, long)]
        reserves: Option<PathBuf>,
        #[arg(long)]
        currency: Option<String>,
    },
    /// List the tradable balances of an account snapshot
    Balances {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        balances: PathBuf,
        #[arg(short, long)]
        reserves: Option<PathBuf>,
    },
    /// Validate an account configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Value {
            config,
            balances,
            prices,
            reserves,
            currency,
        } => run_value(
            &config,
            &balances,
            &prices,
            reserves.as_deref(),
            currency.as_deref(),
        ),
        Command::Balances {
            config,
            balances,
            reserves,
        } => run_balances(&config, &balances, reserves.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, LedgerError> {
    FileConfigAdapter::from_file(path).map_err(|e| LedgerError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Builds a simulated account from `config` and loads its balances from CSV.
pub fn open_csv_account(
    config: &dyn ConfigPort,
    balances_path: &Path,
    reserves_path: Option<&Path>,
) -> Result<SimulatedAccount, LedgerError> {
    validate_account_config(config)?;
    let account_config = build_account_config(config)?;

    let margin_pct =
        config.get_double("account", "margin_reserve_pct", DEFAULT_MARGIN_RESERVE_PCT);
    let mut adapter = CsvAccountAdapter::new(balances_path.to_path_buf(), margin_pct);
    if let Some(path) = reserves_path {
        adapter = adapter.with_margin_reserves(path.to_path_buf());
    }

    let account = SimulatedAccount::new(Arc::new(adapter), account_config)?;
    match account.refresh() {
        RefreshOutcome::Refreshed => Ok(account),
        outcome => Err(LedgerError::Adapter {
            reason: format!(
                "no balances loaded from {} ({outcome:?})",
                balances_path.display()
            ),
        }),
    }
}

/// Total value of the CSV account in `currency`, or its reference currency.
pub fn value_account(
    config: &dyn ConfigPort,
    balances_path: &Path,
    prices_path: &Path,
    reserves_path: Option<&Path>,
    currency: Option<&str>,
) -> Result<(String, f64), LedgerError> {
    let account = open_csv_account(config, balances_path, reserves_path)?;
    let prices = load_price_table(prices_path)?;
    let currency = currency
        .map(|c| c.trim().to_uppercase())
        .unwrap_or_else(|| account.reference_currency().to_string());
    let total = account.total_funds_in(&currency, &prices);
    Ok((currency, total))
}

fn run_value(
    config_path: &Path,
    balances_path: &Path,
    prices_path: &Path,
    reserves_path: Option<&Path>,
    currency: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let result = load_config(config_path).and_then(|adapter| {
        value_account(&adapter, balances_path, prices_path, reserves_path, currency)
    });
    match result {
        Ok((currency, total)) => {
            println!("{total:.8} {currency}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_balances(config_path: &Path, balances_path: &Path, reserves_path: Option<&Path>) -> ExitCode {
    let result = load_config(config_path)
        .and_then(|adapter| open_csv_account(&adapter, balances_path, reserves_path));
    let account = match result {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let snapshot: BTreeMap<_, _> = account.snapshot().into_iter().collect();
    for (symbol, balance) in &snapshot {
        println!(
            "{symbol}\tfree={}\tlocked={}\tshorted={}",
            balance.free, balance.locked, balance.shorted
        );
        for shorted in balance.shorted_symbols() {
            println!("  reserve against {shorted}: {}", balance.margin_reserve(&shorted));
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating account config: {}", config_path.display());
    let result = load_config(config_path).and_then(|adapter| {
        validate_account_config(&adapter)?;
        build_account_config(&adapter)
    });
    match result {
        Ok(config) => {
            eprintln!("  Account:            {}", config.id);
            eprintln!("  Reference currency: {}", config.reference_currency);
            let pairs: Vec<String> = config.symbol_pairs().into_keys().collect();
            eprintln!("  Pairs:              {}", pairs.join(", "));
            eprintln!("\nConfig is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
