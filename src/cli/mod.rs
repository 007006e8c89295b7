use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::application::{BankService, TransferRequest};
use crate::domain::{Account, AccountId, Entry, Transfer, format_cents, parse_cents};
use crate::storage::StoreConfig;

/// Microbank - accounts and money transfers
#[derive(Parser)]
#[command(name = "microbank")]
#[command(about = "Account management and atomic money transfers on a local database")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "MICROBANK_DATABASE", default_value = "microbank.db")]
    pub database: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "MICROBANK_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// How long a write waits for the database lock, in milliseconds
    #[arg(long, env = "MICROBANK_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: AccountId,

        /// Destination account ID
        #[arg(long)]
        to: AccountId,

        /// Currency both accounts are held in
        #[arg(short, long)]
        currency: String,

        /// Require the source account to belong to this owner
        #[arg(long)]
        owner: Option<String>,
    },

    /// List entries recorded against an account
    Entries {
        /// Account ID
        account: AccountId,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },

    /// List transfers in or out of an account
    Transfers {
        /// Account ID
        account: AccountId,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account with a zero balance
    Create {
        /// Owner of the account
        owner: String,

        /// Currency code: USD, EUR or CAD
        #[arg(short, long, default_value = "EUR")]
        currency: String,
    },

    /// Show one account
    Show {
        /// Account ID
        id: AccountId,
    },

    /// List accounts
    List {
        /// Only accounts of this owner
        #[arg(long)]
        owner: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },

    /// Overwrite an account balance
    SetBalance {
        /// Account ID
        id: AccountId,

        /// New balance (e.g., "100.00")
        amount: String,
    },

    /// Delete an account
    Delete {
        /// Account ID
        id: AccountId,
    },
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_connections: self.max_connections,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..StoreConfig::for_path(&self.database)
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.store_config();
        let json = self.json;

        match self.command {
            Commands::Init => {
                let service = BankService::init(&config).await?;
                service.store().close().await;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(account_cmd) => {
                let service = connect(&config).await?;
                run_account_command(&service, account_cmd, json).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                currency,
                owner,
            } => {
                let service = connect(&config).await?;
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let result = service
                    .transfer(TransferRequest {
                        from_account_id: from,
                        to_account_id: to,
                        amount,
                        currency,
                        requested_by: owner,
                    })
                    .await?;

                if json {
                    print_json(&result)?;
                } else {
                    println!(
                        "Transfer {}: {} {} from #{} to #{}",
                        result.transfer.id,
                        format_cents(result.transfer.amount),
                        result.from_account.currency,
                        result.from_account.id,
                        result.to_account.id
                    );
                    println!(
                        "  #{} balance: {}",
                        result.from_account.id,
                        format_cents(result.from_account.balance)
                    );
                    println!(
                        "  #{} balance: {}",
                        result.to_account.id,
                        format_cents(result.to_account.balance)
                    );
                }
            }

            Commands::Entries {
                account,
                page,
                page_size,
            } => {
                let service = connect(&config).await?;
                let entries = service.account_entries(account, page, page_size).await?;
                if json {
                    print_json(&entries)?;
                } else {
                    print_entries(&entries);
                }
            }

            Commands::Transfers {
                account,
                page,
                page_size,
            } => {
                let service = connect(&config).await?;
                let transfers = service.account_transfers(account, page, page_size).await?;
                if json {
                    print_json(&transfers)?;
                } else {
                    print_transfers(&transfers);
                }
            }
        }

        Ok(())
    }
}

async fn connect(config: &StoreConfig) -> Result<BankService> {
    BankService::connect(config)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))
}

async fn run_account_command(
    service: &BankService,
    cmd: AccountCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        AccountCommands::Create { owner, currency } => {
            let account = service.create_account(&owner, &currency).await?;
            if json {
                print_json(&account)?;
            } else {
                println!(
                    "Created account #{} for {} ({})",
                    account.id, account.owner, account.currency
                );
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            if json {
                print_json(&account)?;
            } else {
                println!("Account:  #{}", account.id);
                println!("Owner:    {}", account.owner);
                println!("Currency: {}", account.currency);
                println!("Balance:  {}", format_cents(account.balance));
                println!("Created:  {}", account.created_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        AccountCommands::List {
            owner,
            page,
            page_size,
        } => {
            let accounts = service
                .list_accounts(owner.as_deref(), page, page_size)
                .await?;
            if json {
                print_json(&accounts)?;
            } else {
                print_accounts(&accounts);
            }
        }

        AccountCommands::SetBalance { id, amount } => {
            let balance =
                parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
            let account = service.set_balance(id, balance).await?;
            if json {
                print_json(&account)?;
            } else {
                println!(
                    "Account #{} balance set to {}",
                    account.id,
                    format_cents(account.balance)
                );
            }
        }

        AccountCommands::Delete { id } => {
            service.delete_account(id).await?;
            println!("Deleted account #{}", id);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode JSON")?;
    println!("{}", out);
    Ok(())
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts found.");
        return;
    }

    println!("{:<8} {:<20} {:<8} {:>14}", "ID", "OWNER", "CURRENCY", "BALANCE");
    println!("{}", "-".repeat(53));
    for account in accounts {
        println!(
            "{:<8} {:<20} {:<8} {:>14}",
            account.id,
            truncate(&account.owner, 20),
            account.currency,
            format_cents(account.balance)
        );
    }
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No entries found.");
        return;
    }

    println!("{:<8} {:<19} {:>14}", "ID", "DATE", "AMOUNT");
    println!("{}", "-".repeat(43));
    for entry in entries {
        println!(
            "{:<8} {:<19} {:>14}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            format_cents(entry.amount)
        );
    }
}

fn print_transfers(transfers: &[Transfer]) {
    if transfers.is_empty() {
        println!("No transfers found.");
        return;
    }

    println!(
        "{:<8} {:<19} {:>8} {:>8} {:>14}",
        "ID", "DATE", "FROM", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(61));
    for transfer in transfers {
        println!(
            "{:<8} {:<19} {:>8} {:>8} {:>14}",
            transfer.id,
            transfer.created_at.format("%Y-%m-%d %H:%M:%S"),
            transfer.from_account_id,
            transfer.to_account_id,
            format_cents(transfer.amount)
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("alice", 20), "alice");
        assert_eq!(truncate("a-very-long-owner-name-here", 10), "a-very-...");
    }

    #[test]
    fn test_parse_transfer_command() {
        let cli = Cli::try_parse_from([
            "microbank",
            "--database",
            "bank.db",
            "transfer",
            "12.50",
            "--from",
            "1",
            "--to",
            "2",
            "--currency",
            "EUR",
        ]);
        let cli = match cli {
            Ok(cli) => cli,
            Err(err) => panic!("failed to parse: {err}"),
        };

        assert_eq!(cli.store_config().database_url, "sqlite:bank.db");
        match cli.command {
            Commands::Transfer {
                amount, from, to, ..
            } => {
                assert_eq!(amount, "12.50");
                assert_eq!(from, 1);
                assert_eq!(to, 2);
            }
            _ => panic!("expected transfer command"),
        }
    }

    #[test]
    fn test_store_config_from_flags() {
        let cli = Cli::try_parse_from([
            "microbank",
            "--database",
            "x.db",
            "--max-connections",
            "9",
            "--busy-timeout-ms",
            "250",
            "init",
        ]);
        let config = match cli {
            Ok(cli) => cli.store_config(),
            Err(err) => panic!("failed to parse: {err}"),
        };

        assert_eq!(config.max_connections, 9);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(!config.create_if_missing);
    }
}
