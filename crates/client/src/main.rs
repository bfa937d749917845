//! `tally`: command-line front end for the ledger client.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tally_client::{AuthError, ClientConfig, Ledger, TallyClient};
use tally_core::transaction::{format_amount, timestamp};
use tally_core::{Credentials, TransactionDraft, TransactionId, TransactionKind};

#[derive(Debug, Parser)]
#[command(name = "tally", about = "Personal transaction ledger client")]
struct Cli {
    /// Override the API base endpoint.
    #[arg(long, global = true, env = "TALLY_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and remember the session.
    Login(AuthArgs),
    /// Create an account (does not log in).
    Register(AuthArgs),
    /// Forget the stored session.
    Logout,
    /// Show whether a session is active.
    Status,
    /// Print the ledger.
    List,
    /// Record a transaction.
    Add(DraftArgs),
    /// Replace the fields of an existing transaction.
    Update {
        id: String,
        #[command(flatten)]
        draft: DraftArgs,
    },
    /// Delete a transaction by id.
    Remove { id: String },
}

#[derive(Debug, clap::Args)]
struct AuthArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "TALLY_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, clap::Args)]
struct DraftArgs {
    #[arg(long = "type", value_parser = parse_kind)]
    kind: TransactionKind,
    #[arg(long)]
    category: String,
    #[arg(long)]
    amount: String,
    #[arg(long, default_value = "")]
    note: String,
    /// When it happened (RFC 3339 or `YYYY-MM-DD`); defaults to now.
    #[arg(long, value_parser = parse_date)]
    date: Option<DateTime<Utc>>,
}

impl DraftArgs {
    fn into_draft(self) -> Result<TransactionDraft> {
        let draft = TransactionDraft::parse(self.kind, self.category, &self.amount, self.note)?;
        Ok(match self.date {
            Some(date) => draft.with_date(date),
            None => draft,
        })
    }
}

impl AuthArgs {
    fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    timestamp::parse(raw).ok_or_else(|| format!("unrecognized date: {raw}"))
}

fn parse_kind(raw: &str) -> Result<TransactionKind, String> {
    raw.parse().map_err(|e: tally_core::DomainError| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tally_observability::init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }

    let mut client = TallyClient::from_config(&config);
    client.start().await;

    match cli.command {
        Command::Login(args) => {
            report_auth(client.login(&args.credentials()).await)?;
            println!("Logged in. {} transaction(s).", client.ledger().len());
        }
        Command::Register(args) => {
            report_auth(client.register(&args.credentials()).await)?;
            println!("Registered. You can now log in.");
        }
        Command::Logout => {
            client.logout().await.context("failed to clear session")?;
            println!("Logged out.");
        }
        Command::Status => {
            if client.is_authenticated() {
                println!("Logged in ({} API).", config.api_url);
            } else {
                println!("Not logged in.");
            }
        }
        Command::List => {
            require_session(&client)?;
            print_ledger(&client.ledger());
        }
        Command::Add(args) => {
            require_session(&client)?;
            let draft = args.into_draft()?;
            client.add(&draft).await.context("could not add transaction")?;
            print_ledger(&client.ledger());
        }
        Command::Update { id, draft } => {
            require_session(&client)?;
            let id: TransactionId = id.parse()?;
            let draft = draft.into_draft()?;
            client.update(&id, &draft).await.context("could not update transaction")?;
            print_ledger(&client.ledger());
        }
        Command::Remove { id } => {
            require_session(&client)?;
            let id: TransactionId = id.parse()?;
            client.remove(&id).await.context("could not remove transaction")?;
            print_ledger(&client.ledger());
        }
    }

    Ok(())
}

/// Auth failures are the one error path shown to the user verbatim.
fn report_auth(result: Result<(), AuthError>) -> Result<()> {
    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
    Ok(())
}

fn require_session(client: &TallyClient) -> Result<()> {
    if !client.is_authenticated() {
        bail!("not logged in; run `tally login` first");
    }
    Ok(())
}

fn print_ledger(ledger: &Ledger) {
    if ledger.is_empty() {
        println!("No transactions.");
        return;
    }

    println!("{:<8} {:<10} {:<10} {:<16} {:>12}  NOTE", "ID", "DATE", "TYPE", "CATEGORY", "AMOUNT");
    for tx in ledger.iter() {
        println!(
            "{:<8} {:<10} {:<10} {:<16} {:>12}  {}",
            tx.id.to_string(),
            tx.date.format("%Y-%m-%d").to_string(),
            tx.kind.as_str(),
            tx.category,
            tx.display_amount(),
            tx.note.as_deref().unwrap_or(""),
        );
    }

    match ledger.totals() {
        Some(totals) => println!(
            "\nincome {}  expense {}  balance {}",
            format_amount(totals.income),
            format_amount(totals.expense),
            format_amount(totals.balance),
        ),
        None => println!("\ntotals out of range"),
    }
}
