use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;

mod auth;
mod config;
mod home;
mod reply;
mod run;

use tally_core::StateStore;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Budget transaction categorization agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One categorization run: fetch, suggest, post the batch, persist
    Run {
        /// Override the configured lookback window (days)
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Print the batch message without posting or persisting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Process an approval reply against the oldest pending batch
    Reply {
        /// The reply text (e.g. "approve all", "1: Groceries")
        text: Option<String>,

        /// Read the reply text from stdin instead
        #[arg(long)]
        stdin: bool,
    },

    /// Show processed count, learned patterns, and pending batches
    Status,

    /// Config management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Store credentials in ~/.tally/auth.json
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.tally/config.toml
    Init,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Paste the budget service bearer token
    PasteBudgetToken,
    /// Paste the chat bot token
    PasteChatToken,
    /// Paste the categorization model API key
    PasteModelKey,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    match cli.command {
        Command::Run {
            lookback_days,
            dry_run,
        } => {
            run::run_pipeline(&cfg, lookback_days, dry_run).await?;
        }

        Command::Reply { text, stdin } => {
            let text = if stdin {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("read reply from stdin")?;
                buf
            } else {
                text.context("pass the reply text, or --stdin")?
            };
            reply::handle_reply(&cfg, &text).await?;
        }

        Command::Status => {
            print_status()?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
        },

        Command::Auth { command } => match command {
            AuthCommand::PasteBudgetToken => auth::paste_budget_token()?,
            AuthCommand::PasteChatToken => auth::paste_chat_token()?,
            AuthCommand::PasteModelKey => auth::paste_model_key()?,
        },
    }

    Ok(())
}

fn print_status() -> Result<()> {
    let store = StateStore::load(home::state_path()?)?;

    println!("Processed transactions: {}", store.processed_count());

    let patterns = store.patterns();
    println!("Learned patterns: {}", patterns.len());
    for e in patterns.entries() {
        println!("  {} → {}", e.merchant, e.category);
    }

    let pending = store.pending_batches();
    println!("Pending batches: {}", pending.len());
    for b in pending {
        println!(
            "  {} — {} transaction(s), created {}",
            b.id,
            b.suggestions.len(),
            b.created_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}
