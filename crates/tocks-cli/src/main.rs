//! Tocks session driver.
//!
//! Reads one command per line from stdin and prints notifications and unread
//! counts as the session produces them. Read times and messages live in a
//! redb file, so a restarted driver replays what was left unread.
//!
//! # Usage
//!
//! ```bash
//! tocks --db tocks.redb
//! > login 1 100 alice 7=bob
//! > recv 1 7 1 Hello!
//! [unread] 1/7 1
//! [notify] Message received from bob
//!          Hello!
//! > read 1 7
//! > history 1 7 20
//! [history] 1/7 no older messages
//! ```

mod commands;
mod driver;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tocks_app::{RedbStorage, RetryPolicy, Session, SessionConfig, SystemEnv};
use tocks_core::MAX_MESSAGE_LEN;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::driver::{Driver, Flow};

/// Tocks messaging session driver
#[derive(Parser, Debug)]
#[command(name = "tocks")]
#[command(about = "Drive a tocks messaging session from stdin")]
#[command(version)]
struct Args {
    /// Path to the redb database
    #[arg(long, default_value = "tocks.redb")]
    db: PathBuf,

    /// Quiet period before a mark-read is written, in milliseconds
    #[arg(long, default_value = "300")]
    debounce_ms: u64,

    /// Longest a mark-read may be delayed by continuous reads, in milliseconds
    #[arg(long, default_value = "1200")]
    debounce_max_ms: u64,

    /// Most recent unread messages replayed per chat at login
    #[arg(long, default_value = "500")]
    replay_cap: usize,

    /// Longest sent message in bytes; longer text is split
    #[arg(long, default_value_t = MAX_MESSAGE_LEN)]
    max_message_len: usize,

    /// Attempts per durable write before reporting failure
    #[arg(long, default_value = "5")]
    write_attempts: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            debounce_max_delay: Duration::from_millis(self.debounce_max_ms),
            history_replay_cap: self.replay_cap,
            retry: RetryPolicy { max_attempts: self.write_attempts.max(1), ..RetryPolicy::default() },
            ..SessionConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let storage = RedbStorage::open(&args.db)?;
    tracing::info!(db = %args.db.display(), "storage opened");

    let session = Session::start(args.session_config(), storage.clone(), SystemEnv::new());
    let printer = tokio::spawn(driver::print_signals(session.subscribe()));
    let driver =
        Driver::new(session, storage, SystemEnv::new()).with_max_message_len(args.max_message_len);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if driver.execute(commands::parse(&line)).await? == Flow::Quit {
            break;
        }
    }

    driver.shutdown().await?;
    printer.await?;
    tracing::info!("session closed");

    Ok(())
}
