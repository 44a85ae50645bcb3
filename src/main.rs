//! tallybot - chat plays, over Matrix.
//!
//! The bot reads a Matrix room, counts command votes such as `!forward` or
//! `!left` during fixed-length windows and, when a window closes, triggers
//! the command that received the most votes.
//!
//! # Configuration
//!
//! ```yaml
//! matrix:
//!   user_id: "@tallybot:matrix.org"
//!   password: "your-password"
//!   room_id: "!stream:matrix.org"
//!
//! voting:
//!   prefix: "!"
//!   commands: [forward, back, left, right]
//!   window_seconds: 10.0
//!   min_votes_threshold: 1
//! ```
//!
//! Any value can be overridden with a `TALLYBOT_` environment variable, e.g.
//! `TALLYBOT_MATRIX__PASSWORD`.
//!
//! # Usage
//!
//! ```bash
//! tallybot --config config.yaml --data ./tallybot-data
//! ```
//!
//! # Architecture
//!
//! - [`actions`] - what happens to a winning command
//! - [`bot`] - wiring between the chat and the aggregator
//! - [`config`] - YAML configuration with environment overrides
//! - [`matrix`] - Matrix login, session persistence and sync
//! - [`voting`] - command parsing, tallies, vote windows and winner selection
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`, `debug` logs every vote)

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use crate::{bot::Bot, config::Config};

mod actions;
mod bot;
mod config;
mod matrix;
mod voting;

/// Command-line arguments of the tallybot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: String,

    /// Directory for the Matrix session and SDK store.
    ///
    /// Contains the bot's access token: keep it private.
    #[arg(short, long)]
    data: String,
}

#[tokio::main]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting tallybot {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Invalid configuration stops the bot before any window opens
    let config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {}", e);
            std::process::exit(1);
        }
    };

    let bot = match Bot::new(config, &args.data).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to initialize bot: {}", e);
            std::process::exit(1);
        }
    };
    bot.start().await;

    info!("Goodbye!");
}
