//! CLI command definitions and dispatch for the `duo` binary.
//!
//! Uses clap derive macros for argument parsing. Commands that act on behalf
//! of a user take `--as <email|username|id>`; the CLI signs that user in
//! locally since there is no remote identity provider.

pub mod chat;
pub mod conversation;
pub mod user;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Two-party chat over a document store.
#[derive(Parser)]
#[command(name = "duo", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage directory entries.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// List the conversations a user takes part in.
    #[command(alias = "ls")]
    Conversations {
        /// Acting user (email, username or id).
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },

    /// Find or create the conversation with a partner and print its history.
    Open {
        /// Partner email or username.
        partner: String,

        /// Acting user (email, username or id).
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },

    /// Send one message to a partner.
    Send {
        /// Partner email or username.
        partner: String,

        /// Message text.
        text: String,

        /// Acting user (email, username or id).
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },

    /// Start an interactive chat with a partner.
    Chat {
        /// Partner email or username.
        partner: String,

        /// Acting user (email, username or id).
        #[arg(long = "as", value_name = "USER")]
        as_user: String,
    },

    /// Start the REST and WebSocket server.
    Serve {
        /// Port to listen on. Defaults to `server.port` from config.toml.
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to. Defaults to `server.host` from config.toml.
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user profile.
    Add {
        /// Email address (unique).
        #[arg(long)]
        email: String,

        /// Username (unique).
        #[arg(long)]
        username: String,

        /// Stable id from the identity provider. Generated when omitted.
        #[arg(long)]
        id: Option<String>,
    },

    /// Show a user by email, username or id.
    Show {
        identifier: String,
    },
}
