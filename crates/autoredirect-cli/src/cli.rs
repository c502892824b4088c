use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autoredirect",
    about = "autoredirect: encode, inspect and serve tamper-evident redirection tokens",
    version
)]
pub struct Cli {
    /// TOML configuration file (encryption_key, exclusions, ...)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log resolution decisions (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode a token that redirects to a URL
    EncodeUrl {
        /// Absolute URL or site-relative path
        url: String,
    },

    /// Encode a token that replays an operation
    EncodeOperation {
        /// Operation (controller) identifier
        #[arg(long)]
        operation: String,

        /// Action identifier
        #[arg(long)]
        action: String,

        /// HTTP method: GET, POST, PUT or DELETE
        #[arg(long, default_value = "GET")]
        method: String,

        /// Parameter as KEY=VALUE; bracketed keys nest (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Decode and verify a token
    Decode {
        /// Token as produced by encode-url / encode-operation
        #[arg(allow_hyphen_values = true)]
        token: String,

        /// Print the decrypted record exactly as stored
        #[arg(long, conflicts_with = "json")]
        raw: bool,

        /// Output as JSON, with nested tokens decoded
        #[arg(long)]
        json: bool,
    },

    /// Test a path against the configured exclusion rules
    CheckExclusion {
        /// Path to test, e.g. /login/login_form
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve the demo book store application
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: String,
    },
}
