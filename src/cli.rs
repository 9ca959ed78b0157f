use clap::{Parser, Subcommand};

/// Single-page chat with a Gemini model
#[derive(Debug, Parser)]
#[command(name = "gemini-chat")]
#[command(version)]
#[command(about = "Single-page chat with a Gemini model", long_about = None)]
pub struct Args {
    /// Model name
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Provider: "google" or "stub" (default: config/provider or "google")
    #[arg(long = "provider", global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the chat page over HTTP (default)
    Serve {
        /// Listen address (default: config server.bind or 127.0.0.1:8501)
        #[arg(long = "bind", value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Run an interactive terminal chat UI
    #[cfg(feature = "tui")]
    Tui,
}
