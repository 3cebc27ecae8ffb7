use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use tidings_core::config::TidingsConfig;
use tidings_core::google::{calendar_api, gmail};

#[derive(Parser, Debug)]
#[command(name = "tidings", version, about = "Gmail and Google Calendar from the command line")]
pub struct Cli {
    /// Config file (default: ~/.tidings/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Google client-secret file for the registered application
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    #[arg(long, global = true)]
    pub gmail_token: Option<PathBuf>,

    #[arg(long, global = true)]
    pub calendar_token: Option<PathBuf>,

    /// Seconds to wait for the browser sign-in
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub auth_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Gmail operations
    #[command(subcommand)]
    Gmail(GmailCommand),
    /// Google Calendar operations
    #[command(subcommand)]
    Calendar(CalendarCommand),
}

#[derive(Subcommand, Debug)]
pub enum GmailCommand {
    /// Show the stored credential's state
    Status,
    /// Sign in through the browser
    Auth,
    /// Send a plain-text email
    Send(SendArgs),
    /// List emails matching a search query
    List {
        /// Gmail search query, e.g. "is:unread from:alice@example.com"
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = gmail::DEFAULT_MAX_RESULTS)]
        max_results: usize,
        #[arg(long)]
        include_body: bool,
    },
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[arg(long, required = true)]
    pub to: Vec<String>,
    #[arg(long)]
    pub subject: String,
    #[arg(long)]
    pub body: String,
    #[arg(long)]
    pub cc: Vec<String>,
    #[arg(long)]
    pub bcc: Vec<String>,
    #[arg(long)]
    pub from: Option<String>,
}

impl From<SendArgs> for gmail::SendEmail {
    fn from(args: SendArgs) -> Self {
        Self {
            to: args.to,
            subject: args.subject,
            body: args.body,
            cc: args.cc,
            bcc: args.bcc,
            from: args.from,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// Show the stored credential's state
    Status,
    /// Sign in through the browser
    Auth,
    /// Create an event
    Create {
        /// Event resource as JSON, or @FILE to read it from a file
        #[arg(long)]
        event: String,
        #[arg(long, default_value = calendar_api::PRIMARY_CALENDAR)]
        calendar_id: String,
        /// Do not email attendees
        #[arg(long)]
        no_notify: bool,
    },
    /// List upcoming events
    List {
        #[arg(long, default_value = calendar_api::PRIMARY_CALENDAR)]
        calendar_id: String,
        #[arg(long, default_value_t = calendar_api::DEFAULT_MAX_RESULTS)]
        max_results: usize,
        /// RFC 3339 lower bound (default: now)
        #[arg(long)]
        time_min: Option<String>,
        /// RFC 3339 upper bound
        #[arg(long)]
        time_max: Option<String>,
    },
    /// Delete an event
    Delete {
        #[arg(long)]
        event_id: String,
        #[arg(long, default_value = calendar_api::PRIMARY_CALENDAR)]
        calendar_id: String,
    },
}

impl Cli {
    /// Config file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<TidingsConfig> {
        let mut config = TidingsConfig::load(self.config.as_deref())?;
        config.apply_env()?;
        self.apply_flags(&mut config);
        Ok(config)
    }

    fn apply_flags(&self, config: &mut TidingsConfig) {
        if let Some(path) = &self.credentials {
            config.credentials_path = path.clone();
        }
        if let Some(path) = &self.gmail_token {
            config.gmail_token_path = path.clone();
        }
        if let Some(path) = &self.calendar_token {
            config.calendar_token_path = path.clone();
        }
        if let Some(secs) = self.auth_timeout {
            config.auth_timeout_secs = secs;
        }
    }
}

/// Inline JSON, or `@path` naming a JSON file.
pub fn parse_event(arg: &str) -> Result<Value> {
    let content = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path))?,
        None => arg.to_string(),
    };
    let event: Value = serde_json::from_str(&content).context("Event is not valid JSON")?;
    anyhow::ensure!(event.is_object(), "Event must be a JSON object");
    Ok(event)
}
