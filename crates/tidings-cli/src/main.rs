mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{parse_event, CalendarCommand, Cli, Command, GmailCommand};
use tidings_core::{CancellationToken, OperationResult, Toolkit};

/// What gets printed, and whether the operation succeeded.
struct Outcome {
    success: bool,
    body: serde_json::Value,
}

impl Outcome {
    fn envelope<T: Serialize>(result: OperationResult<T>) -> Result<Self> {
        Ok(Self {
            success: result.is_success(),
            body: serde_json::to_value(&result)?,
        })
    }

    fn status<T: Serialize>(status: T) -> Result<Self> {
        Ok(Self {
            success: true,
            body: serde_json::to_value(status)?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    // stdout carries only the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config().context("Failed to load configuration")?;
    let toolkit = Toolkit::from_config(&config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let outcome = run(&toolkit, cli.command, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.body)?);

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(toolkit: &Toolkit, command: Command, cancel: CancellationToken) -> Result<Outcome> {
    match command {
        Command::Gmail(command) => {
            let gmail = &toolkit.gmail;
            match command {
                GmailCommand::Status => Outcome::status(gmail.get_auth_status().await),
                GmailCommand::Auth => {
                    info!("Opening browser for Gmail sign-in");
                    Outcome::envelope(gmail.credentials().authenticate_with_cancel(cancel).await)
                }
                GmailCommand::Send(args) => {
                    Outcome::envelope(gmail.send_email(&args.into()).await)
                }
                GmailCommand::List {
                    query,
                    max_results,
                    include_body,
                } => Outcome::envelope(
                    gmail
                        .retrieve_emails(query.as_deref(), max_results, include_body)
                        .await,
                ),
            }
        }
        Command::Calendar(command) => {
            let calendar = &toolkit.calendar;
            match command {
                CalendarCommand::Status => Outcome::status(calendar.get_auth_status().await),
                CalendarCommand::Auth => {
                    info!("Opening browser for Google Calendar sign-in");
                    Outcome::envelope(calendar.credentials().authenticate_with_cancel(cancel).await)
                }
                CalendarCommand::Create {
                    event,
                    calendar_id,
                    no_notify,
                } => {
                    let event = parse_event(&event)?;
                    Outcome::envelope(calendar.create_event(&calendar_id, &event, !no_notify).await)
                }
                CalendarCommand::List {
                    calendar_id,
                    max_results,
                    time_min,
                    time_max,
                } => Outcome::envelope(
                    calendar
                        .list_events(
                            &calendar_id,
                            max_results,
                            time_min.as_deref(),
                            time_max.as_deref(),
                        )
                        .await,
                ),
                CalendarCommand::Delete {
                    event_id,
                    calendar_id,
                } => Outcome::envelope(calendar.delete_event(&calendar_id, &event_id).await),
            }
        }
    }
}
