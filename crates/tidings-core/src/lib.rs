//! Tidings core
//!
//! Credentialed access to Gmail and Google Calendar: OAuth credential
//! lifecycle, the interactive consent flow, and the tool operations, which
//! always answer with an [`OperationResult`] envelope.

pub mod auth;
pub mod clock;
pub mod common;
pub mod config;
pub mod google;
pub mod toolkit;

#[cfg(test)]
mod test_support;

pub use auth::{AuthStatus, CredentialManager, ManagerConfig};
pub use common::{ErrorCode, OperationResult};
pub use config::{ConfigError, TidingsConfig};
pub use google::calendar_api::{CreatedEvent, EventList};
pub use google::gmail::{EmailSummary, RetrievedEmails, SendEmail, SentEmail};
pub use google::{CalendarTool, GmailTool};
pub use toolkit::{Toolkit, ToolkitError};
pub use tokio_util::sync::CancellationToken;
