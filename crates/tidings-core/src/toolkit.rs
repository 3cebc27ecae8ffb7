//! Tool assembly
//!
//! Builds the Gmail and Calendar tool instances from configuration. Both
//! share one API transport and one OAuth provider; each gets its own
//! credential manager and token store.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::auth::flow::{BrowserLauncher, SystemBrowser};
use crate::auth::provider::google::GoogleProvider;
use crate::auth::provider::OAuthProvider;
use crate::auth::CredentialManager;
use crate::clock::{Clock, SystemClock};
use crate::config::TidingsConfig;
use crate::google::{ApiTransport, CalendarTool, GmailTool, GoogleClient};

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct Toolkit {
    pub gmail: GmailTool,
    pub calendar: CalendarTool,
}

impl Toolkit {
    /// Production wiring: Google endpoints, the system browser and wall clock.
    pub async fn from_config(config: &TidingsConfig) -> Result<Self, ToolkitError> {
        let provider: Arc<dyn OAuthProvider> = Arc::new(GoogleProvider::new()?);
        let transport: Arc<dyn ApiTransport> = Arc::new(GoogleClient::new()?);
        Ok(Self::with_parts(
            config,
            provider,
            Arc::new(SystemBrowser),
            transport,
            Arc::new(SystemClock),
        )
        .await)
    }

    /// Assemble both tools and load their stored credentials.
    pub async fn with_parts(
        config: &TidingsConfig,
        provider: Arc<dyn OAuthProvider>,
        launcher: Arc<dyn BrowserLauncher>,
        transport: Arc<dyn ApiTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let gmail_credentials = Arc::new(CredentialManager::new(
            GmailTool::manager_config(
                config.credentials_path.clone(),
                config.gmail_token_path.clone(),
                config.auth_timeout(),
            ),
            provider.clone(),
            launcher.clone(),
            clock.clone(),
        ));
        let calendar_credentials = Arc::new(CredentialManager::new(
            CalendarTool::manager_config(
                config.credentials_path.clone(),
                config.calendar_token_path.clone(),
                config.auth_timeout(),
            ),
            provider,
            launcher,
            clock.clone(),
        ));

        gmail_credentials.load().await;
        calendar_credentials.load().await;
        info!("Gmail and Google Calendar tools ready");

        Self {
            gmail: GmailTool::new(gmail_credentials, transport.clone()),
            calendar: CalendarTool::new(calendar_credentials, transport, clock),
        }
    }
}
