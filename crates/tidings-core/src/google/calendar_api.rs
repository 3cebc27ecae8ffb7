//! Google Calendar API v3 tool
//!
//! Provides event operations on one calendar:
//! - Create an event from a caller-supplied event resource
//! - List upcoming events
//! - Delete an event

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::client::{get_paginated, ApiError, ApiRequest, ApiTransport};
use super::common::path_segment;
use super::executor::run_authorized;
use crate::auth::{AuthStatus, CredentialManager, ManagerConfig};
use crate::clock::Clock;
use crate::common::OperationResult;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub const CALENDAR_SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

pub const PRIMARY_CALENDAR: &str = "primary";

pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedEvent {
    pub event_id: String,
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventList {
    pub events: Vec<Value>,
}

pub struct CalendarTool {
    credentials: Arc<CredentialManager>,
    transport: Arc<dyn ApiTransport>,
    clock: Arc<dyn Clock>,
}

impl CalendarTool {
    pub fn new(
        credentials: Arc<CredentialManager>,
        transport: Arc<dyn ApiTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            transport,
            clock,
        }
    }

    /// Credential manager settings for a Calendar tool instance.
    pub fn manager_config(
        app_credentials_path: PathBuf,
        token_path: PathBuf,
        auth_timeout: Duration,
    ) -> ManagerConfig {
        ManagerConfig {
            service: "Google Calendar".to_string(),
            scopes: CALENDAR_SCOPES.iter().map(|s| s.to_string()).collect(),
            token_path,
            app_credentials_path,
            auth_timeout,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub async fn get_auth_status(&self) -> AuthStatus {
        self.credentials.get_status().await
    }

    pub async fn authenticate(&self) -> OperationResult<()> {
        self.credentials.authenticate().await
    }

    /// Create an event
    ///
    /// # Arguments
    /// * `calendar_id` - Calendar ID (use "primary" for user's primary calendar)
    /// * `event` - Event resource, passed through to the API unchanged
    /// * `send_notifications` - Whether attendees are notified
    pub async fn create_event(
        &self,
        calendar_id: &str,
        event: &Value,
        send_notifications: bool,
    ) -> OperationResult<CreatedEvent> {
        run_authorized(&self.credentials, "create_event", |token| async move {
            info!("Creating event in calendar: {}", calendar_id);

            let url = format!(
                "{}/calendars/{}/events",
                CALENDAR_API_BASE,
                path_segment(calendar_id)
            );
            let request = ApiRequest::post(url, event.clone()).query(
                "sendUpdates",
                if send_notifications { "all" } else { "none" },
            );
            let response = self.transport.execute(&token, request).await?;

            let event_id = response
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ApiError::Decode("created event has no id".to_string()))?
                .to_string();
            let html_link = response
                .get("htmlLink")
                .and_then(Value::as_str)
                .map(String::from);

            info!("Event created successfully");
            Ok::<_, ApiError>((
                CreatedEvent {
                    event_id,
                    html_link,
                },
                "Event created successfully.".to_string(),
            ))
        })
        .await
    }

    /// List events in start-time order, recurring events expanded.
    ///
    /// # Arguments
    /// * `time_min` - Lower bound (RFC3339); defaults to the current instant
    /// * `time_max` - Upper bound (RFC3339); none when absent
    pub async fn list_events(
        &self,
        calendar_id: &str,
        max_results: usize,
        time_min: Option<&str>,
        time_max: Option<&str>,
    ) -> OperationResult<EventList> {
        run_authorized(&self.credentials, "list_events", |token| async move {
            info!("Listing events for calendar: {}", calendar_id);

            let time_min = match time_min {
                Some(min) => min.to_string(),
                None => self
                    .clock
                    .now()
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            };

            let url = format!(
                "{}/calendars/{}/events",
                CALENDAR_API_BASE,
                path_segment(calendar_id)
            );
            let mut request = ApiRequest::get(url)
                .query("timeMin", time_min)
                .query("singleEvents", "true")
                .query("orderBy", "startTime");
            if let Some(max) = time_max {
                request = request.query("timeMax", max);
            }

            let events =
                get_paginated(self.transport.as_ref(), &token, request, "items", max_results)
                    .await?;

            debug!("Retrieved {} events", events.len());
            let message = format!("Retrieved {} events.", events.len());
            Ok::<_, ApiError>((EventList { events }, message))
        })
        .await
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> OperationResult<()> {
        run_authorized(&self.credentials, "delete_event", |token| async move {
            info!("Deleting event: {} from calendar: {}", event_id, calendar_id);

            let url = format!(
                "{}/calendars/{}/events/{}",
                CALENDAR_API_BASE,
                path_segment(calendar_id),
                path_segment(event_id)
            );
            self.transport
                .execute(&token, ApiRequest::delete(url))
                .await?;

            info!("Event deleted successfully");
            Ok::<_, ApiError>(((), "Event deleted successfully.".to_string()))
        })
        .await
    }
}
