//! Google API tools
//!
//! The Gmail and Calendar tool instances. Each pairs its own credential
//! manager with a shared [`ApiTransport`](client::ApiTransport).

pub mod calendar_api;
pub mod client;
pub mod common;
pub(crate) mod executor;
pub mod gmail;

pub use calendar_api::CalendarTool;
pub use client::{ApiError, ApiRequest, ApiTransport, GoogleClient, HttpMethod};
pub use gmail::GmailTool;
