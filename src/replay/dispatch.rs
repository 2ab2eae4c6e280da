//! Dispatcher: one HTTP POST per event record.
//!
//! A delivery never fails the run. Transport errors are reported as
//! `TRANSPORT_FAILURE` (0) and the caller keeps going.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::EventRecord;

/// Status reported when no HTTP response was received
pub const TRANSPORT_FAILURE: u16 = 0;

/// Per-request timeout for webhook deliveries
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub trait Dispatcher: Send + Sync {
    /// Deliver `record`, returning the HTTP status or `TRANSPORT_FAILURE`
    fn dispatch(&self, record: &EventRecord) -> u16;
}

/// How a delivery ended, derived from its status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    HttpError,
    TransportFailure,
}

impl DispatchOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            TRANSPORT_FAILURE => DispatchOutcome::TransportFailure,
            200..=299 => DispatchOutcome::Delivered,
            _ => DispatchOutcome::HttpError,
        }
    }
}

/// Posts JSON payloads to a webhook URL with a blocking client
pub struct HttpDispatcher {
    client: Client,
    url: String,
}

impl HttpDispatcher {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Dispatcher for HttpDispatcher {
    fn dispatch(&self, record: &EventRecord) -> u16 {
        match self.client.post(&self.url).json(record).send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                // Drain the body so the connection can be reused
                let _ = resp.bytes();
                debug!(status, url = %self.url, "Webhook delivered");
                status
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "Webhook delivery failed");
                TRANSPORT_FAILURE
            }
        }
    }
}

/// Accepts everything without touching the network (dry runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn dispatch(&self, _record: &EventRecord) -> u16 {
        200
    }
}
