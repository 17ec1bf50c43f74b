//! Synchronous HTTP adapter — JSON POST to the downstream services.
//!
//! Each endpoint has exactly one expected success status. Anything else is
//! an error; a 401 from the authentication service is reported as invalid
//! credentials rather than a generic failure.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::error::BrokerError;
use crate::payload::{AuthPayload, LogMessage, MailPayload, NormalizedResponse};

/// A downstream HTTP endpoint and the status it answers with on success.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Short service name used in error messages.
    pub service: &'static str,
    pub url: String,
    pub expect: StatusCode,
    /// Whether a 401 from this endpoint means the caller's credentials were refused.
    pub checks_credentials: bool,
}

impl Endpoint {
    pub fn new(service: &'static str, url: impl Into<String>, expect: StatusCode) -> Self {
        Self {
            service,
            url: url.into(),
            expect,
            checks_credentials: false,
        }
    }

    fn checking_credentials(mut self) -> Self {
        self.checks_credentials = true;
        self
    }
}

/// HTTP client for the authentication, logger and mail services.
///
/// Wraps one shared `reqwest::Client`; safe to use from concurrent requests.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
    auth: Endpoint,
    log: Endpoint,
    mail: Endpoint,
}

impl ServiceClient {
    /// Build a client whose requests are bounded by `timeout`.
    pub fn new(
        auth_url: impl Into<String>,
        log_url: impl Into<String>,
        mail_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            auth: Endpoint::new("auth", auth_url, StatusCode::ACCEPTED).checking_credentials(),
            log: Endpoint::new("logger", log_url, StatusCode::ACCEPTED),
            mail: Endpoint::new("mail", mail_url, StatusCode::ACCEPTED),
        })
    }

    /// Check credentials with the authentication service.
    ///
    /// On success the downstream `data` (the authenticated user) is passed
    /// through.
    pub async fn authenticate(&self, payload: &AuthPayload) -> Result<NormalizedResponse, BrokerError> {
        let downstream = self.post(&self.auth, payload).await?;
        if downstream.failed {
            return Err(BrokerError::InvalidCredentials);
        }
        Ok(NormalizedResponse::ok("Authenticated!").with_data(downstream.data))
    }

    /// Write a log entry through the logger's HTTP endpoint.
    pub async fn write_log(&self, entry: &LogMessage) -> Result<NormalizedResponse, BrokerError> {
        self.post(&self.log, entry).await?;
        Ok(NormalizedResponse::ok("logged"))
    }

    /// Hand a mail to the mail service.
    pub async fn send_mail(&self, mail: &MailPayload) -> Result<NormalizedResponse, BrokerError> {
        self.post(&self.mail, mail).await?;
        Ok(NormalizedResponse::ok(format!("Message sent to {}", mail.to)))
    }

    /// POST `body` as JSON and decode the downstream response on the
    /// expected status.
    async fn post<T: Serialize>(
        &self,
        endpoint: &Endpoint,
        body: &T,
    ) -> Result<NormalizedResponse, BrokerError> {
        let response = self.client.post(&endpoint.url).json(body).send().await?;
        let status = response.status();
        debug!(service = endpoint.service, status = status.as_u16(), "downstream answered");

        if endpoint.checks_credentials && status == StatusCode::UNAUTHORIZED {
            return Err(BrokerError::InvalidCredentials);
        }
        if status != endpoint.expect {
            return Err(BrokerError::Rejected(format!(
                "error calling {} service",
                endpoint.service
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(NormalizedResponse::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            BrokerError::Rejected(format!(
                "malformed response from {} service: {}",
                endpoint.service, e
            ))
        })
    }
}
