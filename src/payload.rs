//! Wire payloads — the inbound request, the typed action it decodes to, and
//! the normalized response every path answers with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BrokerError;

/// Largest inbound body accepted, in bytes (1 MiB).
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Credentials forwarded to the authentication service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub email: String,
    pub password: String,
}

/// A log entry. Every log transport carries exactly these two fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub name: String,
    pub data: String,
}

/// A mail to hand to the mail service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub message: String,
}

/// The inbound request as it arrives on the wire.
///
/// ```json
/// { "action": "mail", "mail": { "from": "a@x", "to": "b@x", "subject": "hi", "message": "…" } }
/// ```
///
/// Only the payload matching `action` is read; the others are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailPayload>,
}

impl InboundRequest {
    /// Decode a request body.
    ///
    /// Rejects bodies over [`MAX_BODY_BYTES`] and bodies holding more than
    /// one JSON value.
    pub fn from_slice(body: &[u8]) -> Result<Self, BrokerError> {
        if body.len() > MAX_BODY_BYTES {
            return Err(BrokerError::Decode("request body too large".into()));
        }

        let mut de = serde_json::Deserializer::from_slice(body);
        let request = Self::deserialize(&mut de)?;
        de.end()
            .map_err(|_| BrokerError::Decode("body must have only a single JSON value".into()))?;
        Ok(request)
    }
}

/// A decoded action, each variant carrying its own payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Auth(AuthPayload),
    Log(LogMessage),
    Mail(MailPayload),
}

impl Action {
    /// The wire tag for this action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Auth(_) => "auth",
            Action::Log(_) => "log",
            Action::Mail(_) => "mail",
        }
    }
}

impl TryFrom<InboundRequest> for Action {
    type Error = BrokerError;

    fn try_from(request: InboundRequest) -> Result<Self, Self::Error> {
        fn require<T>(payload: Option<T>, action: &str) -> Result<T, BrokerError> {
            payload.ok_or_else(|| BrokerError::Decode(format!("missing {} payload", action)))
        }

        match request.action.as_str() {
            "auth" => Ok(Action::Auth(require(request.auth, "auth")?)),
            "log" => Ok(Action::Log(require(request.log, "log")?)),
            "mail" => Ok(Action::Mail(require(request.mail, "mail")?)),
            _ => Err(BrokerError::UnknownAction(request.action)),
        }
    }
}

/// The single response shape returned to callers, whatever transport ran.
///
/// `failed` travels as `"error"` so the broker speaks the same shape the
/// downstream services answer with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    #[serde(rename = "error", default)]
    pub failed: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl NormalizedResponse {
    /// A successful response.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            failed: false,
            message: message.into(),
            data: None,
        }
    }

    /// A failed response.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a data value.
    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }
}

impl From<&BrokerError> for NormalizedResponse {
    fn from(err: &BrokerError) -> Self {
        NormalizedResponse::fail(err.to_string())
    }
}
