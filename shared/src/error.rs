//! Error taxonomy for the dashboard core.
//!
//! Poll failures are [`TransportError`]s and only ever surface as the
//! connection marker. User actions fail with [`ActionError`], which always
//! becomes a status message. Nothing here is fatal.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::capabilities::{HttpError, HttpResponse};
use crate::snapshot::TaxiId;
use crate::truncate_reason;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    #[error("service unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("invalid response: {reason}")]
    Invalid { reason: String },
}

impl TransportError {
    /// Builds the error for a non-2xx response, preferring the server's own
    /// reason text.
    #[must_use]
    pub fn from_response(response: &HttpResponse) -> Self {
        let status = response.status();
        let reason =
            rejection_reason(response).unwrap_or_else(|| format!("HTTP error {status}"));
        Self::Status { status, reason }
    }

    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            Self::Unreachable { .. } => "Connection error: dispatch service unreachable".into(),
            Self::Status { status, .. } if *status >= 500 => {
                "Dispatch service error. Please try again.".into()
            }
            Self::Status { reason, .. } => reason.clone(),
            Self::Invalid { .. } => "Dispatch service sent an unexpected response".into(),
        }
    }
}

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::InvalidResponse { reason } => Self::Invalid { reason },
            other => Self::Unreachable {
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    CreateTaxi,
    DeleteTaxi,
    ConfigureSimulation,
    RequestTrip,
    RegisterClient,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTaxi => "taxi registration",
            Self::DeleteTaxi => "taxi deletion",
            Self::ConfigureSimulation => "simulation update",
            Self::RequestTrip => "trip request",
            Self::RegisterClient => "client registration",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The service answered but refused the command.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{action} rejected: {reason}")]
pub struct RejectedAction {
    pub action: ActionKind,
    pub reason: String,
}

impl RejectedAction {
    #[must_use]
    pub fn new(action: ActionKind, reason: impl AsRef<str>) -> Self {
        Self {
            action,
            reason: truncate_reason(reason.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(String),

    #[error("Taxi {0} is busy and cannot be deleted")]
    Busy(TaxiId),

    #[error("Delete already in progress for taxi {0}")]
    AlreadyPending(TaxiId),

    #[error(transparent)]
    Rejected(#[from] RejectedAction),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ActionError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Local refusals never reached the service.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Busy(_) | Self::AlreadyPending(_)
        )
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self {
            Self::Rejected(rejected) => rejected.reason.clone(),
            Self::Transport(transport) => transport.user_facing_message(),
            local => local.to_string(),
        }
    }
}

impl From<HttpError> for ActionError {
    fn from(err: HttpError) -> Self {
        if err.is_local() {
            Self::Validation(err.to_string())
        } else {
            Self::Transport(err.into())
        }
    }
}

/// A locally-derived field the core repaired after a snapshot replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalInvariantRepair {
    SelectionCleared { taxi_id: TaxiId },
    SimulationActiveSettled,
    SimulationIntervalSettled,
}

impl fmt::Display for LocalInvariantRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectionCleared { taxi_id } => {
                write!(f, "selected taxi {taxi_id} left the snapshot")
            }
            Self::SimulationActiveSettled => f.write_str("simulation toggle settled"),
            Self::SimulationIntervalSettled => f.write_str("simulation interval settled"),
        }
    }
}

/// Keys a service error body may carry its reason under, in priority order.
pub const REASON_KEYS: &[&str] = &["detail", "message", "mensaje", "error"];

fn reason_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(truncate_reason(text)),
        other => Some(truncate_reason(&other.to_string())),
    }
}

/// Extracts the human-readable reason from an error body. Takes the first
/// of [`REASON_KEYS`] holding usable text, or a plain text body.
#[must_use]
pub fn rejection_reason(response: &HttpResponse) -> Option<String> {
    if let Ok(body) = response.json::<Value>() {
        return match body {
            Value::Object(map) => REASON_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(reason_value)),
            Value::String(text) if !text.trim().is_empty() => Some(truncate_reason(&text)),
            _ => None,
        };
    }

    let text = response.body_string().ok()?;
    let text = text.trim();
    if text.is_empty() || text.starts_with('{') || text.starts_with('<') {
        return None;
    }
    Some(truncate_reason(text))
}
