use std::time::Duration;

use shared::{
    domain::{TripId, VehicleId},
    error::{ApiError, ApiException, ErrorCode},
};
use thiserror::Error;

const GENERIC_FAILURE_MESSAGE: &str = "the fleet service could not complete the request";

/// Legacy backends report business-rule rejections as free text only.
/// This table is the single place such text is interpreted; everything
/// past the transport sees an [`ErrorCode`].
const LEGACY_MESSAGE_CODES: &[(&str, ErrorCode)] = &[("lavado", ErrorCode::WashRequired)];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("vehicle {0} is not in the active fleet")]
    UnknownVehicle(VehicleId),
    #[error("trip {0} is not an open trip")]
    UnknownTrip(TripId),
    #[error("start odometer {entered} must match the vehicle's current odometer {current}")]
    OdometerMismatch { entered: f64, current: f64 },
    #[error("{field} must not be negative")]
    NegativeReading { field: &'static str },
    #[error("end odometer {end} is below the start odometer {start}")]
    EndBeforeStart { start: f64, end: f64 },
    #[error("trip {0} has no wash pending")]
    NoWashPending(TripId),
    #[error("at least one wash photo is required")]
    MissingWashPhotos,
    #[error("new password and confirmation do not match")]
    PasswordMismatch,
    #[error("{0} is not an image file")]
    NotAnImage(String),
    #[error("cannot {action} while the trip is {phase}")]
    InvalidPhase { action: &'static str, phase: String },
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("request rejected: {0}")]
    Api(#[from] ApiException),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("not logged in")]
    Unauthenticated,
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(rejection) => Some(rejection.code),
            ClientError::Unauthenticated => Some(ErrorCode::Unauthorized),
            ClientError::Validation(_) => Some(ErrorCode::Validation),
            _ => None,
        }
    }

    pub fn is_wash_required(&self) -> bool {
        self.code() == Some(ErrorCode::WashRequired)
    }

    /// Text shown to the operator: the server message when there is one,
    /// otherwise a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api(rejection) if !rejection.message.trim().is_empty() => {
                rejection.message.clone()
            }
            ClientError::Api(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Resolves a non-2xx response into a structured rejection. An explicit
/// `code` in the body wins, then the legacy message table, then the HTTP
/// status.
pub fn classify_rejection(status: u16, body: ApiError) -> ApiException {
    let message = body.message.unwrap_or_default();
    let code = body
        .code
        .or_else(|| legacy_code_for_message(&message))
        .unwrap_or_else(|| code_for_status(status));
    ApiException::new(status, code, message)
}

fn legacy_code_for_message(message: &str) -> Option<ErrorCode> {
    let lower = message.to_lowercase();
    LEGACY_MESSAGE_CODES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, code)| *code)
}

fn code_for_status(status: u16) -> ErrorCode {
    match status {
        401 => ErrorCode::Unauthorized,
        403 => ErrorCode::Forbidden,
        404 => ErrorCode::NotFound,
        409 => ErrorCode::Conflict,
        400 | 422 => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}
