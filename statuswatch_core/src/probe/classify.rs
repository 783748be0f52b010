//! Turns an HTTP outcome into a verdict

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::transport::{HttpResponse, TransportError};
use crate::config::TargetStatus;
use crate::models::{EndpointResult, ResultStatus, BODY_READ_ERROR_CODE, TRANSPORT_ERROR_CODE};

/// Checks a response against the endpoint's target rules.
///
/// Starts at healthy; each failing rule moves it to down and nothing moves
/// it back.
pub fn classify(target: &TargetStatus, code: u16, body: &[u8]) -> ResultStatus {
    let mut status = ResultStatus::Healthy;

    match target.code {
        None if !(200..300).contains(&code) => status = ResultStatus::Down,
        Some(expected) if code != expected => status = ResultStatus::Down,
        _ => {}
    }

    if let Some(expected) = &target.body {
        if body != expected.as_slice() {
            status = ResultStatus::Down;
        }
    }

    status
}

/// Builds the stored result for one completed probe.
pub fn evaluate(
    target: &TargetStatus,
    outcome: Result<HttpResponse, TransportError>,
    duration: Duration,
    at: DateTime<Utc>,
) -> EndpointResult {
    let (status, code, content_type, body) = match outcome {
        Ok(response) => {
            let status = classify(target, response.status, &response.body);
            (status, response.status, response.content_type, response.body)
        }
        Err(TransportError::Request(message)) => (
            ResultStatus::Down,
            TRANSPORT_ERROR_CODE,
            String::new(),
            message.into_bytes(),
        ),
        Err(TransportError::Body {
            content_type,
            message,
            ..
        }) => (
            ResultStatus::Down,
            BODY_READ_ERROR_CODE,
            content_type,
            message.into_bytes(),
        ),
    };

    EndpointResult {
        status,
        code,
        content_type,
        body,
        request_duration_seconds: duration.as_secs_f64(),
        updated: at,
    }
}
