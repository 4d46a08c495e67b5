//! Normalisation of transport outcomes into a uniform response envelope.
//!
//! Every endpoint funnels its request through [`create_inner_cb`]: the transport reports a
//! [`RequestResult`] plus an optional raw response, the wrapper turns that into an
//! [`ApiResponse`], lets an endpoint specific body handler fill in the payload or the error,
//! and finally hands the envelope to the caller's callback.

use crate::api::ClientError;
use crate::requester::{RawResponse, RequestResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Message attached to every timed out response
pub const TIMEOUT_MESSAGE: &str = "Connection time out";

/// First entry of the `errors` array returned by the server on failure.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn message(msg: &str) -> ApiError {
        ApiError {
            message: msg.to_string(),
            ..ApiError::default()
        }
    }
}

/// The response envelope produced for every network operation.
///
/// Properties:
///
/// * `success`: The transport classified the outcome as a success.
/// * `timeout`: No response arrived in time. `body` is then always empty.
/// * `allowed`: `false` exactly when the server answered 401 or 403.
/// * `code`: HTTP status, 0 when there was no response.
/// * `body`: Endpoint specific payload, filled in on success.
/// * `error`: Server supplied error (or the timeout message) on failure.
///
/// Exactly one of success, timeout and failure holds for an envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub timeout: bool,
    pub allowed: bool,
    pub code: u16,
    pub body: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Builds the bare envelope for a terminal outcome, without looking at any body
    pub fn from_result(result: RequestResult, response: Option<&RawResponse>) -> ApiResponse<T> {
        ApiResponse {
            success: result == RequestResult::Success,
            timeout: result == RequestResult::Timeout,
            allowed: result != RequestResult::Forbidden,
            code: response.map(|r| r.status).unwrap_or(0),
            body: None,
            error: None,
        }
    }

    pub fn timed_out() -> ApiResponse<T> {
        let mut resp = ApiResponse::from_result(RequestResult::Timeout, None);
        resp.error = Some(ApiError::message(TIMEOUT_MESSAGE));
        resp
    }

    /// Converts the envelope into the payload on success, or the matching `ClientError`
    pub fn into_result(self) -> Result<Option<T>, ClientError> {
        if self.success {
            return Ok(self.body);
        }
        if self.timeout {
            return Err(ClientError::Timeout);
        }

        let error = self.error.unwrap_or_default();
        if !self.allowed {
            Err(ClientError::Forbidden {
                code: self.code,
                message: error.message,
            })
        } else {
            Err(ClientError::Api {
                code: self.code,
                error_code: error.code,
                message: error.message,
            })
        }
    }
}

/// Extracts `errors[0]` from a failure body. Bare strings are accepted as the message.
pub fn first_error(body: Option<&Value>) -> Option<ApiError> {
    let first = body?.get("errors")?.as_array()?.first()?;
    match first {
        Value::String(msg) => Some(ApiError::message(msg)),
        other => match serde_json::from_value::<ApiError>(other.clone()) {
            Ok(err) => Some(err),
            Err(e) => {
                log::debug!("Unrecognised error entry {}: {}", other, e);
                Some(ApiError {
                    details: Some(other.clone()),
                    ..ApiError::default()
                })
            }
        },
    }
}

/// Body handler shared by most endpoints: on success the body is parsed into `T`, otherwise
/// the first server error is recorded. A success body that does not parse turns the envelope
/// into a failure.
pub fn parse_body<T: DeserializeOwned>(
    resp: &mut ApiResponse<T>,
    body: Option<&Value>,
    result: RequestResult,
) {
    if result != RequestResult::Success {
        resp.error = first_error(body);
        return;
    }
    let Some(body) = body else {
        return;
    };
    match serde_json::from_value::<T>(body.clone()) {
        Ok(parsed) => resp.body = Some(parsed),
        Err(e) => {
            // A body that does not hold up is not trusted as a success
            log::warn!("Unable to parse response body: {}", e);
            resp.success = false;
            resp.error = Some(ApiError::message(&format!("Invalid response body: {}", e)));
        }
    }
}

/// Wraps `callback` into a transport callback.
///
/// The returned closure ignores `Pending`, builds the envelope on the terminal outcome, runs
/// `handle_body` unless the request timed out and then calls `callback(envelope, context)`.
/// Outcomes after the first terminal one are dropped.
pub fn create_inner_cb<T, C, F, H>(
    callback: F,
    context: C,
    handle_body: H,
) -> impl FnMut(RequestResult, Option<&RawResponse>) + Send
where
    T: Send,
    C: Send,
    F: FnOnce(ApiResponse<T>, C) + Send,
    H: FnOnce(&mut ApiResponse<T>, Option<&Value>, RequestResult) + Send,
{
    let mut pending = Some((callback, context, handle_body));
    move |result: RequestResult, response: Option<&RawResponse>| {
        if result == RequestResult::Pending {
            return;
        }
        let Some((callback, context, handle_body)) = pending.take() else {
            log::warn!("Ignoring repeated terminal outcome {:?}", result);
            return;
        };

        let mut resp = ApiResponse::from_result(result, response);
        if resp.timeout {
            resp.error = Some(ApiError::message(TIMEOUT_MESSAGE));
        } else {
            handle_body(&mut resp, response.and_then(|r| r.body.as_ref()), result);
        }
        callback(resp, context);
    }
}
