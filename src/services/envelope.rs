// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response envelope normalization for the Summit backend.
//!
//! CONTRACT
//! ========
//! - Success bodies are `{"data": T}`. A bare `T` is accepted too, as long
//!   as `T` is not itself an object with a `data` key.
//! - For list endpoints, `null` or a missing body decodes to an empty list.
//! - Error bodies are `{"error": "message"}`. Anything else yields
//!   [`GENERIC_ERROR_MESSAGE`].
//!
//! Every response passes through here so callers never re-check shapes.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, GENERIC_ERROR_MESSAGE};

/// Strip the `data` envelope if present.
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Decode a single resource.
pub fn decode_data<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(unwrap_envelope(body)).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Decode a collection; `null` means empty.
pub fn decode_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    match unwrap_envelope(body) {
        Value::Null => Ok(Vec::new()),
        value => serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string())),
    }
}

/// Parse raw response text, treating an empty body as `null`.
pub fn parse_body(text: &str) -> Result<Value, ApiError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| ApiError::Decode(format!("JSON parse error: {}", e)))
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Extract the backend's error message from a failed response body.
pub fn error_message(text: &str) -> String {
    serde_json::from_str::<ErrorBody>(text)
        .map(|b| b.error)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}
