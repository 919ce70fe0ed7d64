//! Wire types for the external service APIs.
//!
//! This module contains the data types and parsing logic for the
//! services the login flows talk to:
//!
//! * [`token`] - OAuth token endpoint responses and error bodies
//! * [`bungie`] - game platform envelope and resource types
//! * [`spotify`] - music service profile and playlist types
//!
//! # Number Handling
//!
//! Numeric values are stored as 64-bit integers because the JSON
//! protocols don't distinguish between number sizes. This ensures safe
//! handling of all possible values from the APIs.

pub mod bungie;
pub mod spotify;
pub mod token;

use crate::error::Result;
use serde::Deserialize;
use std::fmt::Debug;

/// Parses and logs JSON responses from the service APIs.
///
/// # Errors
///
/// Returns error if the body is not valid JSON or its structure doesn't
/// match type `T`.
///
/// # Logging
///
/// * Success: Logs parsed structure at TRACE level
/// * Parse Error: Logs raw JSON at TRACE level if valid JSON
/// * Invalid JSON: Logs error and raw text at ERROR level
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{}: {result:#?}", origin);
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{}: {json:#?}", origin);
            } else {
                error!("{}: failed parsing response ({e:?})", origin);
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
