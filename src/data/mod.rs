//! Core data models for the cat fact viewer
//!
//! This module contains the wire-format fact model and the failure taxonomy
//! shared between the fetcher, the resource store, and the UI.

pub mod fact;

pub use fact::{FactClient, Fetcher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single cat fact as returned by the upstream API
///
/// The endpoint responds with `{ "fact": "...", "length": n }`; the payload
/// carries no identifier, every request simply yields a random fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// The fact text
    #[serde(rename = "fact")]
    pub text: String,
    /// Length of the fact text in characters, as reported by the API
    pub length: u32,
}

/// Errors that can occur when fetching a fact
///
/// Failures are recovered close to the fetch and surfaced to consumers only
/// as the `error` field of a cache entry snapshot; they are never allowed to
/// escape into the rendering layer. String payloads keep the type `Clone`
/// so it can live inside cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failure or non-2xx HTTP status
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
