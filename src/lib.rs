//! Cat Facts Library
//!
//! This module exposes the cache, data, refetch, and cli modules for use in
//! integration tests.

pub mod cache;
pub mod cli;
pub mod data;
pub mod refetch;
