//! Cache module holding the in-memory resource store
//!
//! This module provides the per-key entry map at the heart of the
//! application: each entry tracks its fetch status, last value, last error,
//! and last successful fetch time. Values survive later failed fetches so
//! the UI can keep showing stale data while an error is displayed, and
//! fetch tickets guarantee that a superseded request can never clobber a
//! fresher result.

mod store;

pub use store::{EntrySnapshot, FetchStatus, FetchTicket, ResourceStore, SubscriptionId};
