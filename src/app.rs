//! Application state management for the cat fact viewer
//!
//! This module contains the main application state, handling keyboard input
//! and relaying refresh requests from the UI to the refetch controller. The
//! store and controller are constructed at startup and injected; the app
//! itself only reads snapshots and raises requests.

use std::sync::Arc;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};

use crate::cache::{EntrySnapshot, ResourceStore};
use crate::cli::AppConfig;
use crate::data::Fact;
use crate::refetch::RefetchController;

/// Cache key under which the single fact resource lives
pub const FACT_KEY: &str = "cat_fact";

/// A refresh action requested from the UI, picked up by the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// Normal refetch; ignored while a fetch is already in flight
    Refetch,
    /// Force refetch; supersedes any fetch in flight
    ForceRefetch,
}

/// Main application struct managing state and input
pub struct App {
    /// Runtime configuration from the CLI
    pub config: AppConfig,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show the help overlay
    pub show_help: bool,
    /// Refresh action raised by keyboard input, consumed by the event loop
    pending_refresh: Option<RefreshRequest>,
    /// Controller driving fetches for the fact resource
    controller: Arc<RefetchController<Fact>>,
}

impl App {
    /// Creates a new App around an explicitly constructed controller
    ///
    /// # Arguments
    /// * `config` - Runtime configuration from CLI arguments
    /// * `controller` - The refetch controller owning the fact store
    pub fn new(config: AppConfig, controller: Arc<RefetchController<Fact>>) -> Self {
        Self {
            config,
            should_quit: false,
            show_help: false,
            pending_refresh: None,
            controller,
        }
    }

    /// The controller shared with background tasks
    pub fn controller(&self) -> &Arc<RefetchController<Fact>> {
        &self.controller
    }

    /// The fact store backing this app
    pub fn store(&self) -> &Arc<ResourceStore<Fact>> {
        self.controller.store()
    }

    /// Current snapshot of the fact entry, creating an idle one on first read
    pub fn snapshot(&self) -> EntrySnapshot<Fact> {
        self.store().get_or_create(FACT_KEY)
    }

    /// Whether the displayed fact is past its staleness threshold
    pub fn is_stale(&self) -> bool {
        self.store()
            .is_stale(FACT_KEY, self.config.stale_time, Utc::now())
    }

    /// Takes the pending refresh request, if any, leaving none behind
    pub fn take_refresh_request(&mut self) -> Option<RefreshRequest> {
        self.pending_refresh.take()
    }

    /// Handles a keyboard event
    ///
    /// * `q` / `Esc` - quit (or close the help overlay if open)
    /// * `r` - request a refetch
    /// * `R` - request a force refetch, superseding an in-flight fetch
    /// * `?` - toggle the help overlay
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('r') => {
                self.pending_refresh = Some(RefreshRequest::Refetch);
            }
            KeyCode::Char('R') => {
                self.pending_refresh = Some(RefreshRequest::ForceRefetch);
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
            }
            _ => {}
        }
    }
}
