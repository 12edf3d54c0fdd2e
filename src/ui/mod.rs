//! UI rendering module for the cat fact viewer
//!
//! This module contains all the rendering logic for the terminal user
//! interface, using the ratatui library for TUI components. Rendering is
//! driven entirely by the current cache entry snapshot; errors reach this
//! layer only as data on the snapshot, never as propagated failures.

pub mod fact_view;
pub mod help_overlay;

pub use fact_view::render as render_fact_view;
pub use help_overlay::render as render_help_overlay;
