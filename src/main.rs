//! Cat Facts - random cat facts in your terminal
//!
//! A terminal UI application that fetches random cat facts from a public
//! API, caches them in an in-memory resource store with staleness tracking,
//! and refreshes them manually or on a timer.

mod app;
mod cache;
mod cli;
mod data;
mod refetch;
mod ui;

use std::io;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::{App, RefreshRequest, FACT_KEY};
use cache::ResourceStore;
use cli::{AppConfig, Cli};
use data::{Fact, FactClient};
use refetch::{RefetchController, RefreshHandle};

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Renders the UI for the current application state
fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    ui::render_fact_view(frame, app);
    if app.show_help {
        ui::render_help_overlay(frame);
    }
}

/// Fetches one fact and prints it to stdout (the `--once` path)
async fn run_once(controller: &RefetchController<Fact>) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = controller.refetch(FACT_KEY).await;
    if let Some(error) = snapshot.error {
        return Err(Box::new(error));
    }
    if let Some(fact) = snapshot.value {
        println!("{}", fact.text);
    }
    Ok(())
}

/// Runs the interactive TUI
async fn run_tui(
    config: AppConfig,
    controller: Arc<RefetchController<Fact>>,
) -> Result<(), Box<dyn std::error::Error>> {
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let stale_time = config.stale_time;
    let refresh = RefreshHandle::spawn(config.refresh.clone(), Arc::clone(&controller), FACT_KEY);
    let mut app = App::new(config, Arc::clone(&controller));

    // Initial render to show the loading state
    terminal.draw(|frame| render_ui(frame, &app))?;

    // Trigger the initial fetch in the background
    tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            controller.ensure_fresh(FACT_KEY, stale_time).await;
        }
    });

    // Main event loop
    loop {
        // Render UI from the current snapshot
        terminal.draw(|frame| render_ui(frame, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        // Hand refresh requests raised by the UI to the controller
        if let Some(request) = app.take_refresh_request() {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                match request {
                    RefreshRequest::Refetch => controller.refetch(FACT_KEY).await,
                    RefreshRequest::ForceRefetch => controller.force_refetch(FACT_KEY).await,
                };
            });
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal and stop the background refresh
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    refresh.shutdown().await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match AppConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(2);
        }
    };

    // Explicitly constructed cache and controller, handed to every consumer
    let store = Arc::new(ResourceStore::new());
    let controller = Arc::new(RefetchController::new(
        store,
        Arc::new(FactClient::new()),
        config.retry.clone(),
    ));

    if config.once {
        run_once(&controller).await
    } else {
        run_tui(config, controller).await
    }
}
