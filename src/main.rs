//! cumbre - AEMET mountain weather in the terminal
//!
//! A terminal UI application that displays hourly municipality forecasts and
//! nivological (avalanche) bulletins for the Pyrenees from AEMET OpenData.

use std::io;
use std::panic;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};

use cumbre::app::{App, Command};
use cumbre::cli::{Cli, StartupConfig};
use cumbre::loader::{LoadMessage, Loader};
use cumbre::logging::{self, LogTarget};
use cumbre::service::WeatherService;
use cumbre::ui;

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

/// Hands a command from the app to the loader
fn run_command(loader: &mut Loader, command: Command) {
    match command {
        Command::Load { mode, location_id } => loader.request(mode, &location_id),
        Command::Refetch { mode, location_id } => loader.refetch(mode, &location_id),
        Command::LoadMunicipalities => loader.request_municipalities(),
    }
}

/// Loads the starting report once and writes it to stdout
async fn print_report(
    service: &WeatherService,
    config: &StartupConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = service.report(config.mode, &config.location_id).await;
    let report = match &result {
        Ok(report) => Arc::clone(report),
        Err(e) => return Err(Box::new(e.clone())),
    };

    let mut app = App::with_startup_config(config);
    app.apply(LoadMessage::ReportLoaded {
        mode: config.mode,
        location_id: config.location_id.clone(),
        result,
    });

    let now = Local::now().naive_local();
    println!("{}", app.active_name());
    println!("{}", ui::plain_text(&ui::report_lines(&report, now)));
    Ok(())
}

async fn run_tui(
    service: Arc<WeatherService>,
    config: &StartupConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::with_startup_config(config);
    let mut loader = Loader::new(service);

    // Trigger initial data load
    run_command(&mut loader, Command::LoadMunicipalities);
    run_command(&mut loader, app.load_command());

    // Main event loop
    loop {
        while let Some(message) = loader.try_recv() {
            app.apply(message);
        }

        terminal.draw(|f| ui::render(f, &app, Local::now().naive_local()))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(command) = app.handle_key(key) {
                        run_command(&mut loader, command);
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    loader.abort_pending();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let service = Arc::new(WeatherService::from_config(&config.client));

    if config.print {
        logging::init(LogTarget::Stderr);
        if let Err(e) = print_report(&service, &config).await {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return Ok(());
    }

    logging::init(match logging::default_log_path() {
        Some(path) => LogTarget::File(path),
        None => LogTarget::Discard,
    });
    info!(
        "starting on {:?} {} against {}",
        config.mode, config.location_id, config.client.base_url
    );

    run_tui(service, &config).await
}
