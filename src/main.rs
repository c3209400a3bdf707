mod app;
mod config;
mod connection;
mod error;
mod events;
mod midi;
mod ui;

use anyhow::{bail, Context, Result};
use app::App;
use config::{SessionConfig, DEFAULT_CONFIG_FILE};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "vkeys.log";

struct Args {
    list_ports: bool,
    config_path: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        list_ports: false,
        config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--list-ports" => args.list_ports = true,
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config_path = PathBuf::from(path);
            }
            other => bail!("unknown argument '{}'", other),
        }
    }

    Ok(args)
}

/// The terminal belongs to the TUI, so logs go to a file in the temp dir
fn init_logging() -> Result<()> {
    let path = std::env::temp_dir().join(LOG_FILE);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args()?;

    if args.list_ports {
        return list_ports_and_exit();
    }

    init_logging()?;

    config::migrate_legacy_file(&args.config_path)?;
    let config = SessionConfig::load(&args.config_path)?;

    if !config.routes_through_system() {
        bail!(
            "output mode '{}' in {} is not handled by this keyboard; set output_mode = \"system\"",
            config.output_mode,
            args.config_path.display()
        );
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!(config = %args.config_path.display(), mode = %config.output_mode, "starting");
    let mut app = App::new(args.config_path, config);

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result.context("Application error")
}

/// CLI mode: print the label of every port a session would offer, one per line
fn list_ports_and_exit() -> Result<()> {
    use midi::catalog::PortCatalog;

    let mut catalog = PortCatalog::new();
    for device in midi::midir_host::enumerate_devices()? {
        catalog.on_device_attached(&device);
    }

    for entry in &catalog.list() {
        println!("{}", entry.descriptor);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        // Host events, notifications and note-off timers
        app.process_events();

        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.quit();
                    }
                    KeyCode::Enter => {
                        app.handle_enter();
                    }
                    KeyCode::Esc => {
                        app.handle_escape();
                    }
                    // The error popup swallows everything else until dismissed
                    _ if app.dialog.is_some() => {}
                    KeyCode::Tab => {
                        app.handle_tab();
                    }
                    KeyCode::Up => {
                        app.handle_key_up();
                    }
                    KeyCode::Down => {
                        app.handle_key_down();
                    }
                    KeyCode::Left => {
                        app.handle_key_left();
                    }
                    KeyCode::Right => {
                        app.handle_key_right();
                    }
                    KeyCode::F(5) => {
                        app.handle_reload();
                    }
                    KeyCode::Char(c) => {
                        app.handle_char(c);
                    }
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
