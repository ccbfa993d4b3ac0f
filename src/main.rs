use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use file_navigator::app::App;
use file_navigator::browser::Browser;
use file_navigator::config::{AppConfig, GeneralConfig, LogConfig, ThemeConfig, WatcherConfig};
use file_navigator::error::{AppError, Result};
use file_navigator::event::{Event, EventHandler};
use file_navigator::tui::{install_panic_hook, Tui};
use file_navigator::{handler, logging, theme, ui};

/// Browse a directory tree that follows changes on disk.
#[derive(Parser, Debug)]
#[command(name = "fnav", version, about)]
struct Cli {
    /// Root path to display (defaults to the configured path, then ".")
    path: Option<PathBuf>,

    /// Config file to load on top of the usual locations
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// List folders once instead of following changes
    #[arg(long)]
    no_watcher: bool,

    /// Append logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Color scheme: dark, light or custom
    #[arg(long)]
    theme: Option<String>,

    /// Enable mouse support
    #[arg(long)]
    mouse: bool,
}

impl Cli {
    /// Flags that override config values when given.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                mouse: self.mouse.then_some(true),
                ..Default::default()
            },
            watcher: WatcherConfig {
                enabled: self.no_watcher.then_some(false),
                ..Default::default()
            },
            theme: ThemeConfig {
                scheme: self.theme.clone(),
                custom: None,
            },
            log: LogConfig {
                file: self
                    .log_file
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                level: None,
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));

    if let Some(log_file) = config.log_file() {
        logging::init(&log_file, config.log_level())?;
    }

    let requested = cli
        .path
        .clone()
        .or_else(|| config.general.default_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let root = requested
        .canonicalize()
        .map_err(|_| AppError::InvalidPath(format!("{} does not exist", requested.display())))?;
    if !root.is_dir() {
        return Err(AppError::InvalidPath(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    install_panic_hook();

    let mut tui = Tui::new(config.mouse_enabled())?;
    let mut events = EventHandler::new(Duration::from_millis(16));
    let browser = Browser::start(
        root.clone(),
        config.watcher_enabled(),
        config.poll_interval(),
        events.sender(),
    );
    let live = browser.is_live();
    info!(root = %root.display(), live, "browsing");

    let mut app = App::new(
        browser,
        theme::resolve_theme(&config.theme),
        config.use_icons(),
        live,
    );
    if config.watcher_enabled() && !live {
        app.set_status_message("Watcher unavailable, showing a static tree".to_string());
    }

    let result = run(&mut tui, &mut app, &mut events).await;
    if let Err(ref err) = result {
        warn!(error = %err, "event loop stopped");
    }

    app.browser.shutdown().await;
    tui.restore()?;
    result
}

async fn run(tui: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    loop {
        tui.terminal_mut().draw(|frame| ui::render(app, frame))?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(app, key),
            Event::Mouse(mouse) => handler::handle_mouse_event(app, mouse),
            Event::Tick => app.clear_expired_status(),
            Event::Resize(_, _) => {}
            Event::TreeChanged(items) => app.apply_change(items),
            Event::Details(node) => app.apply_details(node),
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
