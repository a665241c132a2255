mod boundary;
mod chart;
mod config;
mod data;
mod display;
mod engine;
mod error;
mod explorer;
mod map_draw;
mod state;
mod treemap;
mod ui;

#[cfg(test)]
mod test_support;

use std::{
    fs::File,
    io,
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chart::{build_spec, ChartText};
use config::ExplorerConfig;
use data::{load_metrics, BoundaryDetail, RegionGroups};
use display::{DisplayState, ViewMode};
use state::AppState;

#[derive(Parser)]
#[command(name = "region-atlas", about = "Explore regional metrics on a terminal choropleth")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the boundary files (overrides the config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Start with simplified boundaries
    #[arg(long)]
    simple: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the initial chart spec as JSON and exit
    #[arg(long, value_enum)]
    print_spec: Option<SpecView>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SpecView {
    Map,
    Bar,
}

fn init_logging(config: &ExplorerConfig, verbose: bool) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("cannot create log file {}", config.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn print_spec(config: &ExplorerConfig, view: SpecView, columns: u16) -> Result<()> {
    let table = load_metrics(config.metrics_file.as_deref()).context("cannot load metric table")?;
    let mut state = DisplayState::new(
        config.layout.columns_to_px(columns),
        config.layout.compact_breakpoint_px,
        config.reveal_delay(),
    );
    state.view_mode = match view {
        SpecView::Map => ViewMode::Map,
        SpecView::Bar => ViewMode::Bar,
    };
    let text = ChartText { title: config.title.clone(), metric_label: config.metric_label.clone() };
    let spec = build_spec(&table, &RegionGroups::hong_kong(), &state, &text);
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

fn run<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, state: &mut AppState) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, state))?;

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => {
                    if state.handle_input(code) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => state.handle_mouse(mouse),
                Event::Resize(columns, _) => state.queue_resize(columns, Instant::now()),
                _ => {}
            }
        }
        state.tick(Instant::now());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ExplorerConfig::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => ExplorerConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let (columns, _) = terminal::size().unwrap_or((120, 40));

    if let Some(view) = cli.print_spec {
        return print_spec(&config, view, columns);
    }

    init_logging(&config, cli.verbose)?;
    let detail = if cli.simple { BoundaryDetail::Simple } else { BoundaryDetail::Detailed };
    let mut state = AppState::new(&config, columns, detail)
        .with_context(|| format!("cannot load region data from {}", config.data_dir.display()))?;
    info!(columns, "starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut state);

    state.shutdown();
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}
