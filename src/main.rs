use std::{fs::File, io::stdout, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use flowpitch::content_source::{ContentSource, DEFAULT_SOURCE};
use flowpitch::event_source::KeyboardEventSource;
use flowpitch::export::{ExportJob, artifact_file_name};
use flowpitch::panic_handler::initialize_panic_handler;
use flowpitch::presenter::{App, default_pipeline, run_app_with_event_source};
use flowpitch::settings::{self, Settings};
use flowpitch::slide_builder::render_deck;

#[derive(Parser, Debug)]
#[command(
    name = "flowpitch",
    version,
    about = "Present a slide deck in the terminal and export it to PDF"
)]
struct Cli {
    /// Deck description: a local JSON file or an http(s) URL
    #[arg(default_value = DEFAULT_SOURCE)]
    source: String,

    /// Export the deck to PDF and exit without starting the presenter
    #[arg(long)]
    export: bool,

    /// Directory the exported document is written to
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Output file name of the exported document
    #[arg(long, value_name = "NAME")]
    out_name: Option<String>,

    /// Device pixel ratio used to derive the capture scale
    #[arg(long, value_name = "N")]
    scale: Option<f32>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "PATH", default_value = "flowpitch.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {}", cli.log_file.display()))?,
    )?;
    info!("Starting FlowPitch {}", env!("CARGO_PKG_VERSION"));

    initialize_panic_handler();

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }
    settings::override_settings(|s| {
        if let Some(dir) = &cli.out_dir {
            s.export_dir = dir.clone();
        }
        if let Some(name) = &cli.out_name {
            s.export_file_name = name.clone();
        }
        if let Some(ratio) = cli.scale {
            s.device_pixel_ratio = ratio;
        }
    });
    let settings = settings::get_settings();
    let source = ContentSource::parse(&cli.source);

    if cli.export {
        return export_headless(source, &settings);
    }

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::with_settings(source, settings).with_window_title();
    let mut event_source = KeyboardEventSource;
    let res = run_app_with_event_source(&mut terminal, &mut app, &mut event_source);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down FlowPitch");
    Ok(())
}

/// Load, build and export without the presenter. Prints the artifact path.
fn export_headless(source: ContentSource, settings: &Settings) -> Result<()> {
    let deck = source
        .load()
        .with_context(|| format!("loading deck from {source}"))?;
    let units = render_deck(&deck)?;
    let pipeline = default_pipeline(settings);
    let job = ExportJob {
        units,
        theme: deck.theme(),
        title: deck.title().to_string(),
        destination: settings
            .export_dir
            .join(artifact_file_name(&settings.export_file_name)),
        scale: settings.export_scale(),
    };
    let artifact = pipeline.export(job, &mut |progress| {
        info!("Export progress: {} {}/{}", progress.state, progress.slide + 1, progress.total);
    })?;
    println!("{}", artifact.path.display());
    Ok(())
}
