mod artwork;
mod config;
mod logging;
mod refresh;
mod renderer;
mod signal;
mod source;
mod spotify;
mod state;
#[cfg(test)]
mod test_util;

use crate::{
    config::Config,
    renderer::{DashboardOptions, DashboardRenderer, Renderer, TextRenderer, TextStyle},
    signal::StopSignal,
    source::{ClockSource, FormatProfile, PlaybackSource, StateSource},
    spotify::SpotifyClient,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

/// Clock and Spotify now-playing widget for small displays
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current day, date and time
    Clock {
        /// Seconds between refreshes
        #[arg(short, long)]
        interval: Option<u64>,
        /// Plain lines instead of boxes
        #[arg(long, conflicts_with = "dashboard")]
        simple: bool,
        /// Full-screen dashboard instead of text output
        #[arg(long)]
        dashboard: bool,
        /// Date and time format preset
        #[arg(long, value_enum)]
        profile: Option<FormatProfile>,
    },
    /// Show what's playing on Spotify, with album art and playback controls
    Player {
        /// Seconds between refreshes
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Authorize access to your Spotify account and cache the token
    Login,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    config.apply_env(|key| std::env::var(key).ok());
    match &args.command {
        Command::Clock {
            interval, profile, ..
        } => {
            if let Some(profile) = profile {
                config.clock.profile = *profile;
            }
            if let Some(interval) = interval {
                config.display.interval_secs = *interval;
            }
        }
        Command::Player {
            interval: Some(interval),
        } => config.display.interval_secs = *interval,
        _ => {}
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    config.validate()?;

    logging::init(&config.log, config.log.level_filter()?)?;

    match args.command {
        Command::Clock {
            simple, dashboard, ..
        } => run_clock(&config, simple, dashboard),
        Command::Player { .. } => run_player(&config),
        Command::Login => login(&config),
    }
}

fn run_clock(config: &Config, simple: bool, dashboard: bool) -> anyhow::Result<()> {
    let mut source = ClockSource::new(config.clock.formats())?;
    if dashboard {
        let options = dashboard_options(config, &config.clock.title, false);
        let renderer = DashboardRenderer::new(options)?;
        return run(config, &mut source, renderer);
    }

    let style = if simple {
        TextStyle::Simple
    } else {
        config.clock.style
    };
    let renderer = TextRenderer::new(std::io::stdout(), style)
        .with_title(config.clock.title.as_str())
        .with_box_width(config.clock.box_width)
        .with_centering(config.clock.center);
    run(config, &mut source, renderer)
}

fn run_player(config: &Config) -> anyhow::Result<()> {
    let credentials = config.spotify.credentials()?;
    let spotify = spotify::authorization(&credentials, config.spotify.token_cache_path());
    let mut source = PlaybackSource::new(SpotifyClient::from_cache(spotify)?);

    let mut options = dashboard_options(config, &config.display.window_title, true);
    options.default_cover = config.display.default_cover.clone();
    let renderer = DashboardRenderer::new(options)?;
    run(config, &mut source, renderer)
}

/// Runs the refresh loop until Ctrl+C or a quit key
fn run(
    config: &Config,
    source: &mut dyn StateSource,
    mut renderer: impl Renderer,
) -> anyhow::Result<()> {
    let stop = StopSignal::new();
    stop.install_ctrlc_handler()?;
    refresh::run(config.display.interval(), source, &mut renderer, &stop)?;
    Ok(())
}

fn dashboard_options(config: &Config, title: &str, controls: bool) -> DashboardOptions {
    DashboardOptions {
        title: title.to_string(),
        columns: config.display.width,
        rows: config.display.height,
        controls,
        cover_cache_dir: config.display.cover_cache_dir(),
        default_cover: None,
    }
}

fn login(config: &Config) -> anyhow::Result<()> {
    let credentials = config.spotify.credentials()?;
    let cache_path = config.spotify.token_cache_path();
    spotify::login(&spotify::authorization(&credentials, cache_path.clone()))?;

    info!("logged in, token cached at {}", cache_path.display());
    println!("Logged in. Token saved to {}", cache_path.display());
    Ok(())
}
