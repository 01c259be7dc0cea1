use crate::{
    artwork::{self, ArtworkError},
    renderer::{Renderer, WAIT_SLICE},
    signal::StopSignal,
    state::{Control, DisplayState, Input},
};
use anyhow::{bail, Context};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use image::{Rgb, RgbImage};
use log::{debug, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use reqwest::blocking::Client;
use std::{
    io::{IsTerminal, Stdout},
    path::PathBuf,
    time::Instant,
};

/// How the dashboard window looks and where it keeps album art
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub title: String,
    /// Window size in terminal cells
    pub columns: u16,
    pub rows: u16,
    /// Show the play/pause/next key hints
    pub controls: bool,
    pub cover_cache_dir: PathBuf,
    pub default_cover: Option<PathBuf>,
}

/// Full-screen window with in-place widget fields and an album art pane. The window is created
/// once and mutated on every render.
pub struct DashboardRenderer<B: Backend = CrosstermBackend<Stdout>> {
    terminal: Terminal<B>,
    options: DashboardOptions,
    artwork: ArtworkPane,
    /// True when we switched the real terminal into raw mode and need to restore it
    owns_tty: bool,
    shut_down: bool,
}

impl DashboardRenderer {
    /// Takes over the controlling terminal. Fails if there's no terminal to take over, e.g. when
    /// started from a service without a TTY.
    pub fn new(options: DashboardOptions) -> anyhow::Result<DashboardRenderer> {
        let mut stdout = std::io::stdout();
        if !stdout.is_terminal() {
            bail!(
                "stdout is not a terminal; the dashboard needs an interactive display \
                 (run it from the console or over `ssh -t`)"
            );
        }
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("unable to enter alternate screen")?;

        // Setup panic handler to cleanup terminal
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic| {
            let _ = reset_terminal();
            original_hook(panic);
        }));

        let mut terminal =
            Terminal::new(CrosstermBackend::new(stdout)).context("creating terminal failed")?;
        terminal.clear().context("unable to clear terminal")?;

        let mut renderer = DashboardRenderer::with_terminal(terminal, options);
        renderer.owns_tty = true;
        Ok(renderer)
    }
}

impl<B: Backend> DashboardRenderer<B> {
    /// Draws onto an already set up terminal. The terminal mode is left alone on shutdown.
    pub fn with_terminal(terminal: Terminal<B>, options: DashboardOptions) -> DashboardRenderer<B> {
        let art_size = u32::from(options.rows.saturating_sub(2)) * 2;
        let artwork = ArtworkPane::new(
            options.cover_cache_dir.clone(),
            options.default_cover.clone(),
            art_size,
        );
        DashboardRenderer {
            terminal,
            options,
            artwork,
            owns_tty: false,
            shut_down: false,
        }
    }

    fn restore(&mut self) -> anyhow::Result<()> {
        self.shut_down = true;
        if self.owns_tty {
            reset_terminal()?;
        }
        self.terminal
            .show_cursor()
            .context("unable to show cursor")
    }
}

impl<B: Backend> Renderer for DashboardRenderer<B> {
    fn render(&mut self, state: &DisplayState) -> anyhow::Result<()> {
        self.artwork.update(state.image_reference.as_deref());

        let Self {
            terminal,
            options,
            artwork,
            ..
        } = self;
        terminal
            .draw(|frame| draw(frame, options, state, artwork.image.as_ref()))
            .context("unable to draw dashboard")?;
        Ok(())
    }

    fn wait_for_input(
        &mut self,
        deadline: Instant,
        stop: &StopSignal,
    ) -> anyhow::Result<Option<Input>> {
        loop {
            if stop.is_raised() {
                return Ok(None);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if event::poll(WAIT_SLICE.min(deadline - now)).context("event poll failed")? {
                if let Event::Key(key) = event::read().context("event read failed")? {
                    if let Some(input) = key_input(key) {
                        return Ok(Some(input));
                    }
                }
            }
        }
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.restore()
    }
}

impl<B: Backend> Drop for DashboardRenderer<B> {
    fn drop(&mut self) {
        if !self.shut_down {
            if let Err(err) = self.restore() {
                warn!("failed to restore the terminal: {err:#}");
            }
        }
    }
}

/// Keeps the decoded cover for as long as it's on screen
struct ArtworkPane {
    http: Client,
    cache_dir: PathBuf,
    default_cover: Option<PathBuf>,
    /// Side of the square art in pixels
    size: u32,
    /// The reference `image` was produced for, `None` before the first update
    shown: Option<Option<String>>,
    image: Option<RgbImage>,
}

impl ArtworkPane {
    fn new(cache_dir: PathBuf, default_cover: Option<PathBuf>, size: u32) -> ArtworkPane {
        ArtworkPane {
            http: Client::new(),
            cache_dir,
            default_cover,
            size,
            shown: None,
            image: None,
        }
    }

    fn update(&mut self, reference: Option<&str>) {
        if self.shown.as_ref().map(|shown| shown.as_deref()) == Some(reference) {
            return;
        }
        self.shown = Some(reference.map(str::to_string));

        self.image = match reference.map(|reference| (reference, self.load(reference))) {
            Some((_, Ok(image))) => Some(image),
            Some((reference, Err(err))) => {
                warn!("unable to show album art {reference}: {err}");
                self.default_image()
            }
            None => self.default_image(),
        };
    }

    fn load(&self, reference: &str) -> Result<RgbImage, ArtworkError> {
        let path = if reference.starts_with("http://") || reference.starts_with("https://") {
            // Only ever called when the reference changes, so the file always gets replaced
            let path = self.cache_dir.join(artwork::COVER_FILE);
            debug!("downloading album art {reference}");
            artwork::download_album_cover(&self.http, Some(reference), &path)?;
            path
        } else {
            PathBuf::from(reference)
        };
        artwork::decode_cover(&path, self.size, self.size)
    }

    fn default_image(&self) -> Option<RgbImage> {
        let path = self.default_cover.as_ref()?;
        artwork::decode_cover(path, self.size, self.size)
            .map_err(|err| debug!("no default cover: {err}"))
            .ok()
    }
}

fn draw(
    frame: &mut Frame<'_>,
    options: &DashboardOptions,
    state: &DisplayState,
    art: Option<&RgbImage>,
) {
    let area = centered(frame.size(), options.columns, options.rows);
    let block = Block::default()
        .title(options.title.as_str())
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let art_width = (u32::from(options.rows.saturating_sub(2)) * 2).min(u32::from(inner.width / 2));
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(art_width as u16), Constraint::Min(1)].as_ref())
        .split(inner);
    if let Some(art) = art {
        frame.render_widget(Paragraph::new(art_lines(art)), columns[0]);
    }

    let text_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)].as_ref())
        .split(columns[1]);

    let mut lines = Vec::new();
    if let Some(heading) = &state.heading {
        lines.push(Line::styled(
            heading.clone(),
            Style::default().fg(Color::DarkGray),
        ));
        lines.push(Line::default());
    }
    lines.push(Line::styled(
        state.primary_text.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    lines.push(Line::from(state.secondary_text.clone()));
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::LEFT)),
        text_area[0],
    );

    let hints = if options.controls {
        "[p] play  [space] pause  [n] next  [q] quit"
    } else {
        "[q] quit"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hints, Style::default().fg(Color::DarkGray))),
        text_area[1],
    );
}

/// A `columns` x `rows` rectangle in the middle of `area`, clipped to it
fn centered(area: Rect, columns: u16, rows: u16) -> Rect {
    let width = columns.min(area.width);
    let height = rows.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Every character encodes two vertical pixels: the top one as foreground, the bottom one as
/// background of an upper half block.
fn art_lines(image: &RgbImage) -> Vec<Line<'static>> {
    let (width, height) = image.dimensions();
    (0..height)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..width)
                .map(|x| {
                    let top = image.get_pixel(x, y);
                    let bottom = if y + 1 < height {
                        image.get_pixel(x, y + 1)
                    } else {
                        top
                    };
                    Span::styled("▀", Style::default().fg(rgb(top)).bg(rgb(bottom)))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn rgb(pixel: &Rgb<u8>) -> Color {
    let [r, g, b] = pixel.0;
    Color::Rgb(r, g, b)
}

fn key_input(key: KeyEvent) -> Option<Input> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Input::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Input::Quit),
        KeyCode::Char('p') => Some(Input::Control(Control::Play)),
        KeyCode::Char(' ') => Some(Input::Control(Control::Pause)),
        KeyCode::Char('n') => Some(Input::Control(Control::Next)),
        _ => None,
    }
}

fn reset_terminal() -> anyhow::Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(std::io::stdout(), LeaveAlternateScreen)
        .context("unable to switch to main screen")?;
    Ok(())
}
