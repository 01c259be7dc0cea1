use crate::{
    renderer::{sleep_until, Renderer},
    signal::StopSignal,
    state::{DisplayState, Input},
};
use anyhow::Context;
use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{self, Clear, ClearType},
};
use serde::{Deserialize, Serialize};
use std::{io::Write, time::Instant};

const SIMPLE_RULE_WIDTH: usize = 50;
const EXIT_HINT: &str = "Press Ctrl+C to exit";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextStyle {
    /// One line per field between two rules
    Simple,
    /// Every field in its own double-line box
    #[default]
    Boxed,
}

/// Redraws the whole surface as plain text on every render. Works over a plain SSH session, no
/// raw mode or alternate screen involved.
pub struct TextRenderer<W: Write> {
    out: W,
    style: TextStyle,
    title: String,
    /// Minimum box width. Wider text grows the box.
    box_width: Option<usize>,
    center: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, style: TextStyle) -> TextRenderer<W> {
        TextRenderer {
            out,
            style,
            title: "RASPBERRY PI CLOCK".to_string(),
            box_width: None,
            center: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> TextRenderer<W> {
        self.title = title.into();
        self
    }

    pub fn with_box_width(mut self, box_width: Option<usize>) -> TextRenderer<W> {
        self.box_width = box_width;
        self
    }

    pub fn with_centering(mut self, center: bool) -> TextRenderer<W> {
        self.center = center;
        self
    }

    /// Builds the lines for `state` without touching the output. `surface_width` is only used
    /// when centering is on.
    pub fn compose(&self, state: &DisplayState, surface_width: Option<usize>) -> Vec<String> {
        let fields: Vec<&str> = state
            .heading
            .as_deref()
            .into_iter()
            .chain([state.secondary_text.as_str(), state.primary_text.as_str()])
            .collect();

        let lines = match self.style {
            TextStyle::Simple => simple_lines(&fields),
            TextStyle::Boxed => self.boxed_lines(&fields),
        };

        match surface_width.filter(|_| self.center) {
            Some(width) => lines.into_iter().map(|line| center_line(line, width)).collect(),
            None => lines,
        }
    }

    fn boxed_lines(&self, fields: &[&str]) -> Vec<String> {
        let content_width = fields.iter().map(|f| text_width(f)).max().unwrap_or(0) + 4;
        let max_width = self.box_width.unwrap_or(0).max(content_width);

        let mut lines = vec![String::new(), "═".repeat(max_width + 2)];
        lines.push(pad_left(&self.title, max_width.saturating_sub(22) / 2));
        lines.push("═".repeat(max_width + 2));
        lines.push(String::new());

        if let Some((last, rest)) = fields.split_last() {
            for field in rest {
                lines.extend(create_box(field, max_width));
                lines.push(String::new());
            }
            // The time gets a slightly larger box
            lines.extend(create_box(last, max_width + 2));
        }

        lines.push(String::new());
        lines.push("─".repeat(max_width + 2));
        lines.push(pad_left(EXIT_HINT, max_width.saturating_sub(10) / 2));
        lines.push("─".repeat(max_width + 2));
        lines.push(String::new());
        lines
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0)).context("unable to clear screen")
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, state: &DisplayState) -> anyhow::Result<()> {
        let surface_width = if self.center {
            terminal::size().ok().map(|(cols, _)| cols as usize)
        } else {
            None
        };
        let lines = self.compose(state, surface_width);

        self.clear()?;
        for line in lines {
            // Explicit carriage returns keep lines aligned even if the terminal was left in raw mode
            write!(self.out, "{line}\r\n").context("unable to write to output")?;
        }
        self.out.flush().context("unable to flush output")
    }

    fn wait_for_input(
        &mut self,
        deadline: Instant,
        stop: &StopSignal,
    ) -> anyhow::Result<Option<Input>> {
        // Ctrl+C arrives as SIGINT and raises the stop signal directly
        sleep_until(deadline, stop);
        Ok(None)
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.clear()?;
        write!(self.out, "\r\nExiting... Goodbye!\r\n\r\n").context("unable to write to output")?;
        self.out.flush().context("unable to flush output")
    }
}

fn simple_lines(fields: &[&str]) -> Vec<String> {
    let mut lines = vec![String::new(), "=".repeat(SIMPLE_RULE_WIDTH)];
    lines.extend(fields.iter().map(|field| format!("  {field}")));
    lines.push("=".repeat(SIMPLE_RULE_WIDTH));
    lines.push(String::new());
    lines.push(EXIT_HINT.to_string());
    lines.push(String::new());
    lines
}

/// Draws a double-line box `width` columns wide with `text` centred in it. `width` is raised to
/// fit the text if needed.
fn create_box(text: &str, width: usize) -> [String; 3] {
    let width = width.max(text_width(text) + 4);
    let inner = width - 4;
    let padding = inner - text_width(text);
    // An odd leftover column goes left only when the inner width is odd too
    let left = padding / 2 + (padding & inner & 1);
    let right = padding - left;
    [
        format!("╔{}╗", "═".repeat(width - 2)),
        format!("║ {}{text}{} ║", " ".repeat(left), " ".repeat(right)),
        format!("╚{}╝", "═".repeat(width - 2)),
    ]
}

fn center_line(line: String, surface_width: usize) -> String {
    let width = text_width(&line);
    if width >= surface_width {
        return line;
    }
    pad_left(&line, (surface_width - width) / 2)
}

fn pad_left(text: &str, padding: usize) -> String {
    format!("{}{text}", " ".repeat(padding))
}

fn text_width(text: &str) -> usize {
    text.chars().count()
}
