use std::fmt;

/// Snapshot of what should currently be shown. Produced fresh on every tick and consumed once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DisplayState {
    /// Small line shown above the main text (day name, playback status)
    pub heading: Option<String>,
    /// Formatted time or track title
    pub primary_text: String,
    /// Formatted date or artist names
    pub secondary_text: String,
    /// Album art location, either a URL or a local path
    pub image_reference: Option<String>,
}

impl DisplayState {
    pub fn new(primary_text: impl Into<String>, secondary_text: impl Into<String>) -> DisplayState {
        DisplayState {
            heading: None,
            primary_text: primary_text.into(),
            secondary_text: secondary_text.into(),
            image_reference: None,
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> DisplayState {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_image_reference(mut self, image_reference: Option<String>) -> DisplayState {
        self.image_reference = image_reference;
        self
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(heading) = &self.heading {
            write!(f, "[{heading}] ")?;
        }
        write!(f, "{}", self.primary_text)?;
        if !self.secondary_text.is_empty() {
            write!(f, " / {}", self.secondary_text)?;
        }
        Ok(())
    }
}

/// Remote playback controls a renderer can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Play,
    Pause,
    Next,
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Control::Play => "play",
            Control::Pause => "pause",
            Control::Next => "next",
        };
        write!(f, "{name}")
    }
}

/// User input collected by a renderer while waiting for the next tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Quit,
    Control(Control),
}
