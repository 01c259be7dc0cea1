use crate::state::{Control, DisplayState};

mod clock;
mod playback;

pub use clock::{ClockFormats, ClockSource, FormatProfile};
pub use playback::{MusicClient, Playback, PlaybackSource};

pub const NO_TRACK_PLAYING: &str = "No track playing";
pub const FETCH_ERROR_TEXT: &str = "Error";

/// Anything that can produce a fresh [`DisplayState`] on demand.
pub trait StateSource {
    /// Fetches the state to show for the current tick.
    fn fetch(&mut self) -> Result<DisplayState, FetchError>;

    /// Forwards a user control to whatever is behind this source. Sources with nothing to control
    /// ignore it.
    fn control(&mut self, _control: Control) -> Result<(), FetchError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("nothing is currently playing")]
    NoActivePlayback,
    #[error("the access token was rejected")]
    Unauthorized,
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// The state shown for a tick whose fetch failed with this error
    pub fn fallback_state(&self) -> DisplayState {
        match self {
            FetchError::NoActivePlayback => DisplayState::new(NO_TRACK_PLAYING, ""),
            _ => DisplayState::new(FETCH_ERROR_TEXT, ""),
        }
    }
}
