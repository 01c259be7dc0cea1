use super::{FetchError, StateSource};
use crate::state::{Control, DisplayState};
use log::{debug, info};

/// What the music service reports as currently loaded on the active device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    pub is_playing: bool,
    pub title: String,
    pub artists: Vec<String>,
    /// Largest available album image
    pub album_art_url: Option<String>,
}

/// The remote operations the now playing widget needs from a music service.
pub trait MusicClient {
    /// `Ok(None)` when there's no active device or nothing loaded on it
    fn current_playback(&mut self) -> Result<Option<Playback>, FetchError>;
    fn play(&mut self) -> Result<(), FetchError>;
    fn pause(&mut self) -> Result<(), FetchError>;
    fn next_track(&mut self) -> Result<(), FetchError>;
}

pub struct PlaybackSource<C> {
    client: C,
}

impl<C: MusicClient> PlaybackSource<C> {
    pub fn new(client: C) -> PlaybackSource<C> {
        PlaybackSource { client }
    }
}

impl<C: MusicClient> StateSource for PlaybackSource<C> {
    fn fetch(&mut self) -> Result<DisplayState, FetchError> {
        let playback = self
            .client
            .current_playback()?
            .ok_or(FetchError::NoActivePlayback)?;
        debug!("current playback: {playback:?}");

        let status = if playback.is_playing {
            "Playing"
        } else {
            "Paused"
        };
        Ok(DisplayState::new(playback.title, playback.artists.join(", "))
            .with_heading(status)
            .with_image_reference(playback.album_art_url))
    }

    fn control(&mut self, control: Control) -> Result<(), FetchError> {
        info!("sending {control} to the music service");
        match control {
            Control::Play => self.client.play(),
            Control::Pause => self.client.pause(),
            Control::Next => self.client.next_track(),
        }
    }
}
