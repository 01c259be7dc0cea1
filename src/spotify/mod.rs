use crate::source::{FetchError, MusicClient, Playback};
use anyhow::{anyhow, Context};
use chrono::Utc;
use log::{debug, warn};
use rspotify::{
    http::HttpError,
    model::{AdditionalType, CurrentPlaybackContext, Image, PlayableItem},
    prelude::*,
    scopes, AuthCodeSpotify, ClientError, Config as ClientConfig,
    Credentials as ClientCredentials, OAuth,
};
use std::{cmp::Reverse, path::PathBuf};

/// The Spotify app registration and where authorization redirects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// An OAuth client whose token is cached at `cache_path` and refreshed automatically once it
/// expires.
pub fn authorization(credentials: &Credentials, cache_path: PathBuf) -> AuthCodeSpotify {
    with_config(
        credentials,
        ClientConfig {
            token_cached: true,
            token_refreshing: true,
            cache_path,
            ..Default::default()
        },
    )
}

fn with_config(credentials: &Credentials, config: ClientConfig) -> AuthCodeSpotify {
    let oauth = OAuth {
        redirect_uri: credentials.redirect_uri.clone(),
        scopes: scopes!("user-read-playback-state", "user-modify-playback-state"),
        ..Default::default()
    };
    AuthCodeSpotify::with_config(
        ClientCredentials::new(&credentials.client_id, &credentials.client_secret),
        oauth,
        config,
    )
}

/// Reuses the cached token when there is one. Otherwise sends the user to the authorize URL and
/// reads the redirect back from stdin. The token ends up in the cache either way.
pub fn login(spotify: &AuthCodeSpotify) -> anyhow::Result<()> {
    let url = spotify
        .get_authorize_url(false)
        .context("unable to build the authorization URL")?;
    spotify
        .prompt_for_token(&url)
        .context("Spotify authorization failed")
}

/// The player endpoints of the Web API, on behalf of a logged in user
pub struct SpotifyClient {
    spotify: AuthCodeSpotify,
}

impl SpotifyClient {
    /// Picks up the token left behind by `pidash login`, expired or not. Fails if there is none.
    pub fn from_cache(spotify: AuthCodeSpotify) -> anyhow::Result<SpotifyClient> {
        let cache_path = spotify.get_config().cache_path.clone();
        let token = spotify
            .read_token_cache(true)
            .ok()
            .flatten()
            .ok_or_else(|| {
                anyhow!(
                    "no usable Spotify token at {}; run `pidash login` first",
                    cache_path.display()
                )
            })?;
        *spotify
            .get_token()
            .lock()
            .map_err(|_| anyhow!("Spotify token lock poisoned"))? = Some(token);
        Ok(SpotifyClient { spotify })
    }

    /// Marks the current token as expired so the next request refreshes it
    fn expire_token(&self) {
        if let Ok(mut token) = self.spotify.get_token().lock() {
            if let Some(token) = token.as_mut() {
                token.expires_at = Some(Utc::now());
            }
        }
    }

    fn fetch_error(&self, err: ClientError) -> FetchError {
        match err {
            ClientError::Http(http) => match *http {
                HttpError::StatusCode(response) => match response.status() {
                    401 => {
                        self.expire_token();
                        FetchError::Unauthorized
                    }
                    // No active device
                    404 => FetchError::NoActivePlayback,
                    status => FetchError::InvalidResponse(format!("HTTP status {status}")),
                },
                other => FetchError::Network(other.to_string()),
            },
            ClientError::Io(err) => FetchError::Network(err.to_string()),
            ClientError::InvalidToken => {
                warn!("no Spotify access token available");
                FetchError::Unauthorized
            }
            other => FetchError::InvalidResponse(other.to_string()),
        }
    }
}

impl MusicClient for SpotifyClient {
    fn current_playback(&mut self) -> Result<Option<Playback>, FetchError> {
        let context = self
            .spotify
            .current_playback(
                None,
                Some(&[AdditionalType::Track, AdditionalType::Episode]),
            )
            .map_err(|err| self.fetch_error(err))?;
        debug!("playback context present: {}", context.is_some());
        Ok(context.and_then(playback))
    }

    fn play(&mut self) -> Result<(), FetchError> {
        self.spotify
            .resume_playback(None, None)
            .map_err(|err| self.fetch_error(err))
    }

    fn pause(&mut self) -> Result<(), FetchError> {
        self.spotify
            .pause_playback(None)
            .map_err(|err| self.fetch_error(err))
    }

    fn next_track(&mut self) -> Result<(), FetchError> {
        self.spotify
            .next_track(None)
            .map_err(|err| self.fetch_error(err))
    }
}

/// `None` when the player has nothing loaded. Episodes show their show in place of the artist.
fn playback(context: CurrentPlaybackContext) -> Option<Playback> {
    let (title, artists, images) = match context.item? {
        PlayableItem::Track(track) => (
            track.name,
            track.artists.into_iter().map(|artist| artist.name).collect(),
            track.album.images,
        ),
        PlayableItem::Episode(episode) => {
            let images = if episode.images.is_empty() {
                episode.show.images
            } else {
                episode.images
            };
            (episode.name, vec![episode.show.name], images)
        }
    };
    Some(Playback {
        is_playing: context.is_playing,
        title,
        artists,
        album_art_url: largest_image(&images),
    })
}

/// Widest wins, ties go to the first listed
fn largest_image(images: &[Image]) -> Option<String> {
    images
        .iter()
        .enumerate()
        .max_by_key(|(idx, image)| (image.width.unwrap_or(0), Reverse(*idx)))
        .map(|(_, image)| image.url.clone())
}

#[cfg(test)]
mod test {
    use super::{largest_image, with_config, Credentials, SpotifyClient};
    use crate::{
        source::{FetchError, MusicClient, Playback, PlaybackSource, StateSource},
        test_util::{serve, Reply},
    };
    use chrono::{TimeDelta, Utc};
    use rspotify::{model::Image, prelude::*, scopes, Config as ClientConfig, Token};

    const TRACK_JSON: &str = r#"{
        "device": {
            "id": "5fbb3ba6aa454b5534c4ba43a8c7e8e45a63ad0e",
            "is_active": true,
            "is_private_session": false,
            "is_restricted": false,
            "name": "raspberrypi",
            "type": "Computer",
            "volume_percent": 80
        },
        "repeat_state": "off",
        "shuffle_state": false,
        "context": null,
        "timestamp": 1709643723000,
        "progress_ms": 1234,
        "is_playing": true,
        "item": {
            "album": {
                "album_type": "album",
                "total_tracks": 11,
                "available_markets": ["GB", "US"],
                "external_urls": {"spotify": "https://open.spotify.com/album/49MNmJhZQewjt06rpwp6QR"},
                "href": "https://api.spotify.com/v1/albums/49MNmJhZQewjt06rpwp6QR",
                "id": "49MNmJhZQewjt06rpwp6QR",
                "images": [
                    {"url": "https://i.scdn.co/image/medium", "width": 300, "height": 300},
                    {"url": "https://i.scdn.co/image/large", "width": 640, "height": 640},
                    {"url": "https://i.scdn.co/image/small", "width": 64, "height": 64}
                ],
                "name": "Mezzanine",
                "release_date": "1998-04-20",
                "release_date_precision": "day",
                "type": "album",
                "uri": "spotify:album:49MNmJhZQewjt06rpwp6QR",
                "artists": [
                    {
                        "external_urls": {"spotify": "https://open.spotify.com/artist/6FXMGgJwohJLUSr5nVlf9X"},
                        "href": "https://api.spotify.com/v1/artists/6FXMGgJwohJLUSr5nVlf9X",
                        "id": "6FXMGgJwohJLUSr5nVlf9X",
                        "name": "Massive Attack",
                        "type": "artist",
                        "uri": "spotify:artist:6FXMGgJwohJLUSr5nVlf9X"
                    }
                ]
            },
            "artists": [
                {
                    "external_urls": {"spotify": "https://open.spotify.com/artist/6FXMGgJwohJLUSr5nVlf9X"},
                    "href": "https://api.spotify.com/v1/artists/6FXMGgJwohJLUSr5nVlf9X",
                    "id": "6FXMGgJwohJLUSr5nVlf9X",
                    "name": "Massive Attack",
                    "type": "artist",
                    "uri": "spotify:artist:6FXMGgJwohJLUSr5nVlf9X"
                },
                {
                    "external_urls": {"spotify": "https://open.spotify.com/artist/3YQKmKGau1PzlVlkL1iodx"},
                    "href": "https://api.spotify.com/v1/artists/3YQKmKGau1PzlVlkL1iodx",
                    "id": "3YQKmKGau1PzlVlkL1iodx",
                    "name": "Elizabeth Fraser",
                    "type": "artist",
                    "uri": "spotify:artist:3YQKmKGau1PzlVlkL1iodx"
                }
            ],
            "available_markets": ["GB", "US"],
            "disc_number": 1,
            "duration_ms": 330773,
            "explicit": false,
            "external_ids": {"isrc": "GBAAA9800026"},
            "external_urls": {"spotify": "https://open.spotify.com/track/67Hna13dNDkZvBpTXRIaOJ"},
            "href": "https://api.spotify.com/v1/tracks/67Hna13dNDkZvBpTXRIaOJ",
            "id": "67Hna13dNDkZvBpTXRIaOJ",
            "is_local": false,
            "name": "Teardrop",
            "popularity": 71,
            "preview_url": null,
            "track_number": 3,
            "type": "track",
            "uri": "spotify:track:67Hna13dNDkZvBpTXRIaOJ"
        },
        "currently_playing_type": "track",
        "actions": {"disallows": {"resuming": true}}
    }"#;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
        }
    }

    fn token(access_token: &str, valid_for: TimeDelta) -> Token {
        Token {
            access_token: access_token.to_string(),
            expires_in: valid_for,
            expires_at: Some(Utc::now() + valid_for),
            refresh_token: Some("refresh-me".to_string()),
            scopes: scopes!("user-read-playback-state", "user-modify-playback-state"),
        }
    }

    /// A client holding a valid token, with both the API and the accounts service at `base_url`
    fn client(base_url: &str) -> SpotifyClient {
        let spotify = with_config(
            &credentials(),
            ClientConfig {
                api_base_url: format!("{base_url}/v1/"),
                auth_base_url: format!("{base_url}/"),
                token_refreshing: true,
                ..Default::default()
            },
        );
        if let Ok(mut slot) = spotify.get_token().lock() {
            *slot = Some(token("good-token", TimeDelta::hours(1)));
        }
        SpotifyClient { spotify }
    }

    fn current_token(client: &SpotifyClient) -> Option<Token> {
        let token = client.spotify.get_token();
        let slot = token.lock().ok()?;
        (*slot).clone()
    }

    #[test]
    fn test_current_playback() {
        let (base_url, requests) = serve(vec![Reply::new("200 OK", TRACK_JSON)]);
        let mut client = client(&base_url);

        assert_eq!(
            client.current_playback().unwrap(),
            Some(Playback {
                is_playing: true,
                title: "Teardrop".to_string(),
                artists: vec!["Massive Attack".to_string(), "Elizabeth Fraser".to_string()],
                album_art_url: Some("https://i.scdn.co/image/large".to_string()),
            })
        );

        let request = requests.recv().unwrap();
        assert!(request.starts_with("GET /v1/me/player"));
        assert!(request.contains("Bearer good-token"));
    }

    #[test]
    fn test_nothing_playing() {
        let (base_url, _requests) = serve(vec![Reply::empty("204 No Content")]);

        let mut source = PlaybackSource::new(client(&base_url));
        let err = source.fetch().unwrap_err();
        assert_eq!(err, FetchError::NoActivePlayback);
        assert_eq!(err.fallback_state().primary_text, "No track playing");
    }

    #[test]
    fn test_unauthorized_then_refresh() {
        let (base_url, requests) = serve(vec![
            Reply::new("401 Unauthorized", r#"{"error":{"status":401}}"#),
            Reply::new(
                "200 OK",
                r#"{"access_token":"new-token","token_type":"Bearer","expires_in":3600}"#,
            ),
            Reply::empty("204 No Content"),
        ]);
        let mut client = client(&base_url);

        assert_eq!(client.current_playback(), Err(FetchError::Unauthorized));
        assert!(current_token(&client).unwrap().is_expired());
        assert_eq!(client.current_playback(), Ok(None));
        assert_eq!(current_token(&client).unwrap().access_token, "new-token");

        let _rejected = requests.recv().unwrap();
        let refresh = requests.recv().unwrap();
        assert!(refresh.starts_with("POST /api/token"));
        assert!(refresh.contains("grant_type=refresh_token"));
        let retried = requests.recv().unwrap();
        assert!(retried.contains("Bearer new-token"));
    }

    #[test]
    fn test_controls() {
        let (base_url, requests) = serve(vec![
            Reply::empty("204 No Content"),
            Reply::empty("204 No Content"),
            Reply::new("404 Not Found", r#"{"error":{"reason":"NO_ACTIVE_DEVICE"}}"#),
        ]);
        let mut client = client(&base_url);

        client.play().unwrap();
        client.pause().unwrap();
        assert_eq!(client.next_track(), Err(FetchError::NoActivePlayback));

        let request_lines: Vec<String> = requests
            .iter()
            .take(3)
            .map(|request| request.lines().next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            request_lines,
            vec![
                "PUT /v1/me/player/play HTTP/1.1",
                "PUT /v1/me/player/pause HTTP/1.1",
                "POST /v1/me/player/next HTTP/1.1",
            ]
        );
    }

    #[test]
    fn test_server_error() {
        let (base_url, _requests) = serve(vec![Reply::new("502 Bad Gateway", "upstream")]);
        let mut client = client(&base_url);

        match client.current_playback() {
            Err(FetchError::InvalidResponse(message)) => assert!(message.contains("502")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("token.json");
        let config = || ClientConfig {
            token_cached: true,
            cache_path: cache_path.clone(),
            ..Default::default()
        };

        assert!(SpotifyClient::from_cache(with_config(&credentials(), config())).is_err());

        let cached = token("cached-token", TimeDelta::seconds(-30));
        std::fs::write(&cache_path, serde_json::to_string(&cached).unwrap()).unwrap();
        let client = SpotifyClient::from_cache(with_config(&credentials(), config())).unwrap();
        // Expired tokens are kept, they get refreshed on first use
        let loaded = current_token(&client).unwrap();
        assert_eq!(loaded.access_token, "cached-token");
    }

    #[test]
    fn test_largest_image() {
        let image = |url: &str, width: Option<u32>| Image {
            height: width,
            url: url.to_string(),
            width,
        };
        assert_eq!(largest_image(&[]), None);
        assert_eq!(
            largest_image(&[image("a", Some(64)), image("b", Some(640)), image("c", Some(640))]),
            Some("b".to_string())
        );
        assert_eq!(
            largest_image(&[image("first", None), image("second", None)]),
            Some("first".to_string())
        );
    }
}
