use image::{imageops::FilterType, ImageReader, RgbImage};
use log::debug;
use reqwest::blocking::Client;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
/// File name the cover on screen is downloaded to. Each new cover replaces the previous one.
pub const COVER_FILE: &str = "current_cover";

#[derive(Debug, thiserror::Error)]
pub enum ArtworkError {
    #[error("no album cover URL was provided")]
    MissingUrl,
    #[error("could not download the album cover: {0}")]
    Download(#[source] reqwest::Error),
    #[error("could not access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode the album cover: {0}")]
    Decode(#[source] image::ImageError),
}

/// Downloads the image at `url` into `save_path`, creating the parent directory when needed.
/// A missing URL fails before anything on disk is touched.
pub fn download_album_cover(
    client: &Client,
    url: Option<&str>,
    save_path: &Path,
) -> Result<(), ArtworkError> {
    let url = url
        .filter(|url| !url.is_empty())
        .ok_or(ArtworkError::MissingUrl)?;

    if let Some(parent) = save_path.parent() {
        fs::create_dir_all(parent).map_err(|source| ArtworkError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let body = client
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(ArtworkError::Download)?;

    fs::write(save_path, &body).map_err(|source| ArtworkError::Io {
        path: save_path.to_path_buf(),
        source,
    })?;
    debug!("saved {} bytes of album art to {}", body.len(), save_path.display());
    Ok(())
}

/// Loads an image from disk and scales it to `width` x `height` (at least 1x1). The format is
/// sniffed from the content since cover URLs carry no extension.
pub fn decode_cover(path: &Path, width: u32, height: u32) -> Result<RgbImage, ArtworkError> {
    let io_err = |source: std::io::Error| ArtworkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let image = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(ArtworkError::Decode)?
        .to_rgb8();

    Ok(image::imageops::resize(
        &image,
        width.max(1),
        height.max(1),
        FilterType::Lanczos3,
    ))
}

#[cfg(test)]
mod test {
    use super::{decode_cover, download_album_cover, ArtworkError};
    use crate::test_util::{serve, Reply};
    use image::RgbImage;
    use reqwest::blocking::Client;

    /// Serves `body` once and returns a cover-like URL pointing at it
    fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let (base_url, _) = serve(vec![Reply {
            status,
            content_type: "image/jpeg",
            body,
        }]);
        format!("{base_url}/image/ab67616d0000b273")
    }

    #[test]
    fn test_missing_url_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let path = nested.join("cover");

        let err = download_album_cover(&Client::new(), None, &path).unwrap_err();
        assert!(matches!(err, ArtworkError::MissingUrl));
        let err = download_album_cover(&Client::new(), Some(""), &path).unwrap_err();
        assert!(matches!(err, ArtworkError::MissingUrl));
        assert!(!nested.exists());
    }

    #[test]
    fn test_download_creates_parent_and_writes_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covers").join("cover");
        let body: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let url = serve_once("200 OK", body.clone());

        download_album_cover(&Client::new(), Some(&url), &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), body);
    }

    #[test]
    fn test_download_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover");
        let url = serve_once("404 Not Found", b"nope".to_vec());

        let err = download_album_cover(&Client::new(), Some(&url), &path).unwrap_err();
        assert!(matches!(err, ArtworkError::Download(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_decode_and_resize() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("art.png");
        RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
            .save(&png)
            .unwrap();
        // Same bytes without an extension, the way downloaded covers are stored
        let bare = dir.path().join("art");
        std::fs::copy(&png, &bare).unwrap();

        let decoded = decode_cover(&bare, 4, 2).unwrap();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert!(decoded.get_pixel(0, 0).0[0] > 190);

        let tiny = decode_cover(&bare, 0, 0).unwrap();
        assert_eq!(tiny.dimensions(), (1, 1));
    }

    #[test]
    fn test_decode_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover");
        std::fs::write(&path, b"definitely not an image").unwrap();

        assert!(matches!(
            decode_cover(&path, 4, 4),
            Err(ArtworkError::Decode(_))
        ));
        assert!(matches!(
            decode_cover(&dir.path().join("absent"), 4, 4),
            Err(ArtworkError::Io { .. })
        ));
    }
}
