//! Simulated camera frames.
//!
//! Cameras show uniform RGB noise. During a reveal window one camera shows a
//! placeholder image fetched through an [`AssetFetcher`]. Fetching is best
//! effort: any failure turns into a "buffering" frame and playback carries on.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};

/// Caption shown when a placeholder could not be loaded.
pub const BUFFERING_CAPTION: &str = "Video Stream Buffer... Retrying";

/// Upper bound on a fetched asset, in bytes.
const MAX_ASSET_BYTES: u64 = 8 * 1024 * 1024;

/// Dimensions and intensity ceiling for noise frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseSpec {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Channel values are drawn from `0..ceiling`.
    pub ceiling: u8,
}

impl Default for NoiseSpec {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            ceiling: 50,
        }
    }
}

impl NoiseSpec {
    /// Generate one noise frame.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RgbImage {
        let ceiling = self.ceiling.max(1);
        RgbImage::from_fn(self.width, self.height, |_, _| {
            Rgb([
                rng.gen_range(0..ceiling),
                rng.gen_range(0..ceiling),
                rng.gen_range(0..ceiling),
            ])
        })
    }
}

/// What a camera panel shows on one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedFrame {
    /// Static noise.
    Noise {
        /// The frame.
        frame: RgbImage,
        /// Caption under the frame.
        caption: String,
    },
    /// A fetched placeholder image.
    Asset {
        /// The decoded image.
        image: RgbImage,
        /// Caption under the image.
        caption: String,
    },
    /// The placeholder could not be loaded.
    Buffering {
        /// Caption under the empty panel.
        caption: String,
    },
}

impl FeedFrame {
    /// Short kind name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Noise { .. } => "noise",
            Self::Asset { .. } => "asset",
            Self::Buffering { .. } => "buffering",
        }
    }

    /// Caption text.
    #[must_use]
    pub fn caption(&self) -> &str {
        match self {
            Self::Noise { caption, .. }
            | Self::Asset { caption, .. }
            | Self::Buffering { caption } => caption,
        }
    }

    /// Pixel dimensions, if there is an image.
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Noise { frame: img, .. } | Self::Asset { image: img, .. } => {
                Some(img.dimensions())
            }
            Self::Buffering { .. } => None,
        }
    }

    /// Mean channel intensity, if there is an image.
    #[must_use]
    pub fn mean_intensity(&self) -> Option<f64> {
        let img = match self {
            Self::Noise { frame, .. } => frame,
            Self::Asset { image, .. } => image,
            Self::Buffering { .. } => return None,
        };
        let raw = img.as_raw();
        if raw.is_empty() {
            return Some(0.0);
        }
        let total: u64 = raw.iter().map(|&b| u64::from(b)).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / raw.len() as f64;
        Some(mean)
    }
}

/// Source of placeholder images.
pub trait AssetFetcher: Send + Sync + std::fmt::Debug {
    /// Fetch the raw bytes for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetFetchFailed`] if the asset cannot be retrieved.
    fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Fetcher that always fails. Used when no asset source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableAssetFetcher;

impl AssetFetcher for UnavailableAssetFetcher {
    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        Err(Error::asset_fetch_failed(key, "no asset source configured"))
    }
}

/// Reads assets from a directory, trying `key`, `key.png` and `key.jpg`.
#[derive(Debug, Clone)]
pub struct DirectoryAssetFetcher {
    root: PathBuf,
}

impl DirectoryAssetFetcher {
    /// Create a fetcher rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl AssetFetcher for DirectoryAssetFetcher {
    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        if key.contains("..") || Path::new(key).is_absolute() {
            return Err(Error::asset_fetch_failed(key, "key escapes asset directory"));
        }

        let candidates = [
            self.root.join(key),
            self.root.join(format!("{key}.png")),
            self.root.join(format!("{key}.jpg")),
        ];
        for path in &candidates {
            if path.is_file() {
                return std::fs::read(path)
                    .map_err(|e| Error::asset_fetch_failed(key, e.to_string()));
            }
        }
        Err(Error::asset_fetch_failed(
            key,
            format!("not found under {}", self.root.display()),
        ))
    }
}

/// Fetches assets over HTTP. `{key}` in the URL template is replaced by the key.
#[derive(Debug)]
pub struct HttpAssetFetcher {
    url_template: String,
    agent: ureq::Agent,
}

impl HttpAssetFetcher {
    /// Create a fetcher with a per-request timeout.
    #[must_use]
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url_template: url_template.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    /// URL requested for `key`.
    #[must_use]
    pub fn url_for(&self, key: &str) -> String {
        self.url_template.replace("{key}", key)
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.url_for(key);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| Error::asset_fetch_failed(key, e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_ASSET_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| Error::asset_fetch_failed(key, e.to_string()))?;
        Ok(bytes)
    }
}

/// Fetch and decode a placeholder, blocking the current thread.
///
/// # Errors
///
/// Returns [`Error::AssetFetchFailed`] if the fetch or the decode fails.
pub fn load_placeholder(fetcher: &dyn AssetFetcher, key: &str) -> Result<RgbImage> {
    let bytes = fetcher.fetch(key)?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| Error::asset_fetch_failed(key, format!("decode failed: {e}")))?;
    Ok(image.to_rgb8())
}

/// Best-effort placeholder frame. Never fails.
///
/// The fetch runs on tokio's blocking pool.
pub async fn fetch_placeholder(
    fetcher: Arc<dyn AssetFetcher>,
    key: &str,
    caption: String,
) -> FeedFrame {
    let owned_key = key.to_string();
    let result = tokio::task::spawn_blocking(move || load_placeholder(fetcher.as_ref(), &owned_key))
        .await
        .unwrap_or_else(|e| Err(Error::asset_fetch_failed(key, e.to_string())));

    match result {
        Ok(image) => FeedFrame::Asset { image, caption },
        Err(err) => {
            debug!(key, error = %err, "Placeholder unavailable, showing buffering frame");
            FeedFrame::Buffering {
                caption: BUFFERING_CAPTION.to_string(),
            }
        }
    }
}
