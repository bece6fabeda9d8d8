//! Image size probing with a per-build cache.
//!
//! Two caches are used during a build: one keyed by image URL for feature images
//! shared between posts, pages and tags, and one keyed by author slug where the
//! profile and cover images of an author occupy separate slots. Each slot is probed
//! at most once; failed probes are remembered as "unknown" instead of retried.

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::model::ImageDimensions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimensionKind {
    Feature,
    Profile,
    Cover,
}

#[derive(Debug, Clone, Default)]
pub struct DimensionCache {
    slots: HashMap<String, HashMap<DimensionKind, Option<ImageDimensions>>>,
}

impl DimensionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` means the slot was probed and the probe failed.
    pub fn get(&self, key: &str, kind: DimensionKind) -> Option<Option<ImageDimensions>> {
        self.slots.get(key).and_then(|slots| slots.get(&kind)).copied()
    }

    pub fn insert(&mut self, key: &str, kind: DimensionKind, value: Option<ImageDimensions>) {
        self.slots
            .entry(key.to_string())
            .or_default()
            .insert(kind, value);
    }

    pub fn len(&self) -> usize {
        self.slots.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bytes of a remote image read before giving up on finding its header.
pub const HEADER_READ_LIMIT: usize = 256 * 1024;

#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ImageDimensions, ProbeError>;
}

/// Reads dimensions of remote images over HTTP and of local files from disk.
#[derive(Debug, Clone)]
pub struct HttpImageProbe {
    client: Client,
}

impl HttpImageProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &str) -> Result<ImageDimensions, ProbeError> {
        let remote = if url.starts_with("//") {
            Some(format!("https:{url}"))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.to_string())
        } else {
            None
        };

        let Some(remote) = remote else {
            let (width, height) = image::image_dimensions(url)?;
            return Ok(ImageDimensions { width, height });
        };

        let mut response = self.client.get(&remote).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        let mut header = HeaderBuffer::default();
        while let Some(chunk) = response.chunk().await? {
            if let Some(dimensions) = header.push(&chunk)? {
                debug!(url = %remote, bytes_read = header.len(), "Image header found");
                return Ok(dimensions);
            }
        }
        header.finish()
    }
}

/// Start of an image body, grown chunk by chunk until its dimensions decode.
#[derive(Debug, Default)]
struct HeaderBuffer {
    bytes: Vec<u8>,
}

impl HeaderBuffer {
    /// `Ok(None)` means more bytes are needed.
    fn push(&mut self, chunk: &[u8]) -> Result<Option<ImageDimensions>, ProbeError> {
        self.bytes.extend_from_slice(chunk);
        if let Ok(dimensions) = self.decode() {
            return Ok(Some(dimensions));
        }
        if self.bytes.len() >= HEADER_READ_LIMIT {
            return Err(ProbeError::HeaderNotFound(HEADER_READ_LIMIT));
        }
        Ok(None)
    }

    /// Called once the body ended without a decodable header.
    fn finish(self) -> Result<ImageDimensions, ProbeError> {
        self.decode()
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn decode(&self) -> Result<ImageDimensions, ProbeError> {
        let (width, height) = image::ImageReader::new(Cursor::new(self.bytes.as_slice()))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(ImageDimensions { width, height })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub url: String,
    pub error: String,
}

pub struct DimensionResolver<'p> {
    probe: &'p dyn ImageProbe,
    failures: Vec<ProbeFailure>,
}

impl<'p> DimensionResolver<'p> {
    pub fn new(probe: &'p dyn ImageProbe) -> Self {
        Self {
            probe,
            failures: Vec::new(),
        }
    }

    /// Dimensions of the image at `url`, cached in `cache` under `key`/`kind`.
    pub async fn resolve(
        &mut self,
        cache: &mut DimensionCache,
        url: &str,
        key: &str,
        kind: DimensionKind,
    ) -> Option<ImageDimensions> {
        if let Some(cached) = cache.get(key, kind) {
            debug!(%url, %key, ?kind, "Image dimensions cache hit");
            return cached;
        }

        let resolved = match self.probe.probe(url).await {
            Ok(dimensions) => Some(dimensions),
            Err(error) => {
                warn!(%url, %error, "Could not probe image dimensions");
                self.failures.push(ProbeFailure {
                    url: url.to_string(),
                    error: error.to_string(),
                });
                None
            }
        };

        cache.insert(key, kind, resolved);
        resolved
    }

    pub fn failures(&self) -> &[ProbeFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<ProbeFailure> {
        self.failures
    }
}
