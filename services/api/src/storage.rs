//! Recipe image storage
//!
//! Uploaded bytes are decoded before anything is written, so only real images
//! reach a backend. Decoding runs under [`ImageLimits`] so a small file that
//! declares a huge canvas is rejected before its pixel buffer is allocated.
//! Backends address blobs by key and know how to turn a key into a public URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use image::{ImageFormat, ImageReader, Limits};
use std::collections::HashMap;
use std::io::{Cursor, ErrorKind};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::config::{MediaBackend, MediaSettings};

/// Namespace of recipe image keys
pub const RECIPE_IMAGE_PREFIX: &str = "uploads/recipe";

pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Bytes that decoded as one of the accepted formats
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ValidatedImage {
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
            _ => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Decode ceilings applied to uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Largest width or height in pixels
    pub max_dimension: u32,
    /// Largest buffer the decoder may allocate
    pub max_alloc: u64,
}

impl From<&MediaSettings> for ImageLimits {
    fn from(settings: &MediaSettings) -> Self {
        Self {
            max_dimension: settings.max_image_dimension,
            max_alloc: settings.max_decode_bytes,
        }
    }
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self::from(&MediaSettings::default())
    }
}

impl ImageLimits {
    fn decoder_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits.max_alloc = Some(self.max_alloc);
        limits
    }
}

/// Check that `bytes` hold a decodable png, jpeg, gif or webp image within
/// `limits`
///
/// Decoding is CPU bound; async callers should run this on the blocking pool.
pub fn inspect_image(bytes: Vec<u8>, limits: &ImageLimits) -> Result<ValidatedImage, String> {
    if bytes.is_empty() {
        return Err(EMPTY_FILE.to_string());
    }

    let format = image::guess_format(&bytes).map_err(|_| INVALID_IMAGE.to_string())?;
    if !matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(INVALID_IMAGE.to_string());
    }

    let mut reader = ImageReader::with_format(Cursor::new(bytes.as_slice()), format);
    reader.limits(limits.decoder_limits());
    reader.decode().map_err(|_| INVALID_IMAGE.to_string())?;

    Ok(ValidatedImage { bytes, format })
}

/// Fresh key for a recipe image, e.g. `uploads/recipe/<uuid>.png`
pub fn image_key(image: &ValidatedImage) -> String {
    format!(
        "{}/{}.{}",
        RECIPE_IMAGE_PREFIX,
        Uuid::new_v4(),
        image.extension()
    )
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Blob store for recipe images
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Write an image under `key`
    async fn put(&self, key: &str, image: &ValidatedImage) -> Result<()>;

    /// Remove the blob under `key`; a missing blob is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Public URL of `key`
    fn url(&self, key: &str) -> String;
}

/// Build the backend selected in `settings`
pub async fn from_settings(settings: &MediaSettings) -> Result<Arc<dyn ImageStorage>> {
    match settings.backend {
        MediaBackend::Local => {
            info!("Storing images under {}", settings.root.display());
            Ok(Arc::new(LocalImageStorage::new(
                settings.root.clone(),
                settings.public_url.clone(),
            )))
        }
        MediaBackend::S3 => {
            let bucket = settings
                .bucket
                .clone()
                .context("media.bucket must be set for the s3 backend")?;
            info!("Storing images in S3 bucket {}", bucket);

            let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = Client::new(&config);
            Ok(Arc::new(S3ImageStorage::new(
                client,
                bucket,
                settings.public_url.clone(),
            )))
        }
    }
}

/// Images as files below a root directory
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalImageStorage {
    pub fn new(root: PathBuf, public_url: String) -> Self {
        Self { root, public_url }
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn put(&self, key: &str, image: &ValidatedImage) -> Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tokio::fs::write(&path, &image.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_url, key)
    }
}

/// Images as objects in an S3 bucket
#[derive(Clone)]
pub struct S3ImageStorage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3ImageStorage {
    pub fn new(client: Client, bucket: String, public_url: String) -> Self {
        Self {
            client,
            bucket,
            public_url,
        }
    }
}

#[async_trait]
impl ImageStorage for S3ImageStorage {
    async fn put(&self, key: &str, image: &ValidatedImage) -> Result<()> {
        info!("Uploading image to S3: {}", key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(image.bytes.clone()))
            .content_type(image.content_type())
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", key))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete {}", key))?;

        Ok(())
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.public_url, key)
    }
}

/// Images kept in process memory, for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryImageStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ImageStorage for MemoryImageStorage {
    async fn put(&self, key: &str, image: &ValidatedImage) -> Result<()> {
        self.objects
            .lock()
            .await
            .insert(key.to_string(), image.bytes.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        join_url("/media", key)
    }
}
