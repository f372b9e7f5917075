//! Object storage backends

use crate::config::StorageConfig;
use crate::error::{PipelineError, Result};
use crate::utils::write_atomic;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Public GCS XML API endpoint
pub const GCS_ENDPOINT: &str = "https://storage.googleapis.com/";

/// Environment variable holding an OAuth2 access token for private buckets
pub const GCS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// A place objects can be fetched from
pub trait ObjectStore: Send + Sync {
    /// Copy `bucket/key` to `dest`, returning the number of bytes written.
    ///
    /// `dest` is only replaced once the whole object has been received.
    fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64>;

    /// Human-readable location of an object, for logs
    fn describe(&self, bucket: &str, key: &str) -> String;
}

/// Build the store selected by the configuration
pub fn from_config(config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    match config {
        StorageConfig::Gcs { endpoint } => {
            let store = match endpoint {
                Some(endpoint) => GcsObjectStore::with_endpoint(endpoint)?,
                None => GcsObjectStore::new()?,
            };
            Ok(Box::new(store))
        }
        StorageConfig::Local { root } => Ok(Box::new(LocalObjectStore::new(root))),
    }
}

/// Google Cloud Storage over the XML API
pub struct GcsObjectStore {
    endpoint: Url,
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl GcsObjectStore {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(GCS_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PipelineError::config_with(format!("Invalid storage endpoint '{}'", endpoint), e))?;
        if endpoint.cannot_be_a_base() {
            return Err(PipelineError::config(format!("Storage endpoint '{}' cannot hold a path", endpoint)));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent(concat!("booking-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::ingestion("Failed to create HTTP client", e))?;

        let token = std::env::var(GCS_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());

        Ok(Self { endpoint, client, token })
    }

    /// Use an explicit bearer token instead of the environment
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// `<endpoint>/<bucket>/<key>` with every path segment escaped
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PipelineError::config(format!("Storage endpoint '{}' cannot hold a path", self.endpoint)))?;
            segments.pop_if_empty().push(bucket);
            for part in key.split('/') {
                segments.push(part);
            }
        }
        Ok(url)
    }
}

impl ObjectStore for GcsObjectStore {
    fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let url = self.object_url(bucket, key)?;
        debug!(url = %url, "Requesting object");

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let mut response = request
            .send()
            .map_err(|e| PipelineError::ingestion(format!("Request to {} failed", url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::IngestionError {
                message: format!(
                    "Object gs://{}/{} could not be fetched: HTTP {} {}",
                    bucket,
                    key,
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
                source: None,
            });
        }

        let mut written = 0;
        write_atomic(dest, |file| {
            written = response
                .copy_to(file)
                .map_err(|e| PipelineError::ingestion("Failed to read object body", e))?;
            Ok(())
        })?;

        info!(bucket, key, bytes = written, "Object downloaded");
        Ok(written)
    }

    fn describe(&self, bucket: &str, key: &str) -> String {
        format!("gs://{}/{}", bucket, key)
    }
}

/// Directory tree laid out as `<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

impl ObjectStore for LocalObjectStore {
    fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let source = self.object_path(bucket, key);
        let mut input = std::fs::File::open(&source)
            .map_err(|e| PipelineError::ingestion(format!("Cannot open object {}", source.display()), e))?;

        let mut written = 0;
        write_atomic(dest, |file| {
            written = std::io::copy(&mut input, file)?;
            Ok(())
        })?;

        info!(source = %source.display(), bytes = written, "Object copied");
        Ok(written)
    }

    fn describe(&self, bucket: &str, key: &str) -> String {
        self.object_path(bucket, key).display().to_string()
    }
}
