//! Read-only `zarrs` storage backed by a public HTTP object store

use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use zarrs::storage::{
    byte_range::{ByteRange, ByteRangeIterator},
    MaybeBytes, MaybeBytesIterator, ReadableStorageTraits, StorageError, StoreKey,
};

use crate::error::Result;

/// Path template of the OME-Zarr v0.1 mirror on the IDR object store.
/// The store is rooted at the `.zarr` group; resolution levels and the
/// `labels` hierarchy hang below it as node paths.
pub fn image_root_url(endpoint: &str, image_id: u64) -> String {
    format!(
        "{}/idr/zarr/v0.1/{image_id}.zarr",
        endpoint.trim_end_matches('/')
    )
}

/// HTTP store for a single Zarr hierarchy. Every key becomes one GET of
/// `<base>/<key>`; a 404 is reported as an absent key so metadata probing
/// and missing-chunk fills behave like a local store.
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("slicescope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Store for `<endpoint>/idr/zarr/v0.1/<image_id>.zarr`.
    pub fn for_image(endpoint: &str, image_id: u64) -> Result<Self> {
        Self::new(image_root_url(endpoint, image_id))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a store key.
    pub fn key_url(&self, key: &StoreKey) -> String {
        format!("{}/{}", self.base_url, key.as_str())
    }
}

impl ReadableStorageTraits for HttpStore {
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let url = self.key_url(key);
        let response = self
            .client
            .head(&url)
            .send()
            .map_err(|e| StorageError::Other(format!("HEAD {url}: {e}")))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(response.content_length()),
            status => Err(StorageError::Other(format!("HEAD {url}: HTTP {status}"))),
        }
    }

    fn supports_get_partial(&self) -> bool {
        false
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let url = self.key_url(key);
        log::debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| StorageError::Other(format!("GET {url}: {e}")))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Bytes = response
                    .bytes()
                    .map_err(|e| StorageError::Other(format!("GET {url}: {e}")))?;
                Ok(Some(body))
            }
            status => Err(StorageError::Other(format!("GET {url}: HTTP {status}"))),
        }
    }

    fn get_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial_many not supported".into(),
        ))
    }

    fn get_partial(
        &self,
        _key: &StoreKey,
        _byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial not supported".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_root_follows_the_mirror_layout() {
        assert_eq!(
            image_root_url("https://uk1s3.embassy.ebi.ac.uk", 6001247),
            "https://uk1s3.embassy.ebi.ac.uk/idr/zarr/v0.1/6001247.zarr"
        );
        // trailing slash on the endpoint collapses
        assert_eq!(
            image_root_url("https://example.org/", 42),
            "https://example.org/idr/zarr/v0.1/42.zarr"
        );
    }

    #[test]
    fn keys_resolve_below_the_image_root() {
        let store = HttpStore::for_image("https://uk1s3.embassy.ebi.ac.uk", 6001247).unwrap();
        let chunk = StoreKey::new("0/0.0.130.0.0").unwrap();
        assert_eq!(
            store.key_url(&chunk),
            "https://uk1s3.embassy.ebi.ac.uk/idr/zarr/v0.1/6001247.zarr/0/0.0.130.0.0"
        );
        let meta = StoreKey::new("labels/0/.zarray").unwrap();
        assert_eq!(
            store.key_url(&meta),
            "https://uk1s3.embassy.ebi.ac.uk/idr/zarr/v0.1/6001247.zarr/labels/0/.zarray"
        );
    }
}
