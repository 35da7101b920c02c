//! In-memory cache of serialised responses.
//!
//! Entries are keyed by the MD5 digest of every input file's content together with the request
//! parameters, so replacing a staged file with new content never serves a stale response.

use crate::error::FlowmapError;
use crate::resample::BucketOrigin;

use axum::body::Bytes;
use cached::{Cached, SizedCache};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Identity of a cached response.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey {
    route: &'static str,
    digests: Vec<[u8; 16]>,
    resample_hours: u32,
    origin: BucketOrigin,
}

impl CacheKey {
    /// Build a key from the content of the input files.
    ///
    /// # Arguments
    ///
    /// * `route`: Endpoint producing the response
    /// * `paths`: Input files, hashed in order
    /// * `resample_hours`: Resample width of the request
    /// * `origin`: Bucket anchoring
    pub fn new(
        route: &'static str,
        paths: &[&Path],
        resample_hours: u32,
        origin: BucketOrigin,
    ) -> Result<Self, FlowmapError> {
        let digests = paths
            .iter()
            .map(|path| file_digest(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            route,
            digests,
            resample_hours,
            origin,
        })
    }
}

/// MD5 digest of a file's content.
fn file_digest(path: &Path) -> Result<[u8; 16], FlowmapError> {
    let file = File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => FlowmapError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => err.into(),
    })?;
    let mut reader = BufReader::new(file);
    let mut context = md5::Context::new();
    let mut buffer = vec![0; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(context.compute().0)
}

/// Least recently used cache of response bodies.
pub struct ResponseCache {
    entries: Mutex<SizedCache<CacheKey, Bytes>>,
}

impl ResponseCache {
    /// Returns a cache holding at most `size` responses (at least one).
    pub fn new(size: usize) -> Self {
        Self {
            entries: Mutex::new(SizedCache::with_size(size.max(1))),
        }
    }

    /// Look up a response body.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        let value = entries.cache_get(key).cloned();
        debug!(hit = value.is_some(), route = key.route, "Response cache lookup");
        value
    }

    /// Store a response body.
    pub fn set(&self, key: CacheKey, value: Bytes) {
        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.cache_set(key, value);
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.cache_size()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
