//! Loads dataset bytes from a local path or over HTTP.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Returns `true` for locations that should be fetched over the network.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Checks whether a source exists without reading it.
///
/// Remote locations are assumed to exist; a failed fetch surfaces later as
/// [`Error::Fetch`].
pub fn source_exists(location: &str) -> bool {
    is_remote(location) || Path::new(location).is_file()
}

/// Reads the whole source into memory.
#[tracing::instrument(fields(source = %location))]
pub fn fetch_bytes(location: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(location) {
        let fetch_err = |source| Error::Fetch {
            url: location.to_string(),
            source,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(fetch_err)?;
        let resp = client
            .get(location)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?;
        resp.bytes().map_err(fetch_err)?.to_vec()
    } else {
        std::fs::read(location).map_err(|e| Error::io(location, e))?
    };
    debug!(bytes = bytes.len(), "Source loaded");
    Ok(bytes)
}
