//! Download.
//!
//! This module contains the code to fetch an artifact into memory.

use crate::checksum::{self, ChecksumWrite};
use crate::config::SourceConfig;
use crate::error::InstallError;
use std::env;
use tracing::{debug, instrument, trace};

// The user agent sent along with every request (the GitHub API refuses requests without one).
#[doc(hidden)]
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Something that fetches the bytes of an artifact.
pub(crate) trait Fetch {
    /// Fetches the whole artifact described by the given source.
    fn fetch(&self, source: &SourceConfig) -> Result<Vec<u8>, InstallError>;
}

/// Fetches whole archives over HTTP(S).
pub(crate) struct Downloader {
    client: reqwest::blocking::Client,
}

impl Downloader {
    /// Creates a new `Downloader`.
    pub(crate) fn new() -> Result<Self, InstallError> {
        let client = reqwest::blocking::Client::builder() //
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| network_failure("<client>", &err))?;

        Ok(Self { client })
    }
}

impl Fetch for Downloader {
    /// Downloads the artifact described by the given source.
    ///
    /// Any status other than success is a failure, as is a checksum mismatch if a checksum is configured.
    #[instrument(level = "trace", skip(self))]
    fn fetch(&self, source: &SourceConfig) -> Result<Vec<u8>, InstallError> {
        let url = source.url.as_str();

        // make request
        let mut request = self
            .client
            .get(url) //
            .header(reqwest::header::ACCEPT, "application/octet-stream");
        if let Some(token) = bearer_token(source) {
            debug!(url, "sending bearer token");
            request = request.bearer_auth(token);
        }
        let mut response = request.send().map_err(|err| network_failure(url, &err))?;

        let status = response.status();
        trace!(%status);
        if !status.is_success() {
            return Err(InstallError::NetworkFailure {
                url: url.to_string(),
                reason: format!("request failed: {status}"),
            });
        }

        // download body
        let mut checksum_write = ChecksumWrite::new(Vec::new());
        let bytes_written = response.copy_to(&mut checksum_write).map_err(|err| network_failure(url, &err))?;
        trace!(bytes_written);
        let (bytes, checksum_calculated) = checksum_write.finish().map_err(|err| network_failure(url, &err))?;
        trace!(checksum_calculated);

        // verify checksum
        if let Some(expected) = &source.sha256 {
            if !checksum::matches(expected, &checksum_calculated) {
                return Err(InstallError::NetworkFailure {
                    url: url.to_string(),
                    reason: format!("hashes differ (expected: {}, got: {checksum_calculated})", expected.trim()),
                });
            }
        }

        Ok(bytes)
    }
}

// Returns the bearer token configured for the given source, if the environment variable is set and not empty.
#[doc(hidden)]
fn bearer_token(source: &SourceConfig) -> Option<String> {
    let name = source.token_env.as_deref()?;
    env::var(name).ok().filter(|token| !token.trim().is_empty())
}

// Wraps a transport error.
#[doc(hidden)]
fn network_failure(url: &str, err: &dyn std::error::Error) -> InstallError {
    InstallError::NetworkFailure {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
