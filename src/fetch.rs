//! Database download collaborator
//!
//! The manager never talks HTTP directly. It calls a [`Fetcher`], which
//! returns the bytes at a URL or an error. [`HttpFetcher`] is the stock
//! implementation over `ureq`; tests and embedders can pass any
//! `Fn(&str, Duration) -> Result<Vec<u8>, FetchError>` closure instead.
//!
//! Fetchers do not retry. A failed fetch is reported and whatever database
//! was already loaded stays authoritative.

use crate::config::DEFAULT_MAX_DOWNLOAD_BYTES;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors from fetching a database
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request did not complete within its timeout
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status
    #[error("HTTP status {status}")]
    Http {
        /// Status code
        status: u16,
    },

    /// Body (or decompressed body) exceeds the download cap
    #[error("download exceeds {limit} bytes")]
    TooLarge {
        /// Configured cap in bytes
        limit: u64,
    },

    /// Connection, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload hash does not match the published checksum
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Hex digest from the checksum file
        expected: String,
        /// Hex digest of the payload
        actual: String,
    },

    /// Reading or decompressing the body failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can retrieve the bytes behind a URL
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, giving up after `timeout`
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&str, Duration) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        self(url, timeout)
    }
}

/// Blocking HTTP fetcher with a body size cap
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    max_bytes: u64,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOWNLOAD_BYTES)
    }
}

impl HttpFetcher {
    /// Fetcher that refuses bodies larger than `max_bytes`
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        let response = match agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => return Err(FetchError::Http { status }),
            Err(ureq::Error::Transport(transport)) => {
                return Err(if is_timeout(&transport) {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(transport.to_string())
                })
            }
        };

        if let Some(length) = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok())
        {
            if length > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let body = read_capped(response.into_reader(), self.max_bytes).map_err(|e| match e {
            FetchError::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => FetchError::Timeout,
            other => other,
        })?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }
}

fn is_timeout(transport: &ureq::Transport) -> bool {
    std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .map(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        })
        .unwrap_or(false)
}

/// Read at most `limit` bytes, failing with `TooLarge` beyond that
fn read_capped(reader: impl Read, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut buf = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut buf)?;
    if buf.len() as u64 > limit {
        return Err(FetchError::TooLarge { limit });
    }
    Ok(buf)
}

/// Turn a downloaded payload into raw database bytes
///
/// Gzip payloads (detected by magic number) are decompressed, with the
/// decompressed size capped at `limit`. Anything else is returned as is.
pub fn decode_payload(payload: Vec<u8>, limit: u64) -> Result<Vec<u8>, FetchError> {
    if payload.len() as u64 > limit {
        return Err(FetchError::TooLarge { limit });
    }
    if !payload.starts_with(&GZIP_MAGIC) {
        return Ok(payload);
    }
    let bytes = read_capped(GzDecoder::new(payload.as_slice()), limit)?;
    debug!(
        compressed = payload.len(),
        decompressed = bytes.len(),
        "decompressed gzip payload"
    );
    Ok(bytes)
}

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compare `payload` against a checksum file
///
/// The file holds a hex digest, optionally followed by a file name as
/// written by `sha256sum`. Only the first token is used.
pub fn verify_checksum(payload: &[u8], checksum_file: &str) -> Result<(), FetchError> {
    let expected = checksum_file
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    let actual = sha256_hex(payload);
    if expected != actual {
        return Err(FetchError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}
