//! Checksum.
//!
//! This module contains code to create a checksum (SHA256) "on the fly" while writing data.

use sha2::{Digest, Sha256};
use std::io::{Result as IoResult, Write};

/// The struct to create the checksum (SHA256) "on the fly".
pub(crate) struct ChecksumWrite<W> {
    hasher: Sha256,
    write: W,
}

impl<W: Write> ChecksumWrite<W> {
    /// Creates a new `ChecksumWrite` on top of the given [Write].
    pub(crate) fn new(write: W) -> Self {
        Self { hasher: Sha256::new(), write }
    }

    /// Consumes the `ChecksumWrite` and returns the inner [Write] together with the (lowercase hex) checksum.
    pub(crate) fn finish(mut self) -> IoResult<(W, String)> {
        self.flush()?;
        let hash = self.hasher.finalize();
        let checksum = base16ct::lower::encode_string(&hash);

        Ok((self.write, checksum))
    }
}

impl<W: Write> Write for ChecksumWrite<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let n = self.write.write(buf)?;
        self.hasher.update(&buf[..n]);

        Ok(n)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.write.flush()
    }
}

/// Compares an expected checksum (any case, surrounding whitespace ignored) with a calculated one.
pub(crate) fn matches(expected: &str, calculated: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(calculated)
}
