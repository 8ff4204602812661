// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Every way a render job can fail.  None of these are recoverable at
//! the job level: a job either produces a complete raster or reports
//! one of these.

use std::any::Any;
use std::io;

/// The error type for the whole crate.
#[derive(Debug, Fail)]
pub enum Error {
    /// A malformed or out-of-range configuration value.
    #[fail(display = "configuration error: {}", _0)]
    Config(String),

    /// The rows could not be divided among the workers under the
    /// chosen policy, or a transport cannot carry the partitions it
    /// was handed.
    #[fail(display = "partition error: {}", _0)]
    Partition(String),

    /// A raster or tile buffer could not be allocated.
    #[fail(display = "could not allocate {} bytes for {}", bytes, what)]
    Resource {
        /// What the buffer was for.
        what: &'static str,
        /// How large it was going to be.
        bytes: usize,
    },

    /// A message arrived short, long, or otherwise malformed.
    #[fail(display = "transport error: {}", _0)]
    Transport(String),

    /// A bounded wait expired before the expected message arrived.
    #[fail(display = "timed out waiting for rank {} (tag {})", source, tag)]
    Timeout {
        /// The rank we were waiting on.
        source: usize,
        /// The tag we were waiting for.
        tag: u32,
    },

    /// A peer gave up and told us so.
    #[fail(display = "rank {} aborted the job: {}", rank, reason)]
    PeerAborted {
        /// The rank that aborted.
        rank: usize,
        /// Its explanation.
        reason: String,
    },

    /// A thread died by panicking rather than returning an error.
    #[fail(display = "{} panicked: {}", what, message)]
    Panicked {
        /// Which thread.
        what: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// Every peer that could have sent to us is gone.
    #[fail(display = "rank {} lost its connection to the job", _0)]
    Disconnected(usize),

    /// A pack buffer was asked to hold more than it was sized for.
    #[fail(
        display = "pack buffer overflow: {} bytes requested with {} of {} remaining",
        requested, remaining, capacity
    )]
    Capacity {
        /// Bytes the caller tried to write.
        requested: usize,
        /// Bytes left before the limit.
        remaining: usize,
        /// The fixed capacity of the buffer.
        capacity: usize,
    },

    /// A row arrived that the partition never assigned, or from the
    /// wrong worker, or conflicting with one already placed; or a row
    /// buffer was the wrong size for the raster.
    #[fail(display = "protocol violation: {}", _0)]
    Protocol(String),

    /// The raster cannot be finalized because rows never arrived.
    #[fail(display = "raster incomplete: {} rows missing ({})", count, rows)]
    Incomplete {
        /// How many rows are missing.
        count: usize,
        /// A printable list of (the first few) missing row indices.
        rows: String,
    },

    /// Output could not be written.
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] io::Error),

    /// Output could not be encoded.
    #[fail(display = "image error: {}", _0)]
    Image(#[cause] ::image::ImageError),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<::image::ImageError> for Error {
    fn from(err: ::image::ImageError) -> Error {
        Error::Image(err)
    }
}

/// Turn a panic payload into an error for `what`.
pub fn panicked(what: &str, payload: &(dyn Any + Send)) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    Error::Panicked {
        what: what.to_string(),
        message,
    }
}

/// Allocate a zeroed byte buffer, reporting allocation failure as an
/// error instead of aborting the process.
pub fn alloc_bytes(len: usize, what: &'static str) -> Result<Vec<u8>, Error> {
    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::Resource { what, bytes: len })?;
    buffer.resize(len, 0);
    Ok(buffer)
}
