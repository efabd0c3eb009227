//! Loader and firmware image loading
//!
//! Images come from exactly one of two places: a file, whose size is taken
//! from its metadata, or a stream (normally standard input) with a size
//! declared up front. In both cases the image must be read in full; a short
//! read is an error and no partial buffer is ever returned.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default upper bound for stream-declared image sizes (64 MiB)
pub const DEFAULT_MAX_STREAM_SIZE: u64 = 64 * 1024 * 1024;

/// Where an image came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobOrigin {
    /// Read from a file
    File(PathBuf),
    /// Read from a stream with a declared size
    Stream,
}

impl fmt::Display for BlobOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stream => f.write_str("stdin"),
        }
    }
}

/// Image loading errors
#[derive(Debug, Error)]
pub enum BlobError {
    /// The file could not be opened
    #[error("Error opening file {}: {source}", .path.display())]
    Open {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file metadata could not be read
    #[error("Error - could not stat {}: {source}", .path.display())]
    Stat {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Fewer bytes were available than expected
    #[error("Error - read failed! readlen {actual} expected {expected} ({origin})")]
    ShortRead {
        /// Image source
        origin: BlobOrigin,
        /// Expected length in bytes
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// The read itself failed
    #[error("Error reading {origin}: {source}")]
    Read {
        /// Image source
        origin: BlobOrigin,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Declared stream size is zero or above the configured limit
    #[error("Invalid image size {size} (must be between 1 and {max} bytes)")]
    InvalidSize {
        /// Declared size
        size: u64,
        /// Configured limit
        max: u64,
    },
}

/// Selects where an image is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobSource {
    /// Load the whole file at this path
    Path(PathBuf),
    /// Load exactly `size` bytes from the stream
    Stream {
        /// Declared size in bytes
        size: u64,
    },
}

impl fmt::Display for BlobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Stream { size } => write!(f, "stdin ({} bytes)", size),
        }
    }
}

/// An owned, fully loaded image
///
/// The buffer is released when the blob is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderBlob {
    data: Vec<u8>,
    origin: BlobOrigin,
}

impl LoaderBlob {
    /// Image contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Image length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty (companion to `len`)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Where the image came from
    pub fn origin(&self) -> &BlobOrigin {
        &self.origin
    }
}

/// Load an image from `source`, reading streams from `stream`
pub fn load<R: Read + ?Sized>(
    source: &BlobSource,
    stream: &mut R,
    max_stream_size: u64,
) -> Result<LoaderBlob, BlobError> {
    match source {
        BlobSource::Path(path) => load_from_path(path),
        BlobSource::Stream { size } => load_from_stream(stream, *size, max_stream_size),
    }
}

/// Load a whole file
///
/// The size is taken from the file metadata and exactly that many bytes are
/// read. A file that shrinks between the stat and the read is a short read.
pub fn load_from_path(path: &Path) -> Result<LoaderBlob, BlobError> {
    let file = File::open(path).map_err(|source| BlobError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let size = file
        .metadata()
        .map_err(|source| BlobError::Stat {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    log::debug!("Loading {} bytes from {}", size, path.display());

    let origin = BlobOrigin::File(path.to_path_buf());
    let data = read_exactly(file, size, &origin)?;
    Ok(LoaderBlob { data, origin })
}

/// Load exactly `size` bytes from a stream
///
/// `size` must be nonzero and at most `max`. No more than `size` bytes are
/// consumed from the stream.
pub fn load_from_stream<R: Read + ?Sized>(
    stream: &mut R,
    size: u64,
    max: u64,
) -> Result<LoaderBlob, BlobError> {
    if size == 0 || size > max {
        return Err(BlobError::InvalidSize { size, max });
    }

    log::info!("Getting file ( {} bytes ) from stdin", size);

    let origin = BlobOrigin::Stream;
    let data = read_exactly(stream, size, &origin)?;
    Ok(LoaderBlob { data, origin })
}

fn read_exactly<R: Read>(
    reader: R,
    expected: u64,
    origin: &BlobOrigin,
) -> Result<Vec<u8>, BlobError> {
    let capacity = usize::try_from(expected).map_err(|_| BlobError::InvalidSize {
        size: expected,
        max: usize::MAX as u64,
    })?;

    let mut data = Vec::with_capacity(capacity);
    let actual = reader
        .take(expected)
        .read_to_end(&mut data)
        .map_err(|source| BlobError::Read {
            origin: origin.clone(),
            source,
        })? as u64;

    if actual != expected {
        return Err(BlobError::ShortRead {
            origin: origin.clone(),
            expected,
            actual,
        });
    }

    Ok(data)
}
