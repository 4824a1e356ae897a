//! Error types and the related `Result<T>`

use camino::Utf8PathBuf;
use thiserror::Error;

pub type RafResult<T> = Result<T, RafError>;

#[derive(Debug, Error)]
pub enum RafError {
    /// An error from underlying I/O
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The index doesn't start with the RAF magic number.
    /// Likeliest cause: the given file isn't an index at all.
    #[error("not a RAF index: bad magic {found:02x?}")]
    MagicMismatch { found: [u8; 4] },

    /// The index stream ended in the middle of the named structure.
    #[error("truncated index: ran out of bytes reading {0}")]
    TruncatedStream(&'static str),

    /// A table or string offset in the index points past the end of it.
    #[error("offset {offset:#x} is outside the {len}-byte index")]
    OffsetOutOfRange { offset: u64, len: u64 },

    /// A path string's NUL terminator isn't where its declared length
    /// says it should be.
    #[error("path string {index}: NUL terminator doesn't match declared length {declared}")]
    PathLengthMismatch { index: usize, declared: u32 },

    /// Decoding a UTF-8 path failed
    #[error("invalid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    /// A file record points at a path table slot that doesn't exist.
    #[error("file record refers to path {index} of {count}")]
    InvalidPathIndex { index: u32, count: usize },

    /// Two file records resolve to the same path
    /// (after case folding, since lookups ignore case).
    #[error("duplicate path in archive: {0}")]
    DuplicatePath(String),

    /// The companion data file (`<index>.dat`) couldn't be opened.
    #[error("couldn't open data file {path}")]
    DataFileOpen {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    /// The data file ended before an entry's compressed payload did.
    #[error("data file {path} ends inside the {wanted}-byte payload at {offset:#x}")]
    TruncatedPayload {
        path: Utf8PathBuf,
        offset: u64,
        wanted: u32,
    },

    /// An entry's payload isn't a valid zlib stream.
    #[error("malformed payload in {path} at {offset:#x}")]
    MalformedPayload {
        path: Utf8PathBuf,
        offset: u64,
        source: std::io::Error,
    },

    /// No entry matched the given query.
    #[error("no entry matching {0}")]
    NotFound(String),

    /// A query with neither a path nor a name selects nothing.
    #[error("query has no path and no name")]
    NoSelector,

    /// A directory under a versioned root isn't named like a
    /// dot-separated version.
    #[error("{0:?} isn't a version (like \"1.10.0\")")]
    VersionParse(String),

    /// A version directory holds no `.raf` index.
    #[error("no .raf index in {0}")]
    MissingArchive(Utf8PathBuf),

    /// A version directory holds more than one `.raf` index,
    /// so there's no way to tell which one the release means.
    #[error("{count} .raf indices in {dir}")]
    AmbiguousArchive { dir: Utf8PathBuf, count: usize },

    /// Something went wrong opening one archive.
    /// Wraps every failure in [`RafArchive::open()`] with the file it
    /// came from, which matters once an overlay opens a whole stack of
    /// archives at once.
    ///
    /// [`RafArchive::open()`]: ../read/struct.RafArchive.html#method.open
    #[error("archive {path}: {source}")]
    Archive {
        path: Utf8PathBuf,
        source: Box<RafError>,
    },
}
