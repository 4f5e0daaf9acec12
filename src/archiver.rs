//! The contract every archive backend implements.
//!
//! A backend comes in two halves: an [`Archiver`] is the format itself —
//! it knows its file extension and how to recognize and open an archive —
//! and an [`ArchiveDir`] is one opened archive, serving the actual file
//! operations. The registry holds archivers; the search path holds
//! archive dirs.

use crate::error::{Error, Result};
use crate::io::Io;
use crate::Stat;

/// Static description of an archive format, surfaced through
/// `supported_archive_types`.
#[derive(Debug, Clone)]
pub struct ArchiverInfo {
    /// File extension this format usually carries, without the dot.
    pub extension: &'static str,
    pub description: &'static str,
    pub author: &'static str,
    pub url: &'static str,
    /// Whether entries inside this format can be symbolic links.
    pub supports_symlinks: bool,
}

/// Outcome of asking an archiver to open a source.
pub enum Claim {
    /// Recognized and opened.
    Claimed(Box<dyn ArchiveDir>),
    /// Recognized the format, but the archive is unusable. The probe loop
    /// stops here: nobody else is going to make sense of it either.
    Broken(Error),
    /// Not this format; the source is handed back for the next archiver.
    Pass(Box<dyn Io>),
}

/// An archive format.
pub trait Archiver: Send + Sync {
    fn info(&self) -> &ArchiverInfo;

    /// Probe `io` (positioned at offset 0) and open it if it is ours.
    /// `name` is the caller-supplied source name, for diagnostics and
    /// extension hints only. `for_write` is true when the source is being
    /// opened as a write target; read-only formats pass in that case.
    fn open_archive(&self, io: Box<dyn Io>, name: &str, for_write: bool) -> Claim;
}

/// What an enumeration callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerateResult {
    /// Keep going.
    Ok,
    /// Stop cleanly; the enumeration reports success.
    Stop,
    /// Abort; the enumeration reports failure.
    Error,
}

pub type EnumerateCallback<'a> = dyn FnMut(&str) -> EnumerateResult + 'a;

/// One opened archive.
///
/// Paths arriving here are already sanitized (and mount-point-stripped,
/// and root-prefixed): implementations never see `..`, `\`, or a leading
/// slash, and may treat the path as trusted within the archive.
pub trait ArchiveDir: Send + Sync {
    fn open_read(&self, path: &str) -> Result<Box<dyn Io>>;

    fn open_write(&self, path: &str) -> Result<Box<dyn Io>>;

    fn open_append(&self, path: &str) -> Result<Box<dyn Io>>;

    /// Remove a file or (empty) directory.
    fn remove(&self, path: &str) -> Result<()>;

    /// Create a directory, including missing parents.
    fn mkdir(&self, path: &str) -> Result<()>;

    fn stat(&self, path: &str) -> Result<Stat>;

    /// Call `cb` with the basename of each child of `dir`.
    fn enumerate(&self, dir: &str, cb: &mut EnumerateCallback<'_>) -> Result<()>;
}
