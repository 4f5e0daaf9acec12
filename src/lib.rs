//! A portable, sandboxed virtual filesystem for game data.
//!
//! Applications see a single tree of `/`-separated virtual paths,
//! assembled from an ordered *search path* of mounted sources: host
//! directories, archive files, or in-memory buffers. Reads resolve
//! against the search path in order; writes go only to the one designated
//! *write directory*. Paths are sanitized before they reach any backend,
//! so a virtual path can never escape the set of mounted sources.
//!
//! ```no_run
//! use physfs::PhysFs;
//!
//! let fs = PhysFs::init(None)?;
//! fs.mount("data/base.zip", None, true)?;
//! fs.mount("mods/extra", Some("mods"), false)?;
//! let mut file = fs.open_read("sprites/player.png")?;
//! let mut bytes = Vec::new();
//! std::io::Read::read_to_end(&mut file, &mut bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Archive formats are pluggable: ZIP (with Zip64, DEFLATE, traditional
//! encryption and in-archive symlinks) plus a family of game pack formats
//! ship built in, and [`archiver::Archiver`] lets applications register
//! their own.

pub mod archiver;
pub mod archivers;
mod error;
mod file;
mod fs;
pub mod io;
mod path;
pub mod tree;
pub mod unicode;

use std::sync::{Mutex, OnceLock};

pub use error::{last_error_code, set_error_code, Error, ErrorCode, Result};
pub use file::File;
pub use fs::{MountInfo, PhysFs};
pub use path::sanitize;

pub use archiver::{ArchiveDir, Archiver, ArchiverInfo, Claim, EnumerateResult};

/// What kind of thing a virtual path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Other,
}

/// Metadata for a virtual path. Sizes and times are `-1` when the
/// backing store doesn't know; times are Unix epoch seconds.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub filesize: i64,
    pub modtime: i64,
    pub createtime: i64,
    pub accesstime: i64,
    pub filetype: FileType,
    pub readonly: bool,
}

impl Stat {
    /// A directory with no further metadata, as synthesized for mount
    /// points and archive-internal directories.
    pub(crate) fn virtual_dir() -> Self {
        Stat {
            filesize: 0,
            modtime: -1,
            createtime: -1,
            accesstime: -1,
            filetype: FileType::Directory,
            readonly: true,
        }
    }
}

/// Crate version, as a `(major, minor, patch)` triple.
pub fn version() -> (u32, u32, u32) {
    let mut parts = env!("CARGO_PKG_VERSION")
        .splitn(3, '.')
        .map(|p| p.parse().unwrap_or(0));
    let mut next = || parts.next().unwrap_or(0);
    (next(), next(), next())
}

static GLOBAL: OnceLock<Mutex<Option<PhysFs>>> = OnceLock::new();

fn global_slot() -> &'static Mutex<Option<PhysFs>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Initialize the process-wide instance.
///
/// The library itself is instance-based ([`PhysFs::init`]); this facade
/// exists for applications that want the classic one-global shape.
pub fn init(argv0: Option<&str>) -> Result<()> {
    let mut slot = global_slot().lock().unwrap();
    if slot.is_some() {
        return Err(Error::new(ErrorCode::IsInitialized));
    }
    *slot = Some(PhysFs::init(argv0)?);
    Ok(())
}

/// Tear down the process-wide instance. Fails with
/// [`ErrorCode::FilesStillOpen`] if write handles are still open.
pub fn deinit() -> Result<()> {
    let mut slot = global_slot().lock().unwrap();
    match slot.take() {
        None => Err(Error::new(ErrorCode::NotInitialized)),
        Some(fs) => match fs.deinit() {
            Ok(()) => Ok(()),
            Err((fs, err)) => {
                *slot = Some(fs);
                Err(err)
            }
        },
    }
}

/// Whether the process-wide instance exists.
pub fn is_init() -> bool {
    global_slot().lock().unwrap().is_some()
}

/// Run `f` against the process-wide instance.
pub fn with_global<R>(f: impl FnOnce(&PhysFs) -> R) -> Result<R> {
    let slot = global_slot().lock().unwrap();
    match slot.as_ref() {
        None => Err(Error::new(ErrorCode::NotInitialized)),
        Some(fs) => Ok(f(fs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        let (major, minor, patch) = version();
        assert_eq!(
            format!("{}.{}.{}", major, minor, patch),
            env!("CARGO_PKG_VERSION")
        );
    }
}
