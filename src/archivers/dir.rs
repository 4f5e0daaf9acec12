//! The host-directory backend.
//!
//! Maps a subtree of the real filesystem into the virtual one. This is
//! the only backend that supports writes, and the only one whose `stat`
//! can report host symlinks — which the core uses to keep them out of
//! resolution when symlinks are forbidden.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::archiver::{EnumerateCallback, EnumerateResult};
use crate::error::{fail, Error, ErrorCode, Result};
use crate::io::{Io, NativeIo};
use crate::{ArchiveDir, FileType, Stat};

/// One mounted host directory.
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    /// Open `root` as an archive. The target must exist and be a
    /// directory.
    pub fn new(root: &Path) -> Result<Self> {
        let meta = fs::metadata(root)?;
        if !meta.is_dir() {
            fail!(ErrorCode::NotAFile);
        }
        Ok(DirArchive {
            root: root.to_owned(),
        })
    }

    /// Translate a sanitized virtual path into a host path under the
    /// root. Virtual separators are `/` regardless of platform.
    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            full.push(component);
        }
        full
    }
}

fn system_time_secs(t: std::io::Result<SystemTime>) -> i64 {
    match t {
        Ok(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(_) => -1,
        },
        Err(_) => -1,
    }
}

fn stat_from_metadata(meta: &fs::Metadata) -> Stat {
    let filetype = if meta.file_type().is_symlink() {
        FileType::Symlink
    } else if meta.is_dir() {
        FileType::Directory
    } else if meta.is_file() {
        FileType::Regular
    } else {
        FileType::Other
    };
    Stat {
        filesize: if filetype == FileType::Regular {
            meta.len() as i64
        } else {
            -1
        },
        modtime: system_time_secs(meta.modified()),
        createtime: system_time_secs(meta.created()),
        accesstime: system_time_secs(meta.accessed()),
        filetype,
        readonly: meta.permissions().readonly(),
    }
}

impl ArchiveDir for DirArchive {
    fn open_read(&self, path: &str) -> Result<Box<dyn Io>> {
        let full = self.resolve(path);
        if full.is_dir() {
            fail!(ErrorCode::NotAFile);
        }
        Ok(Box::new(NativeIo::open_read(&full)?))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Io>> {
        Ok(Box::new(NativeIo::open_write(&self.resolve(path))?))
    }

    fn open_append(&self, path: &str) -> Result<Box<dyn Io>> {
        Ok(Box::new(NativeIo::open_append(&self.resolve(path))?))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let full = self.resolve(path);
        let meta = fs::symlink_metadata(&full)?;
        if meta.is_dir() {
            fs::remove_dir(&full).map_err(|e| {
                let populated = full
                    .read_dir()
                    .map(|mut d| d.next().is_some())
                    .unwrap_or(false);
                if populated {
                    Error::new(ErrorCode::DirNotEmpty)
                } else {
                    Error::from(e)
                }
            })
        } else {
            fs::remove_file(&full).map_err(Error::from)
        }
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .create(self.resolve(path))?;
        Ok(())
    }

    fn stat(&self, path: &str) -> Result<Stat> {
        let meta = fs::symlink_metadata(self.resolve(path))?;
        Ok(stat_from_metadata(&meta))
    }

    fn enumerate(&self, dir: &str, cb: &mut EnumerateCallback<'_>) -> Result<()> {
        for entry in fs::read_dir(self.resolve(dir))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match cb(&name) {
                EnumerateResult::Ok => {}
                EnumerateResult::Stop => break,
                EnumerateResult::Error => return Err(Error::from_callback()),
            }
        }
        Ok(())
    }
}
