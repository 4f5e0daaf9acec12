//! The virtual filesystem core: search path, mounts, write dir, name
//! resolution.
//!
//! A [`PhysFs`] owns an ordered list of mounts (the *search path*) and at
//! most one *write directory*. Reads walk the search path in order and
//! the first mount that can serve the path wins; writes only ever touch
//! the write directory, which is not part of the search path unless
//! mounted separately. All state mutation is serialized through one
//! internal lock, so a `&PhysFs` can be shared across threads; open
//! [`File`] handles do their I/O without that lock.

use std::cmp::Ordering as CmpOrdering;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::archiver::Claim;
use crate::archivers::{self, dir::DirArchive};
use crate::error::{fail, Error, ErrorCode, Result};
use crate::file::File;
use crate::io::{Io, MemoryIo, NativeIo, StreamIo};
use crate::path as vpath;
use crate::unicode;
use crate::{ArchiveDir, Archiver, ArchiverInfo, EnumerateResult, FileType, Stat};

/// One mounted source in the search path.
pub(crate) struct Mount {
    dir: Box<dyn ArchiveDir>,
    source_name: String,
    /// Sanitized; empty string is the virtual root.
    mount_point: String,
    /// Optional in-archive subdirectory acting as this mount's root.
    root: Mutex<Option<String>>,
    open_reads: AtomicUsize,
    open_writes: AtomicUsize,
}

/// Keeps a mount's open-handle accounting honest: one guard per open
/// [`File`], decremented on drop.
pub(crate) struct HandleGuard {
    mount: Arc<Mount>,
    writing: bool,
}

impl HandleGuard {
    fn new(mount: Arc<Mount>, writing: bool) -> Self {
        let counter = if writing {
            &mount.open_writes
        } else {
            &mount.open_reads
        };
        counter.fetch_add(1, Ordering::SeqCst);
        HandleGuard { mount, writing }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        let counter = if self.writing {
            &self.mount.open_writes
        } else {
            &self.mount.open_reads
        };
        counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A search-path entry as reported to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The source name as supplied to `mount*`.
    pub source: String,
    /// Mount point in `/rooted/` notation; `/` for the virtual root.
    pub mount_point: String,
}

struct State {
    archivers: Vec<Arc<dyn Archiver>>,
    search: Vec<Arc<Mount>>,
    write_dir: Option<(PathBuf, Arc<Mount>)>,
    allow_symlinks: bool,
}

/// The virtual filesystem.
pub struct PhysFs {
    state: Mutex<State>,
    base_dir: PathBuf,
    user_dir: Option<PathBuf>,
}

impl std::fmt::Debug for PhysFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysFs")
            .field("base_dir", &self.base_dir)
            .field("user_dir", &self.user_dir)
            .finish()
    }
}

impl PhysFs {
    /// Create an instance with an empty search path.
    ///
    /// The base dir is the directory holding the running executable,
    /// falling back to `argv0`'s parent when the platform can't say;
    /// with neither available this fails with [`ErrorCode::Argv0IsNull`].
    pub fn init(argv0: Option<&str>) -> Result<PhysFs> {
        let base_dir = match std::env::current_exe() {
            Ok(mut exe) => {
                exe.pop();
                exe
            }
            Err(_) => match argv0 {
                Some(arg) => match Path::new(arg).parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
                    _ => PathBuf::from("."),
                },
                None => fail!(ErrorCode::Argv0IsNull),
            },
        };
        let user_dir = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_owned());
        trace!("init: base dir {:?}, user dir {:?}", base_dir, user_dir);
        Ok(PhysFs {
            state: Mutex::new(State {
                archivers: archivers::default_archivers(),
                search: Vec::new(),
                write_dir: None,
                allow_symlinks: false,
            }),
            base_dir,
            user_dir,
        })
    }

    /// Tear the instance down. Refuses while files are open for writing
    /// (handing back the instance so nothing leaks); read handles own
    /// their sources and survive on their own.
    pub fn deinit(self) -> std::result::Result<(), (PhysFs, Error)> {
        let writes_open = {
            let state = self.state.lock().unwrap();
            let mut total = state
                .write_dir
                .as_ref()
                .map(|(_, m)| m.open_writes.load(Ordering::SeqCst))
                .unwrap_or(0);
            total += state
                .search
                .iter()
                .map(|m| m.open_writes.load(Ordering::SeqCst))
                .sum::<usize>();
            total
        };
        if writes_open > 0 {
            return Err((self, Error::new(ErrorCode::FilesStillOpen)));
        }
        Ok(())
    }

    // -- directories --------------------------------------------------

    /// Directory containing the running program.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The user's home directory, if the platform has such a notion.
    pub fn user_dir(&self) -> Option<&Path> {
        self.user_dir.as_deref()
    }

    /// Per-user, per-application directory for persistent writes.
    /// Created on first request.
    pub fn pref_dir(&self, org: &str, app: &str) -> Result<PathBuf> {
        if app.is_empty() {
            fail!(ErrorCode::InvalidArgument);
        }
        let Some(dirs) = directories::ProjectDirs::from("", org, app) else {
            fail!(ErrorCode::NotFound);
        };
        let dir = dirs.data_dir();
        std::fs::create_dir_all(dir)?;
        Ok(dir.to_owned())
    }

    /// The host platform's path separator.
    pub fn dir_separator(&self) -> &'static str {
        std::path::MAIN_SEPARATOR_STR
    }

    // -- configuration ------------------------------------------------

    /// Allow or forbid resolving through symbolic links (host or
    /// in-archive). Forbidden by default.
    pub fn permit_symbolic_links(&self, allow: bool) {
        self.state.lock().unwrap().allow_symlinks = allow;
    }

    pub fn symbolic_links_permitted(&self) -> bool {
        self.state.lock().unwrap().allow_symlinks
    }

    /// Set up the conventional search path in one call: pref dir as
    /// write dir and first mount, base dir behind it, and any archives
    /// with the given extension found in either, prepended when
    /// `archives_first` and appended otherwise.
    pub fn with_sane_defaults(
        &self,
        org: &str,
        app: &str,
        archive_ext: Option<&str>,
        archives_first: bool,
    ) -> Result<()> {
        let pref = self.pref_dir(org, app)?;
        self.set_write_dir(Some(&pref))?;
        self.mount(&pref, None, true)?;
        let base = self.base_dir.clone();
        self.mount(&base, None, true)?;

        if let Some(ext) = archive_ext {
            let mut found = Vec::new();
            for dir in [&pref, &base] {
                let Ok(listing) = std::fs::read_dir(dir) else {
                    continue;
                };
                for entry in listing.flatten() {
                    let path = entry.path();
                    let matches = path
                        .extension()
                        .map(|e| {
                            unicode::utf8_stricmp(&e.to_string_lossy(), ext)
                                == CmpOrdering::Equal
                        })
                        .unwrap_or(false);
                    if matches {
                        found.push(path);
                    }
                }
            }
            found.sort();
            for path in found {
                if let Err(err) = self.mount(&path, None, !archives_first) {
                    debug!("skipping archive {:?}: {}", path, err);
                }
            }
        }
        Ok(())
    }

    // -- mounting -----------------------------------------------------

    /// Add a host directory or archive file to the search path.
    ///
    /// `mount_point` of `None` mounts at the virtual root. Mounting a
    /// source name that is already mounted is a silent success (the
    /// check is exact string equality, so two spellings of one file
    /// both mount).
    pub fn mount(
        &self,
        source: impl AsRef<Path>,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        let source = source.as_ref();
        let name = source.to_string_lossy().into_owned();
        if self.is_mounted(&name) {
            return Ok(());
        }
        if source.is_dir() {
            let dir = Box::new(DirArchive::new(source)?);
            return self.push_mount(dir, name, mount_point, append);
        }
        let io = Box::new(NativeIo::open_read(source)?);
        self.mount_io(io, &name, mount_point, append)
    }

    /// Mount a caller-supplied I/O source.
    pub fn mount_io(
        &self,
        io: Box<dyn Io>,
        name: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        if self.is_mounted(name) {
            return Ok(());
        }
        let archivers = self.state.lock().unwrap().archivers.clone();
        let dir = probe_archivers(&archivers, io, name)?;
        self.push_mount(dir, name.to_owned(), mount_point, append)
    }

    /// Mount an in-memory buffer. Duplicating readers share the buffer.
    pub fn mount_memory(
        &self,
        buf: impl Into<Arc<[u8]>>,
        name: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        self.mount_io(Box::new(MemoryIo::new(buf)), name, mount_point, append)
    }

    /// Mount an already-open [`File`]. The stream can't be duplicated,
    /// so archives needing parallel entry readers will refuse it.
    pub fn mount_handle(
        &self,
        file: File,
        name: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        self.mount_io(Box::new(StreamIo::new(file)?), name, mount_point, append)
    }

    fn is_mounted(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .search
            .iter()
            .any(|m| m.source_name == name)
    }

    fn push_mount(
        &self,
        dir: Box<dyn ArchiveDir>,
        name: String,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        let mount_point = vpath::sanitize(mount_point.unwrap_or(""))?;
        let mut state = self.state.lock().unwrap();
        if state.search.iter().any(|m| m.source_name == name) {
            return Ok(());
        }
        trace!(
            "mounting {:?} at {:?} ({})",
            name,
            if mount_point.is_empty() { "/" } else { mount_point.as_str() },
            if append { "append" } else { "prepend" },
        );
        let mount = Arc::new(Mount {
            dir,
            source_name: name,
            mount_point,
            root: Mutex::new(None),
            open_reads: AtomicUsize::new(0),
            open_writes: AtomicUsize::new(0),
        });
        if append {
            state.search.push(mount);
        } else {
            state.search.insert(0, mount);
        }
        Ok(())
    }

    /// Remove a mounted source. Fails with
    /// [`ErrorCode::FilesStillOpen`] while read handles from it exist.
    pub fn unmount(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.search.iter().position(|m| m.source_name == name) else {
            fail!(ErrorCode::NotMounted);
        };
        if state.search[pos].open_reads.load(Ordering::SeqCst) > 0 {
            fail!(ErrorCode::FilesStillOpen);
        }
        let mount = state.search.remove(pos);
        trace!("unmounted {:?}", mount.source_name);
        Ok(())
    }

    /// Source names in search order.
    pub fn search_path(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .search
            .iter()
            .map(|m| m.source_name.clone())
            .collect()
    }

    /// Search path with mount points, in order.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.state
            .lock()
            .unwrap()
            .search
            .iter()
            .map(|m| MountInfo {
                source: m.source_name.clone(),
                mount_point: rooted(&m.mount_point),
            })
            .collect()
    }

    /// Where a mounted source hangs in the virtual tree.
    pub fn mount_point(&self, name: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        match state.search.iter().find(|m| m.source_name == name) {
            Some(m) => Ok(rooted(&m.mount_point)),
            None => fail!(ErrorCode::NotMounted),
        }
    }

    /// Make `subdir` the visible root of an already-mounted archive;
    /// `None` restores the archive's real root.
    pub fn set_root(&self, name: &str, subdir: Option<&str>) -> Result<()> {
        let state = self.state.lock().unwrap();
        let Some(mount) = state.search.iter().find(|m| m.source_name == name) else {
            fail!(ErrorCode::NotMounted);
        };
        let root = match subdir {
            None => None,
            Some(s) => {
                let s = vpath::sanitize(s)?;
                if s.is_empty() {
                    None
                } else {
                    Some(s)
                }
            }
        };
        *mount.root.lock().unwrap() = root;
        Ok(())
    }

    // -- write dir ----------------------------------------------------

    /// Designate (or with `None`, clear) the one directory writes go
    /// to. Fails while files are open for writing.
    pub fn set_write_dir(&self, target: Option<&Path>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some((_, mount)) = &state.write_dir {
            if mount.open_writes.load(Ordering::SeqCst) > 0 {
                fail!(ErrorCode::FilesStillOpen);
            }
        }
        state.write_dir = match target {
            None => None,
            Some(path) => {
                let dir = Box::new(DirArchive::new(path)?);
                trace!("write dir is now {:?}", path);
                Some((
                    path.to_owned(),
                    Arc::new(Mount {
                        dir,
                        source_name: path.to_string_lossy().into_owned(),
                        mount_point: String::new(),
                        root: Mutex::new(None),
                        open_reads: AtomicUsize::new(0),
                        open_writes: AtomicUsize::new(0),
                    }),
                ))
            }
        };
        Ok(())
    }

    pub fn write_dir(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .write_dir
            .as_ref()
            .map(|(p, _)| p.clone())
    }

    /// Create a directory (and missing parents) under the write dir.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let p = vpath::sanitize(path)?;
        if p.is_empty() {
            fail!(ErrorCode::InvalidArgument);
        }
        let state = self.state.lock().unwrap();
        let Some((_, mount)) = &state.write_dir else {
            fail!(ErrorCode::NoWriteDir);
        };
        if !state.allow_symlinks {
            verify_path(mount.dir.as_ref(), &p, true)?;
        }
        mount.dir.mkdir(&p)
    }

    /// Delete a file or empty directory under the write dir.
    pub fn delete(&self, path: &str) -> Result<()> {
        let p = vpath::sanitize(path)?;
        if p.is_empty() {
            fail!(ErrorCode::InvalidArgument);
        }
        let state = self.state.lock().unwrap();
        let Some((_, mount)) = &state.write_dir else {
            fail!(ErrorCode::NoWriteDir);
        };
        if !state.allow_symlinks {
            verify_path(mount.dir.as_ref(), &p, false)?;
        }
        mount.dir.remove(&p)
    }

    // -- file access --------------------------------------------------

    /// Open for reading, resolving across the search path in order.
    pub fn open_read(&self, path: &str) -> Result<File> {
        let p = vpath::sanitize(path)?;
        let state = self.state.lock().unwrap();
        let mut last_err: Option<Error> = None;
        for mount in &state.search {
            let Some(full) = effective_path(mount, &p) else {
                continue;
            };
            if full.is_empty() {
                // the mount point itself: a directory that exists only
                // because this mount hangs there
                last_err = Some(Error::new(ErrorCode::NotAFile));
                continue;
            }
            if !state.allow_symlinks {
                if let Err(err) = verify_path(mount.dir.as_ref(), &full, false) {
                    last_err = Some(err);
                    continue;
                }
            }
            match mount.dir.open_read(&full) {
                Ok(io) => {
                    let guard = HandleGuard::new(Arc::clone(mount), false);
                    return Ok(File::new(io, true, Some(guard)));
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::new(ErrorCode::NotFound)))
    }

    /// Open an encrypted archive entry for reading.
    ///
    /// Same lookup as appending `$password` to the path (the in-path
    /// form the ZIP backend understands); this is the structured
    /// spelling for applications that don't want `$` to be magic.
    pub fn open_read_with_password(&self, path: &str, password: &str) -> Result<File> {
        self.open_read(&format!("{}${}", path, password))
    }

    /// Open for writing (truncating) in the write dir.
    pub fn open_write(&self, path: &str) -> Result<File> {
        self.open_for_write(path, false)
    }

    /// Open for appending in the write dir.
    pub fn open_append(&self, path: &str) -> Result<File> {
        self.open_for_write(path, true)
    }

    fn open_for_write(&self, path: &str, append: bool) -> Result<File> {
        let p = vpath::sanitize(path)?;
        if p.is_empty() {
            fail!(ErrorCode::NotAFile);
        }
        let state = self.state.lock().unwrap();
        let Some((_, mount)) = &state.write_dir else {
            fail!(ErrorCode::NoWriteDir);
        };
        if !state.allow_symlinks {
            verify_path(mount.dir.as_ref(), &p, true)?;
        }
        let io = if append {
            mount.dir.open_append(&p)?
        } else {
            mount.dir.open_write(&p)?
        };
        let guard = HandleGuard::new(Arc::clone(mount), true);
        Ok(File::new(io, false, Some(guard)))
    }

    /// Metadata for a virtual path, from the first mount that knows it.
    pub fn stat(&self, path: &str) -> Result<Stat> {
        let p = vpath::sanitize(path)?;
        if p.is_empty() {
            return Ok(Stat::virtual_dir());
        }
        let state = self.state.lock().unwrap();
        let mut last_err: Option<Error> = None;
        for mount in &state.search {
            if let Some(full) = effective_path(mount, &p) {
                if full.is_empty() {
                    return Ok(Stat::virtual_dir());
                }
                if !state.allow_symlinks {
                    if let Err(err) =
                        verify_path(mount.dir.as_ref(), vpath::dirname(&full), false)
                    {
                        last_err = Some(err);
                        continue;
                    }
                }
                match mount.dir.stat(&full) {
                    Ok(st) => return Ok(st),
                    Err(err) => last_err = Some(err),
                }
            } else if vpath::mount_point_child(&mount.mount_point, &p).is_some() {
                return Ok(Stat::virtual_dir());
            }
        }
        Err(last_err.unwrap_or_else(|| Error::new(ErrorCode::NotFound)))
    }

    /// Whether the path resolves through any mount.
    pub fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    /// Source name of the first mount that serves `path`.
    pub fn real_dir(&self, path: &str) -> Result<String> {
        let p = vpath::sanitize(path)?;
        let state = self.state.lock().unwrap();
        for mount in &state.search {
            if let Some(full) = effective_path(mount, &p) {
                if full.is_empty() || mount.dir.stat(&full).is_ok() {
                    return Ok(mount.source_name.clone());
                }
            } else if vpath::mount_point_child(&mount.mount_point, &p).is_some() {
                return Ok(mount.source_name.clone());
            }
        }
        fail!(ErrorCode::NotFound)
    }

    // -- enumeration --------------------------------------------------

    /// Call `cb` with each child name of `dir`, walking every mount
    /// that contains it. A name mounted in several places is reported
    /// once per mount. When symlinks are forbidden, symlink children
    /// are silently skipped.
    pub fn enumerate(
        &self,
        dir: &str,
        mut cb: impl FnMut(&str) -> EnumerateResult,
    ) -> Result<()> {
        let p = vpath::sanitize(dir)?;
        let state = self.state.lock().unwrap();
        let allow_symlinks = state.allow_symlinks;
        let mut stopped = false;
        for mount in &state.search {
            if stopped {
                break;
            }
            if let Some(child) = vpath::mount_point_child(&mount.mount_point, &p) {
                match cb(child) {
                    EnumerateResult::Ok => {}
                    EnumerateResult::Stop => stopped = true,
                    EnumerateResult::Error => return Err(Error::from_callback()),
                }
                continue;
            }
            let Some(full) = effective_path(mount, &p) else {
                continue;
            };
            let result = mount.dir.enumerate(&full, &mut |name| {
                if !allow_symlinks {
                    let child = if full.is_empty() {
                        name.to_owned()
                    } else {
                        format!("{}/{}", full, name)
                    };
                    if let Ok(st) = mount.dir.stat(&child) {
                        if st.filetype == FileType::Symlink {
                            return EnumerateResult::Ok;
                        }
                    }
                }
                let verdict = cb(name);
                if verdict == EnumerateResult::Stop {
                    stopped = true;
                }
                verdict
            });
            match result {
                Ok(()) => {}
                Err(err) if err.code() == ErrorCode::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Sorted, deduplicated child names of `dir` across all mounts.
    pub fn enumerate_files(&self, dir: &str) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        self.enumerate(dir, |name| {
            if let Err(pos) = out.binary_search_by(|have| have.as_str().cmp(name)) {
                out.insert(pos, name.to_owned());
            }
            EnumerateResult::Ok
        })?;
        Ok(out)
    }

    // -- archiver registry --------------------------------------------

    /// Add a format to the probe loop. One archiver per extension.
    pub fn register_archiver(&self, archiver: Box<dyn Archiver>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let ext = archiver.info().extension;
        if state
            .archivers
            .iter()
            .any(|a| unicode::utf8_stricmp(a.info().extension, ext) == CmpOrdering::Equal)
        {
            fail!(ErrorCode::Duplicate);
        }
        state.archivers.push(Arc::from(archiver));
        Ok(())
    }

    /// Remove a format by extension.
    pub fn deregister_archiver(&self, extension: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state
            .archivers
            .iter()
            .position(|a| {
                unicode::utf8_stricmp(a.info().extension, extension) == CmpOrdering::Equal
            })
        else {
            fail!(ErrorCode::NotFound);
        };
        state.archivers.remove(pos);
        Ok(())
    }

    pub fn supported_archive_types(&self) -> Vec<ArchiverInfo> {
        self.state
            .lock()
            .unwrap()
            .archivers
            .iter()
            .map(|a| a.info().clone())
            .collect()
    }
}

fn rooted(mount_point: &str) -> String {
    if mount_point.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}/", mount_point)
    }
}

/// Where `path` lands inside `mount`, accounting for mount point and
/// per-mount root. `None` when the path is outside the mount entirely;
/// an empty string when it is the mount point itself.
fn effective_path(mount: &Mount, path: &str) -> Option<String> {
    let rest = vpath::strip_mount_point(&mount.mount_point, path)?;
    let root = mount.root.lock().unwrap();
    Some(vpath::join_root(root.as_deref(), rest))
}

/// Walk every prefix of `path` through `stat`, refusing the moment a
/// symbolic link shows up. `allow_missing` lets write-side callers pass
/// components that don't exist yet.
fn verify_path(dir: &dyn ArchiveDir, path: &str, allow_missing: bool) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    let mut idx = 0;
    loop {
        let next = path[idx..].find('/').map(|n| idx + n);
        let prefix = match next {
            Some(n) => &path[..n],
            None => path,
        };
        match dir.stat(prefix) {
            Ok(st) if st.filetype == FileType::Symlink => {
                fail!(ErrorCode::SymlinkForbidden)
            }
            Ok(_) => {}
            Err(err) => {
                if allow_missing && err.code() == ErrorCode::NotFound {
                    return Ok(());
                }
                return Err(err);
            }
        }
        match next {
            Some(n) => idx = n + 1,
            None => return Ok(()),
        }
    }
}

/// Try every registered archiver, extension matches first (registry
/// order within each group), handing the source along until somebody
/// claims it. A `Broken` claim is final: the format recognized the file
/// and declared it damaged.
fn probe_archivers(
    archivers: &[Arc<dyn Archiver>],
    mut io: Box<dyn Io>,
    name: &str,
) -> Result<Box<dyn ArchiveDir>> {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext);
    let mut order: Vec<usize> = (0..archivers.len()).collect();
    if let Some(ext) = extension {
        order.sort_by_key(|&i| {
            if unicode::utf8_stricmp(archivers[i].info().extension, ext) == CmpOrdering::Equal {
                0
            } else {
                1
            }
        });
    }
    for i in order {
        io.seek(0)?;
        match archivers[i].open_archive(io, name, false) {
            Claim::Claimed(dir) => return Ok(dir),
            Claim::Broken(err) => return Err(err),
            Claim::Pass(back) => io = back,
        }
    }
    fail!(ErrorCode::Unsupported)
}
