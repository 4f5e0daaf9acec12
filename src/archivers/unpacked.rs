//! The shared backend for formats whose entries are plain byte ranges.
//!
//! Most game pack formats are just a directory table over an
//! uncompressed blob: a parser reads the table, registers each entry
//! here, and everything else — lookup, stat, enumeration, windowed
//! readers — is common. Each opened entry gets its own duplicate of the
//! underlying source, so entries can be read concurrently.

use std::sync::Mutex;

use crate::archiver::{EnumerateCallback, EnumerateResult};
use crate::error::{fail, Error, ErrorCode, Result};
use crate::io::Io;
use crate::tree::DirTree;
use crate::{ArchiveDir, FileType, Stat};

#[derive(Debug, Default, Clone, Copy)]
pub struct UnpackedEntry {
    pub offset: u64,
    pub len: u64,
    pub ctime: i64,
    pub mtime: i64,
}

/// An archive of uncompressed byte ranges.
pub struct UnpackedArchive {
    state: Mutex<State>,
}

struct State {
    io: Box<dyn Io>,
    tree: DirTree<UnpackedEntry>,
}

impl UnpackedArchive {
    pub fn new(io: Box<dyn Io>) -> Self {
        UnpackedArchive {
            state: Mutex::new(State {
                io,
                tree: DirTree::new(),
            }),
        }
    }

    /// Register one entry. Ancestor directories appear automatically.
    pub fn add_entry(
        &mut self,
        name: &str,
        isdir: bool,
        ctime: i64,
        mtime: i64,
        offset: u64,
        len: u64,
    ) -> Result<()> {
        let state = self.state.get_mut().unwrap();
        let idx = state.tree.add(name, isdir)?;
        state.tree.entry_mut(idx).payload = UnpackedEntry {
            offset,
            len,
            ctime,
            mtime,
        };
        Ok(())
    }

    /// Number of entries registered so far.
    pub fn len(&mut self) -> usize {
        self.state.get_mut().unwrap().tree.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

impl ArchiveDir for UnpackedArchive {
    fn open_read(&self, path: &str) -> Result<Box<dyn Io>> {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.tree.find(path) else {
            fail!(ErrorCode::NotFound);
        };
        let entry = state.tree.entry(idx);
        if entry.is_dir() {
            fail!(ErrorCode::NotAFile);
        }
        let window = entry.payload;
        let mut io = state.io.duplicate()?;
        io.seek(window.offset)?;
        Ok(Box::new(WindowedIo {
            io,
            start: window.offset,
            len: window.len,
            pos: 0,
        }))
    }

    fn open_write(&self, _path: &str) -> Result<Box<dyn Io>> {
        fail!(ErrorCode::ReadOnly)
    }

    fn open_append(&self, _path: &str) -> Result<Box<dyn Io>> {
        fail!(ErrorCode::ReadOnly)
    }

    fn remove(&self, _path: &str) -> Result<()> {
        fail!(ErrorCode::ReadOnly)
    }

    fn mkdir(&self, _path: &str) -> Result<()> {
        fail!(ErrorCode::ReadOnly)
    }

    fn stat(&self, path: &str) -> Result<Stat> {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.tree.find(path) else {
            fail!(ErrorCode::NotFound);
        };
        let entry = state.tree.entry(idx);
        if entry.is_dir() {
            return Ok(Stat::virtual_dir());
        }
        let meta = entry.payload;
        Ok(Stat {
            filesize: meta.len as i64,
            modtime: meta.mtime,
            createtime: meta.ctime,
            accesstime: -1,
            filetype: FileType::Regular,
            readonly: true,
        })
    }

    fn enumerate(&self, dir: &str, cb: &mut EnumerateCallback<'_>) -> Result<()> {
        let state = self.state.lock().unwrap();
        let mut failed = false;
        let found = state.tree.enumerate(dir, |name| match cb(name) {
            EnumerateResult::Ok => true,
            EnumerateResult::Stop => false,
            EnumerateResult::Error => {
                failed = true;
                false
            }
        });
        if failed {
            return Err(Error::from_callback());
        }
        if !found {
            fail!(ErrorCode::NotFound);
        }
        Ok(())
    }
}

/// Read-only view of `[start, start + len)` in the underlying source.
pub(crate) struct WindowedIo {
    io: Box<dyn Io>,
    start: u64,
    len: u64,
    pos: u64,
}

impl Io for WindowedIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = (self.len - self.pos) as usize;
        let want = buf.len().min(remaining);
        if want == 0 {
            return Ok(0);
        }
        let n = self.io.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            fail!(ErrorCode::PastEof);
        }
        self.io.seek(self.start + pos)?;
        self.pos = pos;
        Ok(())
    }

    fn tell(&mut self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.len)
    }

    fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        let mut io = self.io.duplicate()?;
        io.seek(self.start + self.pos)?;
        Ok(Box::new(WindowedIo {
            io,
            start: self.start,
            len: self.len,
            pos: self.pos,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{IoExt, MemoryIo};

    fn sample() -> UnpackedArchive {
        // blob: [AAAA][BBBBBB][CC]
        let blob = b"AAAABBBBBBCC".to_vec();
        let mut archive = UnpackedArchive::new(Box::new(MemoryIo::new(blob)));
        archive.add_entry("a.bin", false, -1, 100, 0, 4).unwrap();
        archive.add_entry("dir/b.bin", false, -1, 200, 4, 6).unwrap();
        archive.add_entry("dir/c.bin", false, -1, 300, 10, 2).unwrap();
        archive
    }

    #[test]
    fn windowed_reads_stay_in_bounds() {
        let archive = sample();
        let mut io = archive.open_read("dir/b.bin").unwrap();
        assert_eq!(io.length().unwrap(), 6);
        let mut buf = [0u8; 16];
        assert_eq!(io.read(&mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"BBBBBB");
        assert_eq!(io.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn windowed_seek_is_relative_to_the_entry() {
        let archive = sample();
        let mut io = archive.open_read("a.bin").unwrap();
        io.seek(2).unwrap();
        assert_eq!(io.tell(), 2);
        let mut buf = [0u8; 2];
        io.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"AA");
        assert!(io.seek(5).is_err());
    }

    #[test]
    fn entries_read_independently() {
        let archive = sample();
        let mut one = archive.open_read("dir/b.bin").unwrap();
        let mut two = archive.open_read("dir/c.bin").unwrap();
        let mut buf = [0u8; 2];
        two.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"CC");
        one.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"BB");
    }

    #[test]
    fn stat_and_mutation_rules() {
        let archive = sample();
        let st = archive.stat("dir/b.bin").unwrap();
        assert_eq!(st.filesize, 6);
        assert_eq!(st.modtime, 200);
        assert!(st.readonly);
        assert_eq!(archive.stat("dir").unwrap().filetype, FileType::Directory);
        assert_eq!(
            archive.open_write("x").unwrap_err().code(),
            ErrorCode::ReadOnly
        );
        assert_eq!(archive.mkdir("x").unwrap_err().code(), ErrorCode::ReadOnly);
    }

    #[test]
    fn enumerate_reports_missing_dirs() {
        let archive = sample();
        let mut names = Vec::new();
        archive
            .enumerate("dir", &mut |n: &str| {
                names.push(n.to_owned());
                EnumerateResult::Ok
            })
            .unwrap();
        names.sort();
        assert_eq!(names, ["b.bin", "c.bin"]);
        assert!(archive.enumerate("nope", &mut |_: &str| EnumerateResult::Ok).is_err());
    }
}
