//! The I/O source abstraction.
//!
//! Everything the library reads from or writes to — host files, memory
//! buffers, byte ranges inside archives, decompression streams — sits
//! behind the [`Io`] trait so that mounts and file handles never care what
//! actually backs them. All offsets are absolute; there is no relative
//! seek at this layer.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{fail, Error, ErrorCode, Result};

/// A blocking, seekable byte source (and optionally sink).
///
/// Implementations are not required to be individually thread-safe; the
/// supported pattern for parallel reads is [`Io::duplicate`], which yields
/// an independently-positioned clone. Sources that cannot be duplicated
/// (e.g. a wrapped foreign stream) return [`ErrorCode::Unsupported`] and
/// cannot back a read mount.
impl std::fmt::Debug for dyn Io {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn Io>")
    }
}

pub trait Io: Send {
    /// Read up to `buf.len()` bytes, returning how many were read.
    /// Zero means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf`, returning how many bytes were accepted. Read-only
    /// sources refuse with [`ErrorCode::Unsupported`].
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let _ = buf;
        fail!(ErrorCode::Unsupported)
    }

    /// Reposition to the absolute offset `pos`.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current absolute offset.
    fn tell(&mut self) -> u64;

    /// Total length of the source in bytes.
    fn length(&mut self) -> Result<u64>;

    /// An independent clone of this source, positioned at the same offset.
    fn duplicate(&mut self) -> Result<Box<dyn Io>>;

    /// Flush buffered writes down to the backing store.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sequential record-parsing helpers layered over [`Io`]: exact reads,
/// and little/big-endian integer reads of the sizes archive formats use.
///
/// A short read in the middle of a structure is reported as
/// [`ErrorCode::Corrupt`]: these are for places where the format promises
/// the bytes exist.
pub trait IoExt: Io {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut off = 0;
        while off < buf.len() {
            let n = self.read(&mut buf[off..])?;
            if n == 0 {
                fail!(ErrorCode::Corrupt);
            }
            off += n;
        }
        Ok(())
    }

    fn read_ule16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact_bytes(&mut b)?;
        Ok(LittleEndian::read_u16(&b))
    }

    fn read_ule32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(LittleEndian::read_u32(&b))
    }

    fn read_ule64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact_bytes(&mut b)?;
        Ok(LittleEndian::read_u64(&b))
    }

    fn read_ube16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_u16(&b))
    }

    fn read_ube32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_u32(&b))
    }

    fn read_ube64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_u64(&b))
    }

    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        let mut off = 0;
        while off < buf.len() {
            let n = self.write(&buf[off..])?;
            if n == 0 {
                fail!(ErrorCode::NoSpace);
            }
            off += n;
        }
        Ok(())
    }

    fn write_ule16(&mut self, v: u16) -> Result<()> {
        self.write_all_bytes(&v.to_le_bytes())
    }

    fn write_ule32(&mut self, v: u32) -> Result<()> {
        self.write_all_bytes(&v.to_le_bytes())
    }

    fn write_ule64(&mut self, v: u64) -> Result<()> {
        self.write_all_bytes(&v.to_le_bytes())
    }

    fn write_ube16(&mut self, v: u16) -> Result<()> {
        self.write_all_bytes(&v.to_be_bytes())
    }

    fn write_ube32(&mut self, v: u32) -> Result<()> {
        self.write_all_bytes(&v.to_be_bytes())
    }

    fn write_ube64(&mut self, v: u64) -> Result<()> {
        self.write_all_bytes(&v.to_be_bytes())
    }
}

impl<T: Io + ?Sized> IoExt for T {}

/// Byte-order swaps: convert a value read verbatim from a little-endian
/// field into native order, and back. The `u`/`s` pairs exist so signed
/// fields can be swapped without casts at the call site.
pub fn swap_ule16(v: u16) -> u16 {
    u16::from_le(v)
}
pub fn swap_ule32(v: u32) -> u32 {
    u32::from_le(v)
}
pub fn swap_ule64(v: u64) -> u64 {
    u64::from_le(v)
}
pub fn swap_sle16(v: i16) -> i16 {
    i16::from_le(v)
}
pub fn swap_sle32(v: i32) -> i32 {
    i32::from_le(v)
}
pub fn swap_sle64(v: i64) -> i64 {
    i64::from_le(v)
}
pub fn swap_ube16(v: u16) -> u16 {
    u16::from_be(v)
}
pub fn swap_ube32(v: u32) -> u32 {
    u32::from_be(v)
}
pub fn swap_ube64(v: u64) -> u64 {
    u64::from_be(v)
}
pub fn swap_sbe16(v: i16) -> i16 {
    i16::from_be(v)
}
pub fn swap_sbe32(v: i32) -> i32 {
    i32::from_be(v)
}
pub fn swap_sbe64(v: i64) -> i64 {
    i64::from_be(v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeMode {
    Read,
    Write,
    Append,
}

/// An [`Io`] over a host file.
///
/// Keeps the path around so [`Io::duplicate`] can reopen it; duplicates
/// are only supported for read sources, since two writers through
/// independent descriptors would trample each other.
pub struct NativeIo {
    file: fs::File,
    path: PathBuf,
    mode: NativeMode,
    pos: u64,
}

impl NativeIo {
    pub fn open_read(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        Ok(NativeIo {
            file,
            path: path.to_owned(),
            mode: NativeMode::Read,
            pos: 0,
        })
    }

    pub fn open_write(path: &Path) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(NativeIo {
            file,
            path: path.to_owned(),
            mode: NativeMode::Write,
            pos: 0,
        })
    }

    pub fn open_append(path: &Path) -> Result<Self> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)?;
        let pos = file.seek(SeekFrom::End(0))?;
        Ok(NativeIo {
            file,
            path: path.to_owned(),
            mode: NativeMode::Append,
            pos,
        })
    }
}

impl Io for NativeIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.file.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.mode == NativeMode::Read {
            fail!(ErrorCode::OpenForReading);
        }
        let n = self.file.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn tell(&mut self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        if self.mode != NativeMode::Read {
            fail!(ErrorCode::Unsupported);
        }
        let mut dup = NativeIo::open_read(&self.path)?;
        dup.seek(self.pos)?;
        Ok(Box::new(dup))
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// A read-only [`Io`] over a shared in-memory buffer.
///
/// The buffer lives behind an `Arc`, so duplicates are a refcount bump and
/// the bytes are freed when the last source drops.
pub struct MemoryIo {
    buf: Arc<[u8]>,
    pos: u64,
}

impl MemoryIo {
    pub fn new(buf: impl Into<Arc<[u8]>>) -> Self {
        MemoryIo {
            buf: buf.into(),
            pos: 0,
        }
    }
}

impl Io for MemoryIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = (self.buf.len() as u64).saturating_sub(self.pos) as usize;
        let n = avail.min(buf.len());
        let start = self.pos as usize;
        buf[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.buf.len() as u64 {
            fail!(ErrorCode::PastEof);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&mut self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        Ok(Box::new(MemoryIo {
            buf: Arc::clone(&self.buf),
            pos: self.pos,
        }))
    }
}

/// An [`Io`] adapter over any `Read + Seek` stream.
///
/// Used to mount an already-open handle. It cannot be duplicated (the
/// stream is foreign), which in turn means archives that need multiple
/// simultaneous entry readers will refuse it at open time.
pub struct StreamIo<S> {
    stream: S,
    pos: u64,
}

impl<S: Read + Seek + Send> StreamIo<S> {
    pub fn new(mut stream: S) -> Result<Self> {
        let pos = stream.stream_position().map_err(Error::from)?;
        Ok(StreamIo { stream, pos })
    }
}

impl<S: Read + Seek + Send> Io for StreamIo<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.stream.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.stream.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn tell(&mut self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Result<u64> {
        let end = self.stream.seek(SeekFrom::End(0))?;
        self.stream.seek(SeekFrom::Start(self.pos))?;
        Ok(end)
    }

    fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        fail!(ErrorCode::Unsupported)
    }
}
