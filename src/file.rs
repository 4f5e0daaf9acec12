//! Open file handles, with optional buffering.
//!
//! A [`File`] owns its I/O source outright (archives hand out duplicated
//! sources), so it stays valid for as long as the application keeps it —
//! the mount it came from just can't be unmounted until it's dropped.
//! Handles are not thread-safe; share one between threads and you get to
//! keep both pieces.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{fail, ErrorCode, Result};
use crate::fs::HandleGuard;
use crate::io::{Io, IoExt};

/// An open virtual file.
///
/// Also implements the std `Read`/`Write`/`Seek` traits so it drops into
/// anything expecting ordinary Rust I/O.
impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("for_reading", &self.for_reading)
            .finish()
    }
}

pub struct File {
    io: Box<dyn Io>,
    for_reading: bool,
    buffer: Vec<u8>,
    buffer_fill: usize,
    buffer_pos: usize,
    _guard: Option<HandleGuard>,
}

impl File {
    pub(crate) fn new(io: Box<dyn Io>, for_reading: bool, guard: Option<HandleGuard>) -> Self {
        File {
            io,
            for_reading,
            buffer: Vec::new(),
            buffer_fill: 0,
            buffer_pos: 0,
            _guard: guard,
        }
    }

    /// Read up to `buf.len()` bytes. Zero means end of file.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.for_reading {
            fail!(ErrorCode::OpenForWriting);
        }
        if self.buffer.is_empty() {
            return self.io.read(buf);
        }
        let mut total = 0;
        while total < buf.len() {
            let avail = self.buffer_fill - self.buffer_pos;
            if avail > 0 {
                let n = avail.min(buf.len() - total);
                buf[total..total + n]
                    .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + n]);
                self.buffer_pos += n;
                total += n;
            } else {
                let n = self.io.read(&mut self.buffer)?;
                if n == 0 {
                    break;
                }
                self.buffer_fill = n;
                self.buffer_pos = 0;
            }
        }
        Ok(total)
    }

    /// Write `buf`, buffering if a buffer is attached and it fits.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        if self.for_reading {
            fail!(ErrorCode::OpenForReading);
        }
        if self.buffer.is_empty() {
            return self.io.write(buf);
        }
        if self.buffer_fill + buf.len() <= self.buffer.len() {
            self.buffer[self.buffer_fill..self.buffer_fill + buf.len()].copy_from_slice(buf);
            self.buffer_fill += buf.len();
            return Ok(buf.len());
        }
        self.flush()?;
        self.io.write(buf)
    }

    /// Absolute position, accounting for buffered bytes not yet seen by
    /// (or sent to) the underlying source.
    pub fn tell(&mut self) -> u64 {
        if self.buffer.is_empty() {
            self.io.tell()
        } else if self.for_reading {
            self.io.tell() - self.buffer_fill as u64 + self.buffer_pos as u64
        } else {
            self.io.tell() + self.buffer_fill as u64
        }
    }

    /// Reposition to absolute offset `pos`.
    ///
    /// On a buffered read handle, a target inside the buffered window
    /// moves only the buffer cursor and touches nothing underneath.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if self.for_reading {
            if !self.buffer.is_empty() && self.buffer_fill > 0 {
                let window_start = self.io.tell() - self.buffer_fill as u64;
                if pos >= window_start && pos < window_start + self.buffer_fill as u64 {
                    self.buffer_pos = (pos - window_start) as usize;
                    return Ok(());
                }
            }
            self.buffer_fill = 0;
            self.buffer_pos = 0;
            if pos > self.io.length()? {
                fail!(ErrorCode::PastEof);
            }
            self.io.seek(pos)
        } else {
            self.flush()?;
            self.io.seek(pos)
        }
    }

    /// Total length of the file.
    pub fn length(&mut self) -> Result<u64> {
        self.io.length()
    }

    /// Whether a read handle has consumed everything.
    pub fn eof(&mut self) -> bool {
        self.for_reading
            && match self.length() {
                Ok(len) => self.tell() >= len,
                Err(_) => false,
            }
    }

    /// Attach (or with `size` 0, detach) an I/O buffer.
    ///
    /// Pending writes are flushed first; a mid-buffer read position is
    /// pushed back down to the source so the next refill continues from
    /// the right place. `tell` is unchanged across this call.
    pub fn set_buffer(&mut self, size: usize) -> Result<()> {
        self.flush()?;
        if self.for_reading && self.buffer_fill > self.buffer_pos {
            let logical = self.tell();
            self.io.seek(logical)?;
        }
        self.buffer = vec![0; size];
        self.buffer_fill = 0;
        self.buffer_pos = 0;
        Ok(())
    }

    /// Push buffered writes to the source. No-op on read handles.
    pub fn flush(&mut self) -> Result<()> {
        if self.for_reading || self.buffer_fill == 0 {
            return Ok(());
        }
        let fill = self.buffer_fill;
        self.io.write_all_bytes(&self.buffer[..fill])?;
        self.buffer_fill = 0;
        self.io.flush()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(Into::into)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        File::flush(self).map_err(Into::into)
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::Current(delta) => {
                let here = self.tell() as i64 + delta;
                if here < 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek before start",
                    ));
                }
                here as u64
            }
            SeekFrom::End(delta) => {
                let len = self.length().map_err(io::Error::from)? as i64;
                let here = len + delta;
                if here < 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek before start",
                    ));
                }
                here as u64
            }
        };
        File::seek(self, target).map_err(io::Error::from)?;
        Ok(target)
    }
}
