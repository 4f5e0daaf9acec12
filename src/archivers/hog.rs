//! Descent HOG files, both generations.
//!
//! Descent 1/2 (`DHF`): no directory at all, just back-to-back records of
//! 13-byte name + size + payload until the file ends. Descent 3 (`HOG2`)
//! grew a real header and a directory table, with payloads packed
//! sequentially from a stated data offset.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::{fixed_name, try_read_exact};
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::Result;
use crate::io::{Io, IoExt};
use crate::Archiver;

const SIG_HOG1: &[u8; 3] = b"DHF";
const SIG_HOG2: &[u8; 4] = b"HOG2";

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "hog",
    description: "Descent I/II/III HOG file format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct HogArchiver;

impl Archiver for HogArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        let mut sig = [0u8; 3];
        match io.seek(0).and_then(|_| try_read_exact(io.as_mut(), &mut sig)) {
            Ok(true) => {}
            _ => return Claim::Pass(io),
        }
        let loaded = if &sig == SIG_HOG1 {
            trace!("hog: claiming {:?}", name);
            load_hog1(io)
        } else {
            let mut fourth = [0u8; 1];
            match try_read_exact(io.as_mut(), &mut fourth) {
                Ok(true) if [sig[0], sig[1], sig[2], fourth[0]] == *SIG_HOG2 => {}
                _ => return Claim::Pass(io),
            }
            trace!("hog: claiming {:?} (HOG2)", name);
            load_hog2(io)
        };
        match loaded {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

/// Walk record-by-record; the format has no count, it just stops at EOF.
fn load_hog1(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let total = io.length()?;
    io.seek(3)?;
    let mut pos = 3u64;
    let mut entries = Vec::new();
    while pos < total {
        let mut field = [0u8; 13];
        io.read_exact_bytes(&mut field)?;
        let size = u64::from(io.read_ule32()?);
        pos += 17;
        entries.push((fixed_name(&field), pos, size));
        pos += size;
        io.seek(pos)?;
    }
    let mut archive = UnpackedArchive::new(io);
    for (name, offset, size) in entries {
        archive.add_entry(&name, false, -1, -1, offset, size)?;
    }
    Ok(archive)
}

fn load_hog2(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let count = io.read_ule32()?;
    let mut offset = u64::from(io.read_ule32()?);
    io.seek(4 + 4 + 4 + 56)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut field = [0u8; 36];
        io.read_exact_bytes(&mut field)?;
        let _flags = io.read_ule32()?;
        let size = u64::from(io.read_ule32()?);
        let mtime = i64::from(io.read_ule32()?);
        entries.push((fixed_name(&field), size, mtime));
    }

    let mut archive = UnpackedArchive::new(io);
    for (name, size, mtime) in entries {
        archive.add_entry(&name, false, -1, mtime, offset, size)?;
        offset += size;
    }
    Ok(archive)
}
