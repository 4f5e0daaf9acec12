//! I-War / Independence War SLB files.
//!
//! The header is just three words — version, entry count, table offset —
//! with no signature text at all, so the probe leans on sanity checks and
//! this archiver runs last in the registry.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::fixed_name;
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::Result;
use crate::io::{Io, IoExt};
use crate::Archiver;

/// Name field plus offset and size words.
const RECORD_LEN: u64 = 64 + 4 + 4;

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "slb",
    description: "I-War / Independence War format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct SlbArchiver;

impl Archiver for SlbArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        match plausible(io.as_mut()) {
            Ok(true) => {}
            _ => return Claim::Pass(io),
        }
        trace!("slb: claiming {:?}", name);
        match load(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

fn plausible(io: &mut dyn Io) -> Result<bool> {
    let total = io.length()?;
    if total < 12 {
        return Ok(false);
    }
    io.seek(0)?;
    let version = io.read_ule32()?;
    let count = io.read_ule32()?;
    let toc_offset = u64::from(io.read_ule32()?);
    Ok(version == 0
        && count > 0
        && toc_offset >= 12
        && toc_offset
            .checked_add(u64::from(count) * RECORD_LEN)
            .map(|end| end <= total)
            .unwrap_or(false))
}

fn load(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    io.seek(4)?;
    let count = io.read_ule32()?;
    let toc_offset = u64::from(io.read_ule32()?);
    io.seek(toc_offset)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut field = [0u8; 64];
        io.read_exact_bytes(&mut field)?;
        let offset = u64::from(io.read_ule32()?);
        let size = u64::from(io.read_ule32()?);
        // names are stored with a leading backslash
        let name = fixed_name(&field);
        let name = name.strip_prefix('/').unwrap_or(&name).to_owned();
        entries.push((name, offset, size));
    }
    let mut archive = UnpackedArchive::new(io);
    for (name, offset, size) in entries {
        archive.add_entry(&name, false, -1, -1, offset, size)?;
    }
    Ok(archive)
}
