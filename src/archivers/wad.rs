//! Doom engine WAD files.
//!
//! Payloads ("lumps") come first, then a directory of
//! `(offset, size, 8-byte name)` records at an offset named in the
//! header. Lump names are flat; maps rely on ordering tricks this layer
//! doesn't try to interpret.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::{fixed_name, try_read_exact};
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::Result;
use crate::io::{Io, IoExt};
use crate::Archiver;

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "wad",
    description: "DOOM engine format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct WadArchiver;

impl Archiver for WadArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        let mut sig = [0u8; 4];
        match io.seek(0).and_then(|_| try_read_exact(io.as_mut(), &mut sig)) {
            Ok(true) if &sig == b"IWAD" || &sig == b"PWAD" => {}
            _ => return Claim::Pass(io),
        }
        trace!("wad: claiming {:?}", name);
        match load(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

fn load(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let count = io.read_ule32()?;
    let dir_offset = u64::from(io.read_ule32()?);
    io.seek(dir_offset)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = u64::from(io.read_ule32()?);
        let size = u64::from(io.read_ule32()?);
        let mut field = [0u8; 8];
        io.read_exact_bytes(&mut field)?;
        entries.push((fixed_name(&field), offset, size));
    }
    let mut archive = UnpackedArchive::new(io);
    for (name, offset, size) in entries {
        archive.add_entry(&name, false, -1, -1, offset, size)?;
    }
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;
    use crate::ArchiveDir;

    fn build(kind: &[u8; 4], lumps: &[(&str, &[u8])]) -> Vec<u8> {
        let mut payloads = Vec::new();
        let mut dir = Vec::new();
        let mut offset = 12u32;
        for (name, data) in lumps {
            dir.extend_from_slice(&offset.to_le_bytes());
            dir.extend_from_slice(&(data.len() as u32).to_le_bytes());
            let mut field = [0u8; 8];
            field[..name.len()].copy_from_slice(name.as_bytes());
            dir.extend_from_slice(&field);
            payloads.extend_from_slice(data);
            offset += data.len() as u32;
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(kind);
        bytes.extend_from_slice(&(lumps.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&offset.to_le_bytes());
        bytes.extend_from_slice(&payloads);
        bytes.extend_from_slice(&dir);
        bytes
    }

    #[test]
    fn iwad_and_pwad_lumps() {
        for kind in [b"IWAD", b"PWAD"] {
            let bytes = build(kind, &[("PLAYPAL", b"palette"), ("E1M1", b"map01")]);
            let archive = match WadArchiver.open_archive(
                Box::new(MemoryIo::new(bytes)),
                "doom.wad",
                false,
            ) {
                Claim::Claimed(a) => a,
                _ => panic!("expected a claim"),
            };
            let mut io = archive.open_read("E1M1").unwrap();
            let mut buf = [0u8; 5];
            io.read_exact_bytes(&mut buf).unwrap();
            assert_eq!(&buf, b"map01");
            assert_eq!(archive.stat("PLAYPAL").unwrap().filesize, 7);
        }
    }

    #[test]
    fn non_wad_is_passed() {
        match WadArchiver.open_archive(Box::new(MemoryIo::new(&b"ZWAD...."[..])), "x.wad", false)
        {
            Claim::Pass(_) => {}
            _ => panic!("must not claim"),
        }
    }
}
