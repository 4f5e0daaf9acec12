//! Gothic I/II VDF files.
//!
//! A 256-byte free-text comment, a 16-byte signature (Gothic I and II
//! differ only in the line endings baked into it), counts, a global DOS
//! timestamp, and a catalog of 80-byte entries. Directory entries exist
//! in the catalog to delimit subtrees; files carry absolute data
//! offsets, so the catalog can be read flat.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::{dos_time_to_unix, fixed_name, try_read_exact};
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::{fail, ErrorCode, Result};
use crate::io::{Io, IoExt};
use crate::Archiver;

const COMMENT_LEN: u64 = 256;
const SIG_GOTHIC1: &[u8; 16] = b"PSVDSC_V2.00\r\n\r\n";
const SIG_GOTHIC2: &[u8; 16] = b"PSVDSC_V2.00\n\r\n\r";
const SUPPORTED_VERSION: u32 = 0x50;

const ENTRY_DIRECTORY: u32 = 0x8000_0000;

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "vdf",
    description: "Gothic I/II engine format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct VdfArchiver;

impl Archiver for VdfArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        let mut sig = [0u8; 16];
        let probed = io
            .seek(COMMENT_LEN)
            .and_then(|_| try_read_exact(io.as_mut(), &mut sig));
        match probed {
            Ok(true) if &sig == SIG_GOTHIC1 || &sig == SIG_GOTHIC2 => {}
            _ => return Claim::Pass(io),
        }
        trace!("vdf: claiming {:?}", name);
        match load(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

fn load(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let count = io.read_ule32()?;
    let _num_files = io.read_ule32()?;
    let timestamp = io.read_ule32()?;
    let _data_size = io.read_ule32()?;
    let root_offset = u64::from(io.read_ule32()?);
    let version = io.read_ule32()?;
    if version != SUPPORTED_VERSION {
        fail!(ErrorCode::Unsupported);
    }
    let mtime = dos_time_to_unix(timestamp);

    io.seek(root_offset)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut field = [0u8; 64];
        io.read_exact_bytes(&mut field)?;
        let offset = u64::from(io.read_ule32()?);
        let size = u64::from(io.read_ule32()?);
        let kind = io.read_ule32()?;
        let _attributes = io.read_ule32()?;
        if kind & ENTRY_DIRECTORY != 0 {
            continue;
        }
        // names are space padded
        let name = fixed_name(&field).trim_end().to_owned();
        if name.is_empty() {
            continue;
        }
        entries.push((name, offset, size));
    }
    let mut archive = UnpackedArchive::new(io);
    for (name, offset, size) in entries {
        archive.add_entry(&name, false, -1, mtime, offset, size)?;
    }
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;
    use crate::ArchiveDir;

    fn build(sig: &[u8; 16], files: &[(&str, &[u8])]) -> Vec<u8> {
        let header_len = COMMENT_LEN as usize + 16 + 24;
        let catalog_len = files.len() * 80;
        let mut data_offset = (header_len + catalog_len) as u32;

        let mut catalog = Vec::new();
        let mut payloads = Vec::new();
        for (name, data) in files {
            let mut field = [b' '; 64];
            field[..name.len()].copy_from_slice(name.as_bytes());
            catalog.extend_from_slice(&field);
            catalog.extend_from_slice(&data_offset.to_le_bytes());
            catalog.extend_from_slice(&(data.len() as u32).to_le_bytes());
            catalog.extend_from_slice(&0u32.to_le_bytes());
            catalog.extend_from_slice(&0u32.to_le_bytes());
            payloads.extend_from_slice(data);
            data_offset += data.len() as u32;
        }

        let mut bytes = vec![b'#'; COMMENT_LEN as usize];
        bytes.extend_from_slice(sig);
        bytes.extend_from_slice(&(files.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(files.len() as u32).to_le_bytes());
        let stamp: u32 = (((2002 - 1980) << 9 | (3 << 5) | 4) << 16) | (10 << 11);
        bytes.extend_from_slice(&stamp.to_le_bytes());
        bytes.extend_from_slice(&(payloads.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(header_len as u32).to_le_bytes());
        bytes.extend_from_slice(&SUPPORTED_VERSION.to_le_bytes());
        bytes.extend_from_slice(&catalog);
        bytes.extend_from_slice(&payloads);
        bytes
    }

    #[test]
    fn both_signature_variants_load() {
        for sig in [SIG_GOTHIC1, SIG_GOTHIC2] {
            let bytes = build(sig, &[("ANIMS.MAN", b"animation"), ("WORLD.ZEN", b"world")]);
            let archive = match VdfArchiver.open_archive(
                Box::new(MemoryIo::new(bytes)),
                "anims.vdf",
                false,
            ) {
                Claim::Claimed(a) => a,
                _ => panic!("expected a claim"),
            };
            let mut io = archive.open_read("WORLD.ZEN").unwrap();
            let mut buf = [0u8; 5];
            io.read_exact_bytes(&mut buf).unwrap();
            assert_eq!(&buf, b"world");
            let st = archive.stat("ANIMS.MAN").unwrap();
            assert_eq!(st.filesize, 9);
            assert!(st.modtime > 0);
        }
    }

    #[test]
    fn unsupported_version_is_broken() {
        let mut bytes = build(SIG_GOTHIC1, &[("X", b"y")]);
        let version_at = COMMENT_LEN as usize + 16 + 20;
        bytes[version_at] = 0x51;
        match VdfArchiver.open_archive(Box::new(MemoryIo::new(bytes)), "x.vdf", false) {
            Claim::Broken(err) => assert_eq!(err.code(), ErrorCode::Unsupported),
            _ => panic!("expected broken"),
        }
    }
}
