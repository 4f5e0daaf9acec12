//! Quake PAK files: a tiny header pointing at a directory of 64-byte
//! records, each a 56-byte path plus offset and size. Paths nest with
//! `/`, so these archives have real subdirectories.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::{fixed_name, try_read_exact};
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::{fail, ErrorCode, Result};
use crate::io::{Io, IoExt};
use crate::Archiver;

const SIGNATURE: &[u8; 4] = b"PACK";
const RECORD_LEN: u32 = 64;

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "pak",
    description: "Quake I/II format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct QpakArchiver;

impl Archiver for QpakArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        let mut sig = [0u8; 4];
        match io.seek(0).and_then(|_| try_read_exact(io.as_mut(), &mut sig)) {
            Ok(true) if &sig == SIGNATURE => {}
            _ => return Claim::Pass(io),
        }
        trace!("qpak: claiming {:?}", name);
        match load(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

fn load(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let dir_offset = u64::from(io.read_ule32()?);
    let dir_len = io.read_ule32()?;
    if dir_len % RECORD_LEN != 0 {
        fail!(ErrorCode::Corrupt);
    }
    let count = dir_len / RECORD_LEN;
    io.seek(dir_offset)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut field = [0u8; 56];
        io.read_exact_bytes(&mut field)?;
        let offset = u64::from(io.read_ule32()?);
        let size = u64::from(io.read_ule32()?);
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
    use crate::archiver::EnumerateResult;
    use crate::io::MemoryIo;
    use crate::ArchiveDir;

    #[test]
    fn nested_paths_become_directories() {
        let files = [
            ("sound/weapons/shotgun.wav", &b"boom"[..]),
            ("maps/start.bsp", b"spawn room"),
        ];
        let mut payloads = Vec::new();
        let mut dir = Vec::new();
        let mut offset = 12u32;
        for (name, data) in files {
            let mut field = [0u8; 56];
            field[..name.len()].copy_from_slice(name.as_bytes());
            dir.extend_from_slice(&field);
            dir.extend_from_slice(&offset.to_le_bytes());
            dir.extend_from_slice(&(data.len() as u32).to_le_bytes());
            payloads.extend_from_slice(data);
            offset += data.len() as u32;
        }
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SIGNATURE);
        bytes.extend_from_slice(&offset.to_le_bytes()); // dir comes after payloads
        bytes.extend_from_slice(&(dir.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payloads);
        bytes.extend_from_slice(&dir);

        let archive = match QpakArchiver.open_archive(
            Box::new(MemoryIo::new(bytes)),
            "pak0.pak",
            false,
        ) {
            Claim::Claimed(a) => a,
            _ => panic!("expected a claim"),
        };
        let mut io = archive.open_read("sound/weapons/shotgun.wav").unwrap();
        let mut buf = [0u8; 4];
        io.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"boom");

        assert_eq!(
            archive.stat("sound/weapons").unwrap().filetype,
            crate::FileType::Directory
        );
        let mut names = Vec::new();
        archive
            .enumerate("sound", &mut |n: &str| {
                names.push(n.to_owned());
                EnumerateResult::Ok
            })
            .unwrap();
        assert_eq!(names, ["weapons"]);
    }

    #[test]
    fn ragged_directory_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SIGNATURE);
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes.extend_from_slice(&63u32.to_le_bytes());
        match QpakArchiver.open_archive(Box::new(MemoryIo::new(bytes)), "bad.pak", false) {
            Claim::Broken(err) => assert_eq!(err.code(), ErrorCode::Corrupt),
            _ => panic!("expected broken"),
        }
    }
}
