//! Descent II movie libraries (`DMVL`): an entry count, a flat table of
//! 13-byte names and sizes, then the payloads back to back.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::{fixed_name, try_read_exact};
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::Result;
use crate::io::{Io, IoExt};
use crate::Archiver;

const SIGNATURE: &[u8; 4] = b"DMVL";

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "mvl",
    description: "Descent II Movielib format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct MvlArchiver;

impl Archiver for MvlArchiver {
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
        trace!("mvl: claiming {:?}", name);
        match load(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

fn load(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let count = io.read_ule32()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut field = [0u8; 13];
        io.read_exact_bytes(&mut field)?;
        entries.push((fixed_name(&field), u64::from(io.read_ule32()?)));
    }
    let mut offset = 8 + 17 * u64::from(count);
    let mut archive = UnpackedArchive::new(io);
    for (name, size) in entries {
        archive.add_entry(&name, false, -1, -1, offset, size)?;
        offset += size;
    }
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;
    use crate::ArchiveDir;

    #[test]
    fn table_then_payloads() {
        let files = [("intro.mve", &b"movie one"[..]), ("end.mve", b"fin")];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SIGNATURE);
        bytes.extend_from_slice(&(files.len() as u32).to_le_bytes());
        for (name, data) in files {
            let mut field = [0u8; 13];
            field[..name.len()].copy_from_slice(name.as_bytes());
            bytes.extend_from_slice(&field);
            bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
        for (_, data) in files {
            bytes.extend_from_slice(data);
        }

        let archive = match MvlArchiver.open_archive(
            Box::new(MemoryIo::new(bytes)),
            "movies.mvl",
            false,
        ) {
            Claim::Claimed(a) => a,
            _ => panic!("expected a claim"),
        };
        let mut io = archive.open_read("end.mve").unwrap();
        let mut buf = [0u8; 3];
        io.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"fin");
        assert_eq!(archive.stat("intro.mve").unwrap().filesize, 9);
    }
}
