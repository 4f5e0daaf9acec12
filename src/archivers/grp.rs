//! Build engine GRP files (Duke Nukem 3D and friends).
//!
//! A 12-byte signature, an entry count, then a flat table of 12-byte
//! names and sizes; file data follows the table in table order.

use log::trace;

use super::unpacked::UnpackedArchive;
use super::{fixed_name, try_read_exact};
use crate::archiver::{ArchiverInfo, Claim};
use crate::error::Result;
use crate::io::{Io, IoExt};
use crate::Archiver;

const SIGNATURE: &[u8; 12] = b"KenSilverman";

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "grp",
    description: "Build engine Groupfile format",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: false,
};

pub struct GrpArchiver;

impl Archiver for GrpArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        let mut sig = [0u8; 12];
        match io.seek(0).and_then(|_| try_read_exact(io.as_mut(), &mut sig)) {
            Ok(true) if &sig == SIGNATURE => {}
            _ => return Claim::Pass(io),
        }
        trace!("grp: claiming {:?}", name);
        match load(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

fn load(mut io: Box<dyn Io>) -> Result<UnpackedArchive> {
    let count = io.read_ule32()?;
    let mut names = Vec::with_capacity(count as usize);
    let mut sizes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut field = [0u8; 12];
        io.read_exact_bytes(&mut field)?;
        names.push(fixed_name(&field));
        sizes.push(u64::from(io.read_ule32()?));
    }

    // data is packed right behind the table
    let mut offset = 16 + 16 * u64::from(count);
    let mut archive = UnpackedArchive::new(io);
    for (name, size) in names.iter().zip(&sizes) {
        archive.add_entry(name, false, -1, -1, offset, *size)?;
        offset += size;
    }
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::EnumerateResult;
    use crate::io::MemoryIo;
    use crate::ArchiveDir;

    fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SIGNATURE);
        bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (name, data) in entries {
            let mut field = [0u8; 12];
            field[..name.len()].copy_from_slice(name.as_bytes());
            bytes.extend_from_slice(&field);
            bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
        for (_, data) in entries {
            bytes.extend_from_slice(data);
        }
        bytes
    }

    fn claim(bytes: Vec<u8>) -> Box<dyn ArchiveDir> {
        match GrpArchiver.open_archive(Box::new(MemoryIo::new(bytes)), "test.grp", false) {
            Claim::Claimed(a) => a,
            _ => panic!("expected a claim"),
        }
    }

    #[test]
    fn entries_map_to_packed_ranges() {
        let archive = claim(build(&[
            ("TILES.ART", b"artdata!"),
            ("GAME.CON", b"con"),
        ]));
        let mut io = archive.open_read("TILES.ART").unwrap();
        let mut buf = [0u8; 8];
        io.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"artdata!");

        let mut io = archive.open_read("GAME.CON").unwrap();
        assert_eq!(io.length().unwrap(), 3);
        let mut buf = [0u8; 3];
        io.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(&buf, b"con");

        let mut names = Vec::new();
        archive
            .enumerate("", &mut |n: &str| {
                names.push(n.to_owned());
                EnumerateResult::Ok
            })
            .unwrap();
        names.sort();
        assert_eq!(names, ["GAME.CON", "TILES.ART"]);
    }

    #[test]
    fn wrong_signature_is_passed() {
        let bytes = b"NotKenAtAll!\x00\x00\x00\x00".to_vec();
        match GrpArchiver.open_archive(Box::new(MemoryIo::new(bytes)), "x.grp", false) {
            Claim::Pass(_) => {}
            _ => panic!("must not claim"),
        }
    }
}
