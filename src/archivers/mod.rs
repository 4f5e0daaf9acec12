//! The built-in archive backends.
//!
//! `dir` is special-cased by the mount logic (host directories are not
//! probed); everything else registers as an [`Archiver`] and takes its
//! turn in the claim loop. SLB goes last: its header has no signature
//! text, only a version word, so it is the most likely to claim a file
//! it shouldn't.

pub mod dir;
pub mod grp;
pub mod hog;
pub mod mvl;
pub mod qpak;
pub mod slb;
pub mod unpacked;
pub mod vdf;
pub mod wad;
pub mod zip;

use std::sync::Arc;

use crate::archiver::Archiver;
use crate::error::Result;
use crate::io::Io;

pub(crate) fn default_archivers() -> Vec<Arc<dyn Archiver>> {
    vec![
        Arc::new(zip::ZipArchiver),
        Arc::new(grp::GrpArchiver),
        Arc::new(hog::HogArchiver),
        Arc::new(mvl::MvlArchiver),
        Arc::new(wad::WadArchiver),
        Arc::new(qpak::QpakArchiver),
        Arc::new(vdf::VdfArchiver),
        Arc::new(slb::SlbArchiver),
    ]
}

/// Fill `buf` if the source has that many bytes left; `false` (not an
/// error) if it runs short. Signature probes use this so that a too-small
/// file reads as "not this format".
pub(crate) fn try_read_exact(io: &mut dyn Io, buf: &mut [u8]) -> Result<bool> {
    let mut off = 0;
    while off < buf.len() {
        let n = io.read(&mut buf[off..])?;
        if n == 0 {
            return Ok(false);
        }
        off += n;
    }
    Ok(true)
}

/// Decode a fixed-width name field from a DOS-era directory record:
/// stop at the first NUL, treat the bytes as Latin-1, and normalize any
/// backslash separators.
pub(crate) fn fixed_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    crate::unicode::utf8_from_latin1(&field[..end]).replace('\\', "/")
}

/// Convert a packed DOS date/time (`(date << 16) | time`, as the fields
/// sit in ZIP and VDF records) to Unix epoch seconds, treating the stamp
/// as UTC. Returns `-1` for field values no calendar ever produced.
pub(crate) fn dos_time_to_unix(dos: u32) -> i64 {
    let time = dos & 0xFFFF;
    let date = dos >> 16;

    let second = i64::from(time & 0x1F) * 2;
    let minute = i64::from((time >> 5) & 0x3F);
    let hour = i64::from(time >> 11);
    let day = i64::from(date & 0x1F);
    let month = i64::from((date >> 5) & 0x0F);
    let year = 1980 + i64::from(date >> 9);

    if !(1..=12).contains(&month) || day == 0 || hour > 23 || minute > 59 || second > 59 {
        return -1;
    }

    // days-from-civil, proleptic Gregorian
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146097 + doe - 719468;

    days * 86400 + hour * 3600 + minute * 60 + second
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_time_conversion() {
        // 2020-05-15 12:34:56 UTC
        let date = (40 << 9) | (5 << 5) | 15;
        let time = (12 << 11) | (34 << 5) | 28;
        assert_eq!(dos_time_to_unix((date << 16) | time), 1_589_546_096);
        // DOS epoch itself
        let date = (0 << 9) | (1 << 5) | 1;
        assert_eq!(dos_time_to_unix(date << 16), 315_532_800);
    }

    #[test]
    fn nonsense_fields_are_unknown() {
        assert_eq!(dos_time_to_unix(0), -1); // month and day zero
        let bad_month = ((0 << 9) | (13 << 5) | 1) << 16;
        assert_eq!(dos_time_to_unix(bad_month), -1);
    }
}
