//! The ZIP backend.
//!
//! A full central-directory reader: Zip32 and Zip64, stored and DEFLATE
//! entries, traditional PKWARE encryption, and in-archive symbolic links.
//! The central directory is loaded once at mount; local file headers are
//! parsed lazily the first time an entry is actually touched, because
//! they repeat the central directory's data and (in archives written by
//! some tools) disagree with it in ways that only matter if you open the
//! entry.
//!
//! Self-extracting archives put arbitrary data in front of the first
//! local header, so every stored offset is biased by wherever the
//! end-of-central-directory record actually turned out to live.

use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};
use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, trace};

use super::dos_time_to_unix;
use crate::archiver::{ArchiverInfo, Claim, EnumerateCallback, EnumerateResult};
use crate::error::{fail, Error, ErrorCode, Result};
use crate::io::{Io, IoExt};
use crate::tree::DirTree;
use crate::{ArchiveDir, Archiver, FileType, Stat};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

const EXTRA_ZIP64: u16 = 0x0001;

/// 16-bit comment length plus the 22-byte record itself.
const EOCD_SCAN_MAX: u64 = 65_557;
/// How far we'll hunt for a Zip64 EOCD whose locator lied about its
/// offset (self-extractors prepend data without patching it).
const ZIP64_EOCD_SCAN_MAX: u64 = 256 * 1024;

const CRYPTO_HEADER_LEN: u64 = 12;
const INFLATE_BUF_LEN: usize = 16 * 1024;
/// Symlink targets are paths; anything bigger than this is not one.
const MAX_SYMLINK_LEN: u64 = 64 * 1024;

static INFO: ArchiverInfo = ArchiverInfo {
    extension: "zip",
    description: "PkZip/WinZip/Info-Zip compatible",
    author: "physfs developers",
    url: "https://github.com/physfs",
    supports_symlinks: true,
};

pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn info(&self) -> &ArchiverInfo {
        &INFO
    }

    fn open_archive(&self, mut io: Box<dyn Io>, name: &str, for_write: bool) -> Claim {
        if for_write {
            return Claim::Pass(io);
        }
        match is_zip(io.as_mut()) {
            Ok(true) => {}
            _ => return Claim::Pass(io),
        }
        trace!("zip: claiming {:?}", name);
        match ZipArchive::open(io) {
            Ok(archive) => Claim::Claimed(Box::new(archive)),
            Err(err) => Claim::Broken(err),
        }
    }
}

/// Quick recognition: a local-header signature at offset zero, or an
/// end-of-central-directory record near the tail (archives with
/// prepended data have no magic up front).
fn is_zip(io: &mut dyn Io) -> Result<bool> {
    io.seek(0)?;
    let mut sig = [0u8; 4];
    let mut got = 0;
    while got < 4 {
        let n = io.read(&mut sig[got..])?;
        if n == 0 {
            return Ok(false);
        }
        got += n;
    }
    if LittleEndian::read_u32(&sig) == LOCAL_HEADER_SIG {
        return Ok(true);
    }
    Ok(find_eocd(io)?.is_some())
}

struct Eocd {
    pos: u64,
    disk_num: u16,
    cd_disk: u16,
    total_entries: u16,
    cd_size: u32,
    cd_offset: u32,
}

/// Scan backward from end-of-file for the EOCD record. A candidate only
/// counts if its comment length walks exactly to end-of-file, which
/// rules out signature bytes that happen to appear inside the comment.
fn find_eocd(io: &mut dyn Io) -> Result<Option<Eocd>> {
    let file_len = io.length()?;
    if file_len < 22 {
        return Ok(None);
    }
    let scan = file_len.min(EOCD_SCAN_MAX);
    let start = file_len - scan;
    io.seek(start)?;
    let mut buf = vec![0u8; scan as usize];
    io.read_exact_bytes(&mut buf)?;

    for i in (0..=buf.len() - 22).rev() {
        if LittleEndian::read_u32(&buf[i..]) != EOCD_SIG {
            continue;
        }
        let rec = &buf[i + 4..];
        let comment_len = LittleEndian::read_u16(&rec[16..]);
        let pos = start + i as u64;
        if pos + 22 + u64::from(comment_len) != file_len {
            continue;
        }
        return Ok(Some(Eocd {
            pos,
            disk_num: LittleEndian::read_u16(&rec[0..]),
            cd_disk: LittleEndian::read_u16(&rec[2..]),
            total_entries: LittleEndian::read_u16(&rec[6..]),
            cd_size: LittleEndian::read_u32(&rec[8..]),
            cd_offset: LittleEndian::read_u32(&rec[12..]),
        }));
    }
    Ok(None)
}

struct DirectoryBounds {
    entry_count: u64,
    cd_offset: u64,
    /// Bias to add to every offset stored in the archive.
    data_start: u64,
    zip64: bool,
}

fn parse_end_records(io: &mut dyn Io) -> Result<DirectoryBounds> {
    let Some(eocd) = find_eocd(io)? else {
        fail!(ErrorCode::Corrupt);
    };
    if eocd.disk_num != eocd.cd_disk {
        fail!(ErrorCode::Unsupported);
    }

    if eocd.pos >= 20 {
        io.seek(eocd.pos - 20)?;
        if io.read_ule32()? == ZIP64_LOCATOR_SIG {
            let _cd_disk = io.read_ule32()?;
            let stored_offset = io.read_ule64()?;
            let _total_disks = io.read_ule32()?;
            let z64_pos = locate_zip64_eocd(io, stored_offset, eocd.pos - 20)?;

            io.seek(z64_pos + 4)?;
            let _record_size = io.read_ule64()?;
            let _version_made = io.read_ule16()?;
            let _version_needed = io.read_ule16()?;
            let disk_num = io.read_ule32()?;
            let cd_disk = io.read_ule32()?;
            let _disk_entries = io.read_ule64()?;
            let total_entries = io.read_ule64()?;
            let _cd_size = io.read_ule64()?;
            let cd_offset = io.read_ule64()?;
            if disk_num != cd_disk {
                fail!(ErrorCode::Unsupported);
            }
            let data_start = z64_pos - stored_offset;
            if data_start != 0 {
                debug!("zip: {} bytes of prepended data (zip64)", data_start);
            }
            return Ok(DirectoryBounds {
                entry_count: total_entries,
                cd_offset,
                data_start,
                zip64: true,
            });
        }
    }

    let data_start = eocd
        .pos
        .checked_sub(u64::from(eocd.cd_size))
        .and_then(|x| x.checked_sub(u64::from(eocd.cd_offset)))
        .ok_or_else(|| Error::new(ErrorCode::Corrupt))?;
    if data_start != 0 {
        debug!("zip: {} bytes of prepended data", data_start);
    }
    Ok(DirectoryBounds {
        entry_count: u64::from(eocd.total_entries),
        cd_offset: u64::from(eocd.cd_offset),
        data_start,
        zip64: false,
    })
}

/// The locator's offset is authoritative only for archives with nothing
/// prepended; otherwise the record sits further along, so fall back to a
/// bounded backward hunt for its signature.
fn locate_zip64_eocd(io: &mut dyn Io, stored_offset: u64, upper_bound: u64) -> Result<u64> {
    if stored_offset + 4 <= upper_bound {
        io.seek(stored_offset)?;
        if io.read_ule32()? == ZIP64_EOCD_SIG {
            return Ok(stored_offset);
        }
    }
    let lo = upper_bound.saturating_sub(ZIP64_EOCD_SCAN_MAX);
    let len = (upper_bound - lo) as usize;
    if len < 4 {
        fail!(ErrorCode::Corrupt);
    }
    io.seek(lo)?;
    let mut buf = vec![0u8; len];
    io.read_exact_bytes(&mut buf)?;
    for i in (0..=len - 4).rev() {
        if LittleEndian::read_u32(&buf[i..]) == ZIP64_EOCD_SIG {
            return Ok(lo + i as u64);
        }
    }
    fail!(ErrorCode::Corrupt)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveState {
    UnresolvedFile,
    UnresolvedSymlink,
    Resolving,
    Resolved,
    Directory,
    BrokenFile,
    BrokenSymlink,
}

impl Default for ResolveState {
    fn default() -> Self {
        ResolveState::Directory
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ZipEntry {
    resolve: ResolveState,
    symlink_target: Option<usize>,
    /// Local-header offset until resolved; first payload byte after.
    offset: u64,
    method: u16,
    general_bits: u16,
    crc: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    mod_time: i64,
    dos_time: u32,
}

struct State {
    io: Box<dyn Io>,
    tree: DirTree<ZipEntry>,
    has_crypto: bool,
}

pub struct ZipArchive {
    state: Mutex<State>,
}

impl ZipArchive {
    fn open(mut io: Box<dyn Io>) -> Result<ZipArchive> {
        let bounds = parse_end_records(io.as_mut())?;
        let mut tree = DirTree::new();
        let mut has_crypto = false;

        io.seek(bounds.cd_offset + bounds.data_start)?;
        for _ in 0..bounds.entry_count {
            load_entry(io.as_mut(), bounds.data_start, &mut tree, &mut has_crypto)?;
        }
        trace!(
            "zip: {} entries{}{}",
            tree.len(),
            if bounds.zip64 { " (zip64)" } else { "" },
            if has_crypto { " (encrypted)" } else { "" },
        );
        Ok(ZipArchive {
            state: Mutex::new(State {
                io,
                tree,
                has_crypto,
            }),
        })
    }

    fn open_entry(&self, path: &str, explicit_password: Option<&str>) -> Result<Box<dyn Io>> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let mut password = explicit_password.map(str::to_owned);
        let idx = match state.tree.find(path) {
            Some(idx) => idx,
            None => {
                // "name$password" convenience lookup, only worth trying
                // when the archive actually has encrypted entries
                if state.has_crypto && explicit_password.is_none() {
                    match path.rsplit_once('$') {
                        Some((real, pw)) => match state.tree.find(real) {
                            Some(idx) => {
                                password = Some(pw.to_owned());
                                idx
                            }
                            None => fail!(ErrorCode::NotFound),
                        },
                        None => fail!(ErrorCode::NotFound),
                    }
                } else {
                    fail!(ErrorCode::NotFound)
                }
            }
        };

        resolve(state, idx)?;
        let mut idx = idx;
        let mut hops = 0;
        while let Some(target) = state.tree.entry(idx).payload.symlink_target {
            idx = target;
            hops += 1;
            if hops > state.tree.len() {
                fail!(ErrorCode::SymlinkLoop);
            }
        }

        let entry = state.tree.entry(idx);
        if entry.is_dir() {
            fail!(ErrorCode::NotAFile);
        }
        let meta = entry.payload;
        if meta.method != METHOD_STORED && meta.method != METHOD_DEFLATED {
            fail!(ErrorCode::Unsupported);
        }

        let mut io = state.io.duplicate()?;
        io.seek(meta.offset)?;

        let crypto = if meta.general_bits & FLAG_ENCRYPTED != 0 {
            if meta.compressed_size < CRYPTO_HEADER_LEN {
                fail!(ErrorCode::Corrupt);
            }
            let Some(password) = password.as_deref() else {
                fail!(ErrorCode::BadPassword);
            };
            let mut keys = CryptoKeys::new(password.as_bytes());
            let mut header = [0u8; CRYPTO_HEADER_LEN as usize];
            io.read_exact_bytes(&mut header)?;
            keys.decrypt_in_place(&mut header);
            let check = if meta.general_bits & FLAG_DATA_DESCRIPTOR != 0 {
                ((meta.dos_time >> 8) & 0xFF) as u8
            } else {
                (meta.crc >> 24) as u8
            };
            if header[11] != check {
                fail!(ErrorCode::BadPassword);
            }
            Some(keys)
        } else {
            None
        };

        Ok(Box::new(ZipEntryIo::new(io, &meta, crypto)))
    }
}

fn load_entry(
    io: &mut dyn Io,
    data_start: u64,
    tree: &mut DirTree<ZipEntry>,
    has_crypto: &mut bool,
) -> Result<()> {
    if io.read_ule32()? != CENTRAL_HEADER_SIG {
        fail!(ErrorCode::Corrupt);
    }
    let mut hdr = [0u8; 42];
    io.read_exact_bytes(&mut hdr)?;
    let version_made_by = LittleEndian::read_u16(&hdr[0..]);
    let general_bits = LittleEndian::read_u16(&hdr[4..]);
    let method = LittleEndian::read_u16(&hdr[6..]);
    let dos_time = LittleEndian::read_u32(&hdr[8..]);
    let crc = LittleEndian::read_u32(&hdr[12..]);
    let mut compressed_size = u64::from(LittleEndian::read_u32(&hdr[16..]));
    let mut uncompressed_size = u64::from(LittleEndian::read_u32(&hdr[20..]));
    let name_len = LittleEndian::read_u16(&hdr[24..]) as usize;
    let extra_len = LittleEndian::read_u16(&hdr[26..]) as usize;
    let comment_len = LittleEndian::read_u16(&hdr[28..]) as u64;
    let disk_start = LittleEndian::read_u16(&hdr[30..]);
    let external_attr = LittleEndian::read_u32(&hdr[34..]);
    let mut local_offset = u64::from(LittleEndian::read_u32(&hdr[38..]));

    if disk_start != 0 {
        fail!(ErrorCode::Unsupported);
    }

    let mut name_bytes = vec![0u8; name_len];
    io.read_exact_bytes(&mut name_bytes)?;
    let mut extra = vec![0u8; extra_len];
    io.read_exact_bytes(&mut extra)?;
    if comment_len > 0 {
        let pos = io.tell();
        io.seek(pos + comment_len)?;
    }

    // Zip64 extended information: present fields replace 0xFFFFFFFF
    // sentinels, in fixed order.
    let mut cursor = 0usize;
    while cursor + 4 <= extra.len() {
        let id = LittleEndian::read_u16(&extra[cursor..]);
        let size = LittleEndian::read_u16(&extra[cursor + 2..]) as usize;
        let mut field = cursor + 4;
        cursor = field + size;
        if cursor > extra.len() {
            break;
        }
        if id != EXTRA_ZIP64 {
            continue;
        }
        if uncompressed_size == 0xFFFF_FFFF && field + 8 <= cursor {
            uncompressed_size = LittleEndian::read_u64(&extra[field..]);
            field += 8;
        }
        if compressed_size == 0xFFFF_FFFF && field + 8 <= cursor {
            compressed_size = LittleEndian::read_u64(&extra[field..]);
            field += 8;
        }
        if local_offset == 0xFFFF_FFFF && field + 8 <= cursor {
            local_offset = LittleEndian::read_u64(&extra[field..]);
        }
    }

    let raw_name = String::from_utf8_lossy(&name_bytes);
    let is_dir = raw_name.ends_with('/');
    let name = match crate::path::sanitize(&raw_name) {
        Ok(name) if !name.is_empty() => name,
        _ => {
            debug!("zip: skipping unusable entry name {:?}", raw_name);
            return Ok(());
        }
    };

    *has_crypto |= general_bits & FLAG_ENCRYPTED != 0;

    let unix_host = (version_made_by >> 8) == 3;
    let is_symlink = unix_host
        && !is_dir
        && uncompressed_size > 0
        && (external_attr >> 16) & 0o170_000 == 0o120_000;

    let idx = tree.add(&name, is_dir)?;
    tree.entry_mut(idx).payload = ZipEntry {
        resolve: if is_dir {
            ResolveState::Directory
        } else if is_symlink {
            ResolveState::UnresolvedSymlink
        } else {
            ResolveState::UnresolvedFile
        },
        symlink_target: None,
        offset: local_offset + data_start,
        method,
        general_bits,
        crc,
        compressed_size,
        uncompressed_size,
        mod_time: dos_time_to_unix(dos_time),
        dos_time,
    };
    Ok(())
}

/// Parse the local file header and advance the entry's offset past it,
/// so it points at the first byte of (possibly encrypted, possibly
/// compressed) payload.
///
/// The local header's name/extra lengths are authoritative — they can
/// differ from the central directory's. Its CRC and sizes are
/// cross-checked, except that a zero (or a Zip64 sentinel) on either
/// side is tolerated: JAR writers leave them blank.
fn parse_local_header(state: &mut State, idx: usize) -> Result<()> {
    let meta = state.tree.entry(idx).payload;
    state.io.seek(meta.offset)?;
    if state.io.read_ule32()? != LOCAL_HEADER_SIG {
        fail!(ErrorCode::Corrupt);
    }
    let mut hdr = [0u8; 26];
    state.io.read_exact_bytes(&mut hdr)?;
    let method = LittleEndian::read_u16(&hdr[4..]);
    let crc = LittleEndian::read_u32(&hdr[10..]);
    let compressed_size = u64::from(LittleEndian::read_u32(&hdr[14..]));
    let uncompressed_size = u64::from(LittleEndian::read_u32(&hdr[18..]));
    let name_len = u64::from(LittleEndian::read_u16(&hdr[22..]));
    let extra_len = u64::from(LittleEndian::read_u16(&hdr[24..]));

    if method != meta.method {
        fail!(ErrorCode::Corrupt);
    }
    let lenient = |local: u64, central: u64| {
        local == central || local == 0 || central == 0 || local == 0xFFFF_FFFF
    };
    if !lenient(u64::from(crc), u64::from(meta.crc)) {
        fail!(ErrorCode::Corrupt);
    }
    if !lenient(compressed_size, meta.compressed_size)
        || !lenient(uncompressed_size, meta.uncompressed_size)
    {
        fail!(ErrorCode::Corrupt);
    }

    state.tree.entry_mut(idx).payload.offset = meta.offset + 30 + name_len + extra_len;
    Ok(())
}

fn resolve(state: &mut State, idx: usize) -> Result<()> {
    match state.tree.entry(idx).payload.resolve {
        ResolveState::Resolved | ResolveState::Directory => Ok(()),
        ResolveState::BrokenFile | ResolveState::BrokenSymlink => {
            fail!(ErrorCode::Corrupt)
        }
        ResolveState::Resolving => fail!(ErrorCode::SymlinkLoop),
        ResolveState::UnresolvedFile => match parse_local_header(state, idx) {
            Ok(()) => {
                state.tree.entry_mut(idx).payload.resolve = ResolveState::Resolved;
                Ok(())
            }
            Err(err) => {
                state.tree.entry_mut(idx).payload.resolve = ResolveState::BrokenFile;
                Err(err)
            }
        },
        ResolveState::UnresolvedSymlink => {
            state.tree.entry_mut(idx).payload.resolve = ResolveState::Resolving;
            match resolve_symlink(state, idx) {
                Ok(target) => {
                    let payload = &mut state.tree.entry_mut(idx).payload;
                    payload.symlink_target = Some(target);
                    payload.resolve = ResolveState::Resolved;
                    Ok(())
                }
                Err(err) => {
                    state.tree.entry_mut(idx).payload.resolve = ResolveState::BrokenSymlink;
                    Err(err)
                }
            }
        }
    }
}

/// Read the link target (it is stored like any other entry payload),
/// expand it lexically against the link's own directory, and resolve
/// whatever it lands on.
fn resolve_symlink(state: &mut State, idx: usize) -> Result<usize> {
    parse_local_header(state, idx)?;
    let meta = state.tree.entry(idx).payload;
    if meta.uncompressed_size > MAX_SYMLINK_LEN {
        fail!(ErrorCode::Corrupt);
    }
    if meta.general_bits & FLAG_ENCRYPTED != 0 {
        // no password is available during resolution
        fail!(ErrorCode::Unsupported);
    }

    state.io.seek(meta.offset)?;
    let target_bytes = match meta.method {
        METHOD_STORED => {
            let mut buf = vec![0u8; meta.uncompressed_size as usize];
            state.io.read_exact_bytes(&mut buf)?;
            buf
        }
        METHOD_DEFLATED => {
            let mut packed = vec![0u8; meta.compressed_size as usize];
            state.io.read_exact_bytes(&mut packed)?;
            let mut out = vec![0u8; meta.uncompressed_size as usize];
            let mut decomp = Decompress::new(false);
            decomp
                .decompress(&packed, &mut out, FlushDecompress::Finish)
                .map_err(|_| Error::new(ErrorCode::Corrupt))?;
            if decomp.total_out() != meta.uncompressed_size {
                fail!(ErrorCode::Corrupt);
            }
            out
        }
        _ => fail!(ErrorCode::Unsupported),
    };

    let link = String::from_utf8_lossy(&target_bytes);
    let entry_name = state.tree.entry(idx).name().to_owned();
    let Some(target_path) = expand_link(&entry_name, &link) else {
        fail!(ErrorCode::Corrupt);
    };
    let Some(target_idx) = state.tree.find(&target_path) else {
        fail!(ErrorCode::NotFound);
    };
    resolve(state, target_idx)?;
    Ok(target_idx)
}

/// Lexical expansion of a link target relative to the linking entry's
/// directory. `..` that would climb above the archive root makes the
/// link dead.
fn expand_link(entry_name: &str, link: &str) -> Option<String> {
    let mut stack: Vec<&str> = if link.starts_with('/') {
        Vec::new()
    } else {
        crate::path::dirname(entry_name)
            .split('/')
            .filter(|c| !c.is_empty())
            .collect()
    };
    for component in link.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    Some(stack.join("/"))
}

impl ArchiveDir for ZipArchive {
    fn open_read(&self, path: &str) -> Result<Box<dyn Io>> {
        self.open_entry(path, None)
    }

    fn open_write(&self, _path: &str) -> Result<Box<dyn Io>> {
        fail!(ErrorCode::ReadOnly)
    }

    fn open_append(&self, _path: &str) -> Result<Box<dyn Io>> {
        fail!(ErrorCode::ReadOnly)
    }

    fn remove(&self, _path: &str) -> Result<()> {
        fail!(ErrorCode::ReadOnly)
    }

    fn mkdir(&self, _path: &str) -> Result<()> {
        fail!(ErrorCode::ReadOnly)
    }

    fn stat(&self, path: &str) -> Result<Stat> {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.tree.find(path) else {
            fail!(ErrorCode::NotFound);
        };
        let entry = state.tree.entry(idx);
        let meta = entry.payload;
        if entry.is_dir() {
            let mut st = Stat::virtual_dir();
            if meta.mod_time != 0 {
                st.modtime = meta.mod_time;
                st.createtime = meta.mod_time;
            }
            return Ok(st);
        }
        let filetype = match meta.resolve {
            ResolveState::UnresolvedSymlink | ResolveState::BrokenSymlink => FileType::Symlink,
            _ if meta.symlink_target.is_some() => FileType::Symlink,
            _ => FileType::Regular,
        };
        Ok(Stat {
            filesize: meta.uncompressed_size as i64,
            modtime: meta.mod_time,
            createtime: meta.mod_time,
            accesstime: -1,
            filetype,
            readonly: true,
        })
    }

    fn enumerate(&self, dir: &str, cb: &mut EnumerateCallback<'_>) -> Result<()> {
        let state = self.state.lock().unwrap();
        let mut failed = false;
        let found = state.tree.enumerate(dir, |name| match cb(name) {
            EnumerateResult::Ok => true,
            EnumerateResult::Stop => false,
            EnumerateResult::Error => {
                failed = true;
                false
            }
        });
        if failed {
            return Err(Error::from_callback());
        }
        if !found {
            fail!(ErrorCode::NotFound);
        }
        Ok(())
    }
}

// Traditional PKWARE stream cipher: three 32-bit keys, two fed through a
// CRC-32 step, one through a multiply-accumulate.

const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
};

fn crc32_byte(crc: u32, b: u8) -> u32 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ u32::from(b)) & 0xFF) as usize]
}

#[derive(Debug, Clone, Copy)]
struct CryptoKeys {
    k: [u32; 3],
}

impl CryptoKeys {
    fn new(password: &[u8]) -> Self {
        let mut keys = CryptoKeys {
            k: [0x1234_5678, 0x2345_6789, 0x3456_7890],
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, plain: u8) {
        self.k[0] = crc32_byte(self.k[0], plain);
        self.k[1] = self.k[1]
            .wrapping_add(self.k[0] & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k[2] = crc32_byte(self.k[2], (self.k[1] >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let t = (self.k[2] | 2) & 0xFFFF;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }

    fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.decrypt_byte(*b);
        }
    }

    #[cfg(test)]
    fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }
}

struct Inflater {
    decomp: Decompress,
    buf: Vec<u8>,
    fill: usize,
    used: usize,
}

/// One opened entry: reads and seeks in *uncompressed* byte positions,
/// whatever the entry's storage looks like on disk.
struct ZipEntryIo {
    io: Box<dyn Io>,
    /// First byte of payload (past local header and crypto header).
    data_offset: u64,
    compressed_len: u64,
    uncompressed_len: u64,
    method: u16,
    crc: u32,
    pos: u64,
    compressed_pos: u64,
    inflater: Option<Inflater>,
    crypto: Option<(CryptoKeys, CryptoKeys)>,
    /// Tracks entry CRC across a pristine sequential read; dropped on
    /// the first seek.
    hasher: Option<crc32fast::Hasher>,
}

impl ZipEntryIo {
    fn new(io: Box<dyn Io>, meta: &ZipEntry, crypto: Option<CryptoKeys>) -> Self {
        let crypto_skip = if crypto.is_some() {
            CRYPTO_HEADER_LEN
        } else {
            0
        };
        ZipEntryIo {
            data_offset: meta.offset + crypto_skip,
            compressed_len: meta.compressed_size - crypto_skip,
            uncompressed_len: meta.uncompressed_size,
            method: meta.method,
            crc: meta.crc,
            pos: 0,
            compressed_pos: 0,
            inflater: if meta.method == METHOD_DEFLATED {
                Some(Inflater {
                    decomp: Decompress::new(false),
                    buf: vec![0u8; INFLATE_BUF_LEN],
                    fill: 0,
                    used: 0,
                })
            } else {
                None
            },
            crypto: crypto.map(|keys| (keys, keys)),
            hasher: Some(crc32fast::Hasher::new()),
            io,
        }
    }

    fn inflate_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        while written < out.len() {
            let inf = self.inflater.as_mut().unwrap();
            if inf.used == inf.fill {
                let take = (self.compressed_len - self.compressed_pos)
                    .min(INFLATE_BUF_LEN as u64) as usize;
                if take > 0 {
                    let n = self.io.read(&mut inf.buf[..take])?;
                    if n == 0 {
                        fail!(ErrorCode::Corrupt);
                    }
                    if let Some((keys, _)) = &mut self.crypto {
                        keys.decrypt_in_place(&mut inf.buf[..n]);
                    }
                    self.compressed_pos += n as u64;
                    inf.fill = n;
                    inf.used = 0;
                }
            }
            let inf = self.inflater.as_mut().unwrap();
            let before_in = inf.decomp.total_in();
            let before_out = inf.decomp.total_out();
            let status = inf
                .decomp
                .decompress(
                    &inf.buf[inf.used..inf.fill],
                    &mut out[written..],
                    FlushDecompress::None,
                )
                .map_err(|_| Error::new(ErrorCode::Corrupt))?;
            let consumed = (inf.decomp.total_in() - before_in) as usize;
            let produced = (inf.decomp.total_out() - before_out) as usize;
            inf.used += consumed;
            written += produced;
            match status {
                Status::StreamEnd => break,
                _ if consumed == 0
                    && produced == 0
                    && inf.used == inf.fill
                    && self.compressed_pos == self.compressed_len =>
                {
                    fail!(ErrorCode::Corrupt);
                }
                _ => {}
            }
        }
        Ok(written)
    }

    /// Back to position zero: re-seek the source, reset the inflater,
    /// restore the post-header crypto keys.
    fn rewind(&mut self) -> Result<()> {
        self.io.seek(self.data_offset)?;
        self.pos = 0;
        self.compressed_pos = 0;
        if let Some(inf) = &mut self.inflater {
            inf.decomp.reset(false);
            inf.fill = 0;
            inf.used = 0;
        }
        if let Some((keys, initial)) = &mut self.crypto {
            *keys = *initial;
        }
        Ok(())
    }

    fn skip_forward(&mut self, target: u64) -> Result<()> {
        let mut scratch = [0u8; 512];
        while self.pos < target {
            let take = (target - self.pos).min(scratch.len() as u64) as usize;
            let n = self.read(&mut scratch[..take])?;
            if n == 0 {
                fail!(ErrorCode::PastEof);
            }
        }
        Ok(())
    }
}

impl Io for ZipEntryIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.uncompressed_len - self.pos;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = match self.method {
            METHOD_STORED => {
                let n = self.io.read(&mut buf[..want])?;
                if let Some((keys, _)) = &mut self.crypto {
                    keys.decrypt_in_place(&mut buf[..n]);
                }
                n
            }
            _ => self.inflate_into(&mut buf[..want])?,
        };
        if let Some(hasher) = &mut self.hasher {
            hasher.update(&buf[..n]);
        }
        self.pos += n as u64;
        if self.pos == self.uncompressed_len {
            if let Some(hasher) = self.hasher.take() {
                // zero CRC in the central directory means "not recorded"
                if self.crc != 0 && hasher.finalize() != self.crc {
                    fail!(ErrorCode::Corrupt);
                }
            }
        }
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.uncompressed_len {
            fail!(ErrorCode::PastEof);
        }
        if pos == self.pos {
            return Ok(());
        }
        self.hasher = None;
        if self.method == METHOD_STORED && self.crypto.is_none() {
            self.io.seek(self.data_offset + pos)?;
            self.pos = pos;
            return Ok(());
        }
        if pos < self.pos {
            self.rewind()?;
        }
        self.skip_forward(pos)
    }

    fn tell(&mut self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.uncompressed_len)
    }

    fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        let mut io = self.io.duplicate()?;
        io.seek(self.data_offset)?;
        let mut dup = ZipEntryIo {
            io,
            data_offset: self.data_offset,
            compressed_len: self.compressed_len,
            uncompressed_len: self.uncompressed_len,
            method: self.method,
            crc: self.crc,
            pos: 0,
            compressed_pos: 0,
            inflater: if self.method == METHOD_DEFLATED {
                Some(Inflater {
                    decomp: Decompress::new(false),
                    buf: vec![0u8; INFLATE_BUF_LEN],
                    fill: 0,
                    used: 0,
                })
            } else {
                None
            },
            crypto: self.crypto.map(|(_, initial)| (initial, initial)),
            hasher: Some(crc32fast::Hasher::new()),
        };
        dup.seek(self.pos)?;
        Ok(Box::new(dup))
    }
}
