//! End-to-end scenarios across the search path, archives, and handles.

use std::io::Write as _;

use physfs::{ErrorCode, EnumerateResult, FileType, PhysFs};

const LOCAL_SIG: u32 = 0x0403_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const STORED: u16 = 0;
const DEFLATED: u16 = 8;

/// Minimal ZIP writer for fixtures: stored/deflated files and Unix
/// symlink entries, no encryption, no Zip64.
#[derive(Default)]
struct ZipFixture {
    bytes: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

impl ZipFixture {
    fn push(&mut self, name: &str, payload: &[u8], method: u16, size: u32, crc: u32, attrs: (u16, u32)) {
        let (version_made_by, external) = attrs;
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(&LOCAL_SIG.to_le_bytes());
        self.bytes.extend_from_slice(&20u16.to_le_bytes());
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
        self.bytes.extend_from_slice(&method.to_le_bytes());
        self.bytes.extend_from_slice(&0x2821_0000u32.to_le_bytes());
        self.bytes.extend_from_slice(&crc.to_le_bytes());
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(payload);

        self.central.extend_from_slice(&CENTRAL_SIG.to_le_bytes());
        self.central
            .extend_from_slice(&version_made_by.to_le_bytes());
        self.central.extend_from_slice(&20u16.to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes());
        self.central.extend_from_slice(&method.to_le_bytes());
        self.central
            .extend_from_slice(&0x2821_0000u32.to_le_bytes());
        self.central.extend_from_slice(&crc.to_le_bytes());
        self.central
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.central.extend_from_slice(&size.to_le_bytes());
        self.central
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes());
        self.central.extend_from_slice(&0u16.to_le_bytes());
        self.central.extend_from_slice(&external.to_le_bytes());
        self.central.extend_from_slice(&offset.to_le_bytes());
        self.central.extend_from_slice(name.as_bytes());
        self.count += 1;
    }

    fn file(&mut self, name: &str, data: &[u8]) -> &mut Self {
        self.push(
            name,
            data,
            STORED,
            data.len() as u32,
            crc32fast::hash(data),
            (20, 0),
        );
        self
    }

    fn deflated(&mut self, name: &str, data: &[u8]) -> &mut Self {
        let mut enc =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        let packed = enc.finish().unwrap();
        self.push(
            name,
            &packed,
            DEFLATED,
            data.len() as u32,
            crc32fast::hash(data),
            (20, 0),
        );
        self
    }

    fn symlink(&mut self, name: &str, target: &str) -> &mut Self {
        self.push(
            name,
            target.as_bytes(),
            STORED,
            target.len() as u32,
            crc32fast::hash(target.as_bytes()),
            (3 << 8, 0o120_777 << 16),
        );
        self
    }

    fn finish(&mut self) -> Vec<u8> {
        let mut bytes = std::mem::take(&mut self.bytes);
        let cd_offset = bytes.len() as u32;
        let central = std::mem::take(&mut self.central);
        bytes.extend_from_slice(&EOCD_SIG.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&self.count.to_le_bytes());
        bytes.extend_from_slice(&self.count.to_le_bytes());
        bytes.extend_from_slice(&(central.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&cd_offset.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        let at = cd_offset as usize;
        bytes.splice(at..at, central);
        bytes
    }
}

fn read_all(file: &mut physfs::File) -> Vec<u8> {
    let mut out = Vec::new();
    std::io::Read::read_to_end(file, &mut out).unwrap();
    out
}

#[test]
fn zip_over_directory_shadowing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("common.txt"), b"from dir").unwrap();

    let zip = ZipFixture::default()
        .file("common.txt", b"from zip")
        .file("ziponly.txt", b"zip has this")
        .finish();

    let pfs = PhysFs::init(None).unwrap();
    pfs.mount(dir.path(), None, true).unwrap();
    pfs.mount_memory(zip, "fixture.zip", None, true).unwrap();

    let mut f = pfs.open_read("common.txt").unwrap();
    assert_eq!(read_all(&mut f), b"from dir");
    drop(f);

    // re-mount the zip in front and it shadows the directory
    pfs.unmount("fixture.zip").unwrap();
    let zip = ZipFixture::default()
        .file("common.txt", b"from zip")
        .finish();
    pfs.mount_memory(zip, "fixture.zip", None, false).unwrap();
    let mut f = pfs.open_read("common.txt").unwrap();
    assert_eq!(read_all(&mut f), b"from zip");
}

#[test]
fn zip_entries_read_through_the_full_stack() {
    let big: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 253) as u8).collect();
    let zip = ZipFixture::default()
        .file("hello.txt", b"Hello")
        .deflated("big.bin", &big)
        .finish();

    let pfs = PhysFs::init(None).unwrap();
    pfs.mount_memory(zip, "data.zip", None, true).unwrap();

    let mut f = pfs.open_read("hello.txt").unwrap();
    assert_eq!(f.length().unwrap(), 5);
    assert_eq!(read_all(&mut f), b"Hello");
    assert!(f.eof());
    drop(f);

    let mut f = pfs.open_read("big.bin").unwrap();
    assert_eq!(f.length().unwrap(), big.len() as u64);
    f.set_buffer(4096).unwrap();
    let bytes = read_all(&mut f);
    assert_eq!(crc32fast::hash(&bytes), crc32fast::hash(&big));
    drop(f);

    assert!(pfs.exists("big.bin"));
    assert_eq!(pfs.real_dir("big.bin").unwrap(), "data.zip");
    assert_eq!(pfs.stat("hello.txt").unwrap().filesize, 5);
}

#[test]
fn buffered_seeks_inside_an_archive_entry() {
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let zip = ZipFixture::default().deflated("d.bin", &data).finish();
    let pfs = PhysFs::init(None).unwrap();
    pfs.mount_memory(zip, "d.zip", None, true).unwrap();

    let mut f = pfs.open_read("d.bin").unwrap();
    f.set_buffer(256).unwrap();
    let mut chunk = vec![0u8; 100];
    f.read_bytes(&mut chunk).unwrap();
    assert_eq!(f.tell(), 100);
    f.seek(50).unwrap();
    let mut again = vec![0u8; 50];
    f.read_bytes(&mut again).unwrap();
    assert_eq!(f.tell(), 100);
    assert_eq!(again[..], data[50..100]);

    // jump far outside the buffer window, then read
    f.seek(3000).unwrap();
    let mut far = vec![0u8; 96];
    f.read_bytes(&mut far).unwrap();
    assert_eq!(far[..], data[3000..3096]);
}

#[test]
fn archive_symlinks_respect_the_global_switch() {
    let zip = ZipFixture::default()
        .file("target.txt", b"the bytes")
        .symlink("alias.txt", "target.txt")
        .finish();
    let pfs = PhysFs::init(None).unwrap();
    pfs.mount_memory(zip, "links.zip", None, true).unwrap();

    assert_eq!(
        pfs.open_read("alias.txt").unwrap_err().code(),
        ErrorCode::SymlinkForbidden
    );
    assert!(!pfs
        .enumerate_files("")
        .unwrap()
        .contains(&"alias.txt".to_owned()));

    pfs.permit_symbolic_links(true);
    assert!(pfs.symbolic_links_permitted());
    let mut f = pfs.open_read("alias.txt").unwrap();
    assert_eq!(read_all(&mut f), b"the bytes");
    assert_eq!(
        pfs.stat("alias.txt").unwrap().filetype,
        FileType::Symlink
    );
}

#[test]
fn symlink_cycles_fail_cleanly_many_times() {
    let zip = ZipFixture::default()
        .symlink("a", "b")
        .symlink("b", "a")
        .finish();
    let pfs = PhysFs::init(None).unwrap();
    pfs.permit_symbolic_links(true);
    pfs.mount_memory(zip, "loop.zip", None, true).unwrap();

    let first = pfs.open_read("a").unwrap_err();
    assert_eq!(first.code(), ErrorCode::SymlinkLoop);
    for _ in 0..1000 {
        assert!(pfs.open_read("a").is_err());
    }
}

#[test]
fn mount_unmount_mount_restores_the_tree() {
    let zip = ZipFixture::default()
        .file("one.txt", b"1")
        .file("sub/two.txt", b"2")
        .finish();
    let pfs = PhysFs::init(None).unwrap();
    pfs.mount_memory(zip.clone(), "z.zip", Some("pak"), true)
        .unwrap();
    let before_root = pfs.enumerate_files("").unwrap();
    let before_sub = pfs.enumerate_files("pak/sub").unwrap();

    pfs.unmount("z.zip").unwrap();
    assert!(pfs.enumerate_files("pak").unwrap().is_empty());
    pfs.mount_memory(zip, "z.zip", Some("pak"), true).unwrap();

    assert_eq!(pfs.enumerate_files("").unwrap(), before_root);
    assert_eq!(pfs.enumerate_files("pak/sub").unwrap(), before_sub);
    assert_eq!(pfs.mount_point("z.zip").unwrap(), "/pak/");
}

#[test]
fn mounted_handles_cannot_serve_parallel_readers() {
    let dir = tempfile::tempdir().unwrap();
    let zip = ZipFixture::default().file("inner.txt", b"inner").finish();
    std::fs::write(dir.path().join("nested.zip"), zip).unwrap();

    let pfs = PhysFs::init(None).unwrap();
    pfs.mount(dir.path(), None, true).unwrap();

    // mount an archive *through* an open virtual file: the directory
    // listing works, but entry reads need a duplicable source
    let handle = pfs.open_read("nested.zip").unwrap();
    pfs.mount_handle(handle, "nested.zip", Some("inner"), true)
        .unwrap();
    assert!(pfs.exists("inner/inner.txt"));
    assert_eq!(
        pfs.open_read("inner/inner.txt").unwrap_err().code(),
        ErrorCode::Unsupported
    );
}

#[test]
fn enumeration_stops_and_propagates_errors() {
    let zip = ZipFixture::default()
        .file("a", b"")
        .file("b", b"")
        .file("c", b"")
        .finish();
    let pfs = PhysFs::init(None).unwrap();
    pfs.mount_memory(zip, "z.zip", None, true).unwrap();

    let mut seen = 0;
    pfs.enumerate("", |_| {
        seen += 1;
        if seen == 2 {
            EnumerateResult::Stop
        } else {
            EnumerateResult::Ok
        }
    })
    .unwrap();
    assert_eq!(seen, 2);

    let err = pfs.enumerate("", |_| EnumerateResult::Error).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AppCallback);
}

#[test]
fn last_error_code_is_sticky_until_queried() {
    let pfs = PhysFs::init(None).unwrap();
    let _ = physfs::last_error_code();

    assert!(pfs.open_read("nowhere.txt").is_err());
    assert_eq!(physfs::last_error_code(), ErrorCode::NotFound);
    assert_eq!(physfs::last_error_code(), ErrorCode::Ok);
}

#[test]
fn global_facade_lifecycle() {
    // the global is process-wide, so this test owns the whole story
    assert!(!physfs::is_init());
    assert_eq!(
        physfs::deinit().unwrap_err().code(),
        ErrorCode::NotInitialized
    );
    physfs::init(None).unwrap();
    assert!(physfs::is_init());
    assert_eq!(
        physfs::init(None).unwrap_err().code(),
        ErrorCode::IsInitialized
    );
    physfs::with_global(|fs| assert!(fs.search_path().is_empty())).unwrap();
    physfs::deinit().unwrap();
    assert!(!physfs::is_init());
}

#[test]
fn minor_format_mounts_through_the_core() {
    // a GRP built by hand, mounted by extension through the registry
    let mut grp = Vec::new();
    grp.extend_from_slice(b"KenSilverman");
    grp.extend_from_slice(&1u32.to_le_bytes());
    let mut name = [0u8; 12];
    name[..8].copy_from_slice(b"TILES.AR");
    grp.extend_from_slice(&name);
    grp.extend_from_slice(&4u32.to_le_bytes());
    grp.extend_from_slice(b"arts");

    let pfs = PhysFs::init(None).unwrap();
    pfs.mount_memory(grp, "duke.grp", None, true).unwrap();
    let mut f = pfs.open_read("TILES.AR").unwrap();
    assert_eq!(read_all(&mut f), b"arts");
}
