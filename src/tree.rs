//! The in-memory directory tree shared by archive backends.
//!
//! Archives that know their whole table of contents up front (which is all
//! of them except the host-directory backend) load it into a [`DirTree`]:
//! an arena of entries addressed by index, with a hash table over full
//! paths for lookup and sibling links for enumeration. Indices rather
//! than references keep entries mutable after the tree is built — symlink
//! resolution needs that.

use crate::error::{fail, ErrorCode, Result};
use crate::path;

const BUCKET_COUNT: usize = 64;

/// Index of the implicit root entry.
pub const ROOT: usize = 0;

/// djb2, xor variant. Stable across platforms, cheap, and good enough for
/// path strings.
fn hash_path(name: &str) -> u32 {
    let mut hash: u32 = 5381;
    for byte in name.bytes() {
        hash = (hash << 5).wrapping_add(hash) ^ u32::from(byte);
    }
    hash
}

#[derive(Debug)]
pub struct Entry<T> {
    name: String,
    isdir: bool,
    hash_next: Option<usize>,
    children: Option<usize>,
    sibling: Option<usize>,
    pub payload: T,
}

impl<T> Entry<T> {
    /// Full path of this entry within the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.isdir
    }
}

/// A hashed tree of archive entries.
///
/// The root is an implicit directory with an empty name; it always exists
/// and is never linked into the hash table.
#[derive(Debug)]
pub struct DirTree<T> {
    entries: Vec<Entry<T>>,
    buckets: [Option<usize>; BUCKET_COUNT],
}

impl<T: Default> DirTree<T> {
    pub fn new() -> Self {
        let root = Entry {
            name: String::new(),
            isdir: true,
            hash_next: None,
            children: None,
            sibling: None,
            payload: T::default(),
        };
        DirTree {
            entries: vec![root],
            buckets: [None; BUCKET_COUNT],
        }
    }

    /// Number of entries, excluding the implicit root.
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry(&self, idx: usize) -> &Entry<T> {
        &self.entries[idx]
    }

    pub fn entry_mut(&mut self, idx: usize) -> &mut Entry<T> {
        &mut self.entries[idx]
    }

    /// Add `name` to the tree, creating missing ancestors as directories.
    ///
    /// Adding an existing path returns the existing entry — archives with
    /// duplicate central-directory records resolve to one entry — unless
    /// the directory-ness disagrees, which means the archive is lying
    /// about its own structure: [`ErrorCode::Corrupt`].
    pub fn add(&mut self, name: &str, isdir: bool) -> Result<usize> {
        if name.is_empty() {
            if !isdir {
                fail!(ErrorCode::Corrupt);
            }
            return Ok(ROOT);
        }
        if let Some(idx) = self.lookup(name) {
            if self.entries[idx].isdir != isdir {
                fail!(ErrorCode::Corrupt);
            }
            return Ok(idx);
        }

        let parent = self.add(path::dirname(name), true)?;
        let idx = self.entries.len();
        let bucket = hash_path(name) as usize % BUCKET_COUNT;
        self.entries.push(Entry {
            name: name.to_owned(),
            isdir,
            hash_next: self.buckets[bucket],
            children: None,
            sibling: self.entries[parent].children,
            payload: T::default(),
        });
        self.buckets[bucket] = Some(idx);
        self.entries[parent].children = Some(idx);
        Ok(idx)
    }

    /// Hash lookup without reordering. The empty path is the root.
    fn lookup(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return Some(ROOT);
        }
        let bucket = hash_path(name) as usize % BUCKET_COUNT;
        let mut cursor = self.buckets[bucket];
        while let Some(idx) = cursor {
            if self.entries[idx].name == name {
                return Some(idx);
            }
            cursor = self.entries[idx].hash_next;
        }
        None
    }

    /// Find `name`, moving a hit to the head of its hash chain so repeated
    /// lookups of hot paths stay cheap.
    pub fn find(&mut self, name: &str) -> Option<usize> {
        let idx = self.lookup(name)?;
        if idx == ROOT {
            return Some(ROOT);
        }
        let bucket = hash_path(name) as usize % BUCKET_COUNT;
        if self.buckets[bucket] != Some(idx) {
            // unlink from wherever it is, relink at the head
            let mut cursor = self.buckets[bucket];
            while let Some(prev) = cursor {
                if self.entries[prev].hash_next == Some(idx) {
                    self.entries[prev].hash_next = self.entries[idx].hash_next;
                    break;
                }
                cursor = self.entries[prev].hash_next;
            }
            self.entries[idx].hash_next = self.buckets[bucket];
            self.buckets[bucket] = Some(idx);
        }
        Some(idx)
    }

    /// Call `cb` with the basename of each direct child of `dir`, in link
    /// order, until it returns `false` or the children run out. Reports
    /// whether `dir` actually exists as a directory.
    pub fn enumerate(&self, dir: &str, mut cb: impl FnMut(&str) -> bool) -> bool {
        let Some(idx) = self.lookup(dir) else {
            return false;
        };
        if !self.entries[idx].isdir {
            return false;
        }
        let mut cursor = self.entries[idx].children;
        while let Some(child) = cursor {
            if !cb(path::basename(&self.entries[child].name)) {
                break;
            }
            cursor = self.entries[child].sibling;
        }
        true
    }
}

impl<T: Default> Default for DirTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_creates_ancestors() {
        let mut t: DirTree<u32> = DirTree::new();
        let idx = t.add("a/b/c.txt", false).unwrap();
        assert_eq!(t.entry(idx).name(), "a/b/c.txt");
        assert!(!t.entry(idx).is_dir());

        let b = t.find("a/b").unwrap();
        assert!(t.entry(b).is_dir());
        let a = t.find("a").unwrap();
        assert!(t.entry(a).is_dir());
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn duplicate_add_returns_existing() {
        let mut t: DirTree<u32> = DirTree::new();
        let first = t.add("x/y", false).unwrap();
        let second = t.add("x/y", false).unwrap();
        assert_eq!(first, second);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn conflicting_kind_is_corrupt() {
        let mut t: DirTree<u32> = DirTree::new();
        t.add("thing", false).unwrap();
        let err = t.add("thing", true).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Corrupt);
        // an ancestor created as a dir can't come back as a file
        t.add("d/leaf", false).unwrap();
        assert!(t.add("d", false).is_err());
    }

    #[test]
    fn find_empty_path_is_root() {
        let mut t: DirTree<u32> = DirTree::new();
        assert_eq!(t.find(""), Some(ROOT));
        assert!(t.entry(ROOT).is_dir());
    }

    #[test]
    fn find_moves_to_front_and_stays_correct() {
        let mut t: DirTree<u32> = DirTree::new();
        for name in ["one", "two", "three", "four", "five"] {
            t.add(name, false).unwrap();
        }
        // repeated finds in every order keep resolving correctly
        for _ in 0..3 {
            for name in ["five", "one", "three", "two", "four"] {
                let idx = t.find(name).unwrap();
                assert_eq!(t.entry(idx).name(), name);
            }
        }
        assert!(t.find("six").is_none());
    }

    #[test]
    fn enumerate_lists_direct_children_only() {
        let mut t: DirTree<u32> = DirTree::new();
        t.add("dir/a", false).unwrap();
        t.add("dir/b", false).unwrap();
        t.add("dir/sub/deep", false).unwrap();
        t.add("top", false).unwrap();

        let mut seen = Vec::new();
        assert!(t.enumerate("dir", |name| {
            seen.push(name.to_owned());
            true
        }));
        seen.sort();
        assert_eq!(seen, ["a", "b", "sub"]);

        let mut root_seen = Vec::new();
        assert!(t.enumerate("", |name| {
            root_seen.push(name.to_owned());
            true
        }));
        root_seen.sort();
        assert_eq!(root_seen, ["dir", "top"]);

        assert!(!t.enumerate("missing", |_| true));
        assert!(!t.enumerate("top", |_| true));
    }

    #[test]
    fn enumerate_stops_when_asked() {
        let mut t: DirTree<u32> = DirTree::new();
        t.add("d/1", false).unwrap();
        t.add("d/2", false).unwrap();
        t.add("d/3", false).unwrap();
        let mut count = 0;
        t.enumerate("d", |_| {
            count += 1;
            false
        });
        assert_eq!(count, 1);
    }
}
