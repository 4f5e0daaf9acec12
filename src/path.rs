//! Virtual path sanitization.
//!
//! This is the security kernel: every user-supplied path runs through
//! [`sanitize`] before any backend sees it, and that is the *only* thing
//! standing between a hostile path and the host filesystem. Virtual paths
//! are plain UTF-8 strings with `/` separators — they are never host
//! `Path`s, so none of `std::path`'s platform behavior applies.

use crate::error::{fail, ErrorCode, Result};

/// Canonicalize a virtual path, or refuse it.
///
/// Leading and repeated `/` collapse, a trailing `/` is trimmed, and the
/// result never contains `.` or `..` components, `:` or `\` characters, or
/// empty components. The canonical root is the empty string.
///
/// Anything that would need interpretation to resolve — parent references,
/// drive letters, alternate separators — is rejected with
/// [`ErrorCode::BadFilename`] rather than normalized away.
pub fn sanitize(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    for component in input.split('/') {
        if component.is_empty() {
            continue;
        }
        if component == "." || component == ".." {
            fail!(ErrorCode::BadFilename);
        }
        if component.contains(':') || component.contains('\\') {
            fail!(ErrorCode::BadFilename);
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(component);
    }
    Ok(out)
}

/// Join a mount's root subdir onto an already-sanitized path.
pub(crate) fn join_root(root: Option<&str>, path: &str) -> String {
    match root {
        None | Some("") => path.to_owned(),
        Some(r) if path.is_empty() => r.to_owned(),
        Some(r) => format!("{}/{}", r, path),
    }
}

/// The part of `path` that lies inside `mount_point`, if any.
///
/// Both arguments must already be sanitized. The mount point itself maps
/// to the empty string (the mount's root). A root mount point contains
/// everything.
pub(crate) fn strip_mount_point<'a>(mount_point: &str, path: &'a str) -> Option<&'a str> {
    if mount_point.is_empty() {
        return Some(path);
    }
    if path == mount_point {
        return Some("");
    }
    path.strip_prefix(mount_point)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// If `path` is a proper ancestor of `mount_point` (or the root), the next
/// mount-point component below it: the name of the directory that exists
/// *only because* something is mounted there.
pub(crate) fn mount_point_child<'a>(mount_point: &'a str, path: &str) -> Option<&'a str> {
    if mount_point.is_empty() {
        return None;
    }
    let below = if path.is_empty() {
        mount_point
    } else {
        mount_point
            .strip_prefix(path)
            .and_then(|rest| rest.strip_prefix('/'))?
    };
    Some(below.split('/').next().unwrap_or(below))
}

/// Final component of a sanitized path (the whole path if it has one
/// component; empty only for the root).
pub(crate) fn basename(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, base)) => base,
        None => path,
    }
}

/// Parent of a sanitized path; empty string for single components.
pub(crate) fn dirname(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}
