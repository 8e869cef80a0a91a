//! Directory enumeration for archiving.
//!
//! Walks a directory without following symlinks and yields its children as
//! archive roots. Hard links are detected by inode so that only the first
//! name seen carries content.

use crate::archive::{ArchiveFile, FileKind};
use crate::error::{Result, StorageError};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path};
use std::time::UNIX_EPOCH;

/// Enumerate everything beneath `root`, excluding `root` itself.
///
/// Entries come back sorted by file name, parents before children, so a
/// hard link always follows the name it points at.
pub fn files_from_disk(root: &Path) -> Result<Vec<ArchiveFile>> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files = Vec::new();
    // (device, inode) -> first name in archive
    let mut seen_inodes: HashMap<(u64, u64), String> = HashMap::new();

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|_| StorageError::InvalidPath(path.display().to_string()))?;
        let name_in_archive = archive_name(relative)?;

        let metadata = fs::symlink_metadata(path)?;
        let file_type = metadata.file_type();

        let kind = if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_symlink() {
            FileKind::Symlink {
                target: fs::read_link(path)?,
            }
        } else if file_type.is_file() {
            match hard_link_target(&metadata, &name_in_archive, &mut seen_inodes) {
                Some(target) => FileKind::HardLink { target },
                None => FileKind::Regular,
            }
        } else {
            special_kind(path, &metadata)?
        };

        let size = if kind == FileKind::Regular {
            metadata.len()
        } else {
            0
        };

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_default();

        files.push(ArchiveFile {
            path: path.to_path_buf(),
            name_in_archive,
            mode: permission_bits(&metadata),
            kind,
            size,
            mtime,
        });
    }

    Ok(files)
}

fn walk_error(err: ignore::Error) -> StorageError {
    let message = err.to_string();
    err.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message))
        .into()
}

/// Relative path rendered with `/` separators.
fn archive_name(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    StorageError::InvalidPath(relative.to_string_lossy().into_owned())
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(StorageError::InvalidPath(
                    relative.to_string_lossy().into_owned(),
                ))
            }
        }
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn hard_link_target(
    metadata: &fs::Metadata,
    name: &str,
    seen_inodes: &mut HashMap<(u64, u64), String>,
) -> Option<String> {
    use std::os::unix::fs::MetadataExt;

    if metadata.nlink() <= 1 {
        return None;
    }
    let key = (metadata.dev(), metadata.ino());
    if let Some(existing) = seen_inodes.get(&key) {
        return Some(existing.clone());
    }
    seen_inodes.insert(key, name.to_string());
    None
}

#[cfg(not(unix))]
fn hard_link_target(
    _metadata: &fs::Metadata,
    _name: &str,
    _seen_inodes: &mut HashMap<(u64, u64), String>,
) -> Option<String> {
    None
}

#[cfg(unix)]
fn special_kind(path: &Path, metadata: &fs::Metadata) -> Result<FileKind> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let file_type = metadata.file_type();
    let rdev = metadata.rdev() as libc::dev_t;
    let (major, minor) = (libc::major(rdev) as u32, libc::minor(rdev) as u32);

    if file_type.is_char_device() {
        Ok(FileKind::CharDevice { major, minor })
    } else if file_type.is_block_device() {
        Ok(FileKind::BlockDevice { major, minor })
    } else if file_type.is_fifo() {
        Ok(FileKind::Fifo)
    } else {
        Err(StorageError::UnsupportedFileType(path.to_path_buf()))
    }
}

#[cfg(not(unix))]
fn special_kind(path: &Path, _metadata: &fs::Metadata) -> Result<FileKind> {
    Err(StorageError::UnsupportedFileType(path.to_path_buf()))
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}
