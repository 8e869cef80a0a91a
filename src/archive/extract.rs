//! Materializes archive entries under a root directory.

use crate::archive::{ArchiveEntry, EntryKind};
use crate::error::{Result, StorageError};
use std::cell::RefCell;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Validate that a relative archive name is safe and doesn't escape the root.
/// Returns the full path if valid.
fn validate_path(root: &Path, relative: &str) -> Result<PathBuf> {
    let trimmed = relative.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::InvalidPath(relative.to_string()));
    }

    let rel_path = Path::new(trimmed);
    if rel_path.is_absolute() {
        return Err(StorageError::InvalidPath(relative.to_string()));
    }

    for component in rel_path.components() {
        match component {
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                return Err(StorageError::InvalidPath(relative.to_string()));
            }
            _ => {}
        }
    }

    Ok(root.join(rel_path))
}

/// Routes each archive entry to its place under `root`.
///
/// Directories stay writable while their contents are extracted. Their
/// stored modes are applied by [`DiskExtractor::finish`].
pub struct DiskExtractor {
    root: PathBuf,
    pending_dirs: RefCell<Vec<(PathBuf, u32)>>,
}

impl DiskExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending_dirs: RefCell::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle one entry. Unknown entry types abort with an error.
    pub fn handle(&self, entry: &mut ArchiveEntry<'_>) -> Result<()> {
        match entry.kind {
            EntryKind::PaxHeader => Ok(()),
            EntryKind::Directory => self.make_dir(entry),
            EntryKind::Regular | EntryKind::CharDevice | EntryKind::BlockDevice | EntryKind::Fifo => {
                self.write_file(entry)
            }
            EntryKind::Symlink => self.make_symlink(entry),
            EntryKind::HardLink => self.make_hard_link(entry),
            EntryKind::Other(type_flag) => Err(StorageError::UnknownEntryType {
                path: entry.name.clone(),
                type_flag: type_flag as char,
            }),
        }
    }

    /// Apply the stored directory modes, deepest first, once every entry
    /// has been written.
    pub fn finish(&self) -> Result<()> {
        let mut dirs = self.pending_dirs.take();
        dirs.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode) in dirs {
            set_mode(&path, mode)?;
        }
        Ok(())
    }

    fn make_dir(&self, entry: &ArchiveEntry<'_>) -> Result<()> {
        let full_path = validate_path(&self.root, &entry.name)?;
        fs::create_dir_all(&full_path)?;
        set_mode(&full_path, entry.mode | 0o700)?;
        self.pending_dirs.borrow_mut().push((full_path, entry.mode));
        Ok(())
    }

    fn write_file(&self, entry: &mut ArchiveEntry<'_>) -> Result<()> {
        let full_path = validate_path(&self.root, &entry.name)?;
        ensure_parent(&full_path)?;

        // A previous link at this name must not redirect the write
        if is_symlink(&full_path) {
            fs::remove_file(&full_path)?;
        }

        let mut out: File = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)?;
        set_mode(&full_path, entry.mode)?;
        io::copy(&mut entry.contents, &mut out)?;
        out.sync_all()?;
        drop(out);

        let mtime = filetime::FileTime::from_unix_time(entry.mtime as i64, 0);
        filetime::set_file_mtime(&full_path, mtime)?;
        Ok(())
    }

    fn make_symlink(&self, entry: &ArchiveEntry<'_>) -> Result<()> {
        let full_path = validate_path(&self.root, &entry.name)?;
        let target = entry
            .link_target
            .as_ref()
            .ok_or_else(|| StorageError::InvalidPath(format!("{}: missing link target", entry.name)))?;
        ensure_parent(&full_path)?;

        // Replace whatever an earlier state left behind
        if fs::symlink_metadata(&full_path).is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(&full_path)?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &full_path)?;

        #[cfg(windows)]
        std::os::windows::fs::symlink_file(target, &full_path)?;

        Ok(())
    }

    fn make_hard_link(&self, entry: &ArchiveEntry<'_>) -> Result<()> {
        let full_path = validate_path(&self.root, &entry.name)?;
        let target = entry
            .link_target
            .as_ref()
            .ok_or_else(|| StorageError::InvalidPath(format!("{}: missing link target", entry.name)))?;
        let target_path = validate_path(&self.root, &target.to_string_lossy())?;
        ensure_parent(&full_path)?;

        if fs::symlink_metadata(&full_path).is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(&full_path)?;
        }

        fs::hard_link(&target_path, &full_path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "{}: making hard link to {}: {}",
                    full_path.display(),
                    target_path.display(),
                    e
                ),
            )
        })?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

// No POSIX permission bits to apply
#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
