//! Archive codec.
//!
//! Packs a directory's children into one streamed archive and materializes
//! such a stream back onto disk. No network or versioning knowledge lives here.
//!
//! # Layout
//!
//! ```text
//! files_from_disk(dir) --> [ArchiveFile] --> Archiver::archive --> Write
//! Read --> Archiver::extract --> ArchiveEntry --> DiskExtractor (dir)
//! ```

pub mod extract;
pub mod scan;
pub mod tarball;

pub use extract::DiskExtractor;
pub use scan::files_from_disk;
pub use tarball::TarZstd;

use crate::error::Result;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Kind of a filesystem node selected for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    Regular,
    Symlink { target: PathBuf },
    /// Another name for an inode already archived under `target`.
    HardLink { target: String },
    CharDevice { major: u32, minor: u32 },
    BlockDevice { major: u32, minor: u32 },
    Fifo,
}

/// One filesystem entry to be archived.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    /// Location on disk
    pub path: PathBuf,
    /// Relative, `/`-separated name inside the archive
    pub name_in_archive: String,
    pub kind: FileKind,
    /// Permission bits
    pub mode: u32,
    /// Content length (regular files only)
    pub size: u64,
    /// Modification time (Unix seconds)
    pub mtime: u64,
}

/// Entry type as read back out of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    CharDevice,
    BlockDevice,
    Fifo,
    Symlink,
    HardLink,
    /// Global or per-entry pax header; carries no user data
    PaxHeader,
    Other(u8),
}

/// An entry streamed out of an archive, handed to the extraction handler.
pub struct ArchiveEntry<'a> {
    pub name: String,
    pub kind: EntryKind,
    pub mode: u32,
    pub mtime: u64,
    pub link_target: Option<PathBuf>,
    pub contents: &'a mut dyn Read,
}

/// Per-entry callback used by [`Archiver::extract`].
pub type EntryHandler<'h> = dyn FnMut(&mut ArchiveEntry<'_>) -> Result<()> + 'h;

/// Streaming archive format.
pub trait Archiver: Send + Sync {
    /// Write `files` as a single archive to `output`, in order.
    fn archive(&self, output: &mut dyn Write, files: &[ArchiveFile]) -> Result<()>;

    /// Stream entries out of `input`, handing each to `handler` in archive order.
    /// With `paths`, only entries equal to or beneath one of them are handed over.
    fn extract(
        &self,
        input: &mut dyn Read,
        paths: Option<&[String]>,
        handler: &mut EntryHandler<'_>,
    ) -> Result<()>;
}

/// Whether `name` is one of `paths` or nested beneath one.
pub(crate) fn path_selected(name: &str, paths: Option<&[String]>) -> bool {
    let Some(paths) = paths else {
        return true;
    };
    let name = name.trim_end_matches('/');
    paths.iter().any(|p| {
        let p = p.trim_end_matches('/');
        name == p
            || name
                .strip_prefix(p)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
