//! Zstd-compressed tar codec.

use crate::archive::{path_selected, ArchiveEntry, ArchiveFile, Archiver, EntryHandler, EntryKind, FileKind};
use crate::error::{Result, StorageError};
use std::fs::File;
use std::io::{self, Read, Write};
use tar::{Builder, EntryType, Header};

/// Default compression level (fast, good ratio)
pub const DEFAULT_LEVEL: i32 = 3;

/// `tar` stream wrapped in zstd.
#[derive(Debug, Clone, Copy)]
pub struct TarZstd {
    level: i32,
}

impl TarZstd {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for TarZstd {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl Archiver for TarZstd {
    fn archive(&self, output: &mut dyn Write, files: &[ArchiveFile]) -> Result<()> {
        let encoder = zstd::stream::write::Encoder::new(output, self.level)?;
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);

        for file in files {
            append_file(&mut builder, file)?;
        }

        let encoder = builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    }

    fn extract(
        &self,
        input: &mut dyn Read,
        paths: Option<&[String]>,
        handler: &mut EntryHandler<'_>,
    ) -> Result<()> {
        let decoder = zstd::stream::read::Decoder::new(input)?;
        let mut archive = tar::Archive::new(decoder);

        for entry in archive.entries()? {
            let mut entry = entry?;

            let name = String::from_utf8(entry.path_bytes().into_owned())
                .map_err(|e| StorageError::InvalidPath(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
            if !path_selected(&name, paths) {
                continue;
            }

            let header = entry.header();
            let kind = entry_kind(header.entry_type());
            let mode = header.mode()?;
            let mtime = header.mtime()?;
            let link_target = entry.link_name()?.map(|target| target.into_owned());

            let mut archive_entry = ArchiveEntry {
                name,
                kind,
                mode,
                mtime,
                link_target,
                contents: &mut entry,
            };
            handler(&mut archive_entry)?;
        }

        Ok(())
    }
}

fn append_file<W: Write>(builder: &mut Builder<W>, file: &ArchiveFile) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_mode(file.mode);
    header.set_mtime(file.mtime);
    header.set_size(0);

    let name = file.name_in_archive.as_str();
    match &file.kind {
        FileKind::Directory => {
            header.set_entry_type(EntryType::Directory);
            builder.append_data(&mut header, name, io::empty())?;
        }
        FileKind::Regular => {
            let mut source = File::open(&file.path)?;
            let len = source.metadata()?.len();
            header.set_entry_type(EntryType::Regular);
            header.set_size(len);
            builder.append_data(&mut header, name, (&mut source).take(len))?;
        }
        FileKind::Symlink { target } => {
            header.set_entry_type(EntryType::Symlink);
            builder.append_link(&mut header, name, target)?;
        }
        FileKind::HardLink { target } => {
            header.set_entry_type(EntryType::Link);
            builder.append_link(&mut header, name, target)?;
        }
        FileKind::CharDevice { major, minor } => {
            header.set_entry_type(EntryType::Char);
            header.set_device_major(*major)?;
            header.set_device_minor(*minor)?;
            builder.append_data(&mut header, name, io::empty())?;
        }
        FileKind::BlockDevice { major, minor } => {
            header.set_entry_type(EntryType::Block);
            header.set_device_major(*major)?;
            header.set_device_minor(*minor)?;
            builder.append_data(&mut header, name, io::empty())?;
        }
        FileKind::Fifo => {
            header.set_entry_type(EntryType::Fifo);
            builder.append_data(&mut header, name, io::empty())?;
        }
    }
    Ok(())
}

fn entry_kind(entry_type: EntryType) -> EntryKind {
    match entry_type {
        EntryType::Regular | EntryType::Continuous => EntryKind::Regular,
        EntryType::Directory => EntryKind::Directory,
        EntryType::Char => EntryKind::CharDevice,
        EntryType::Block => EntryKind::BlockDevice,
        EntryType::Fifo => EntryKind::Fifo,
        EntryType::Symlink => EntryKind::Symlink,
        EntryType::Link => EntryKind::HardLink,
        EntryType::XGlobalHeader | EntryType::XHeader => EntryKind::PaxHeader,
        other => EntryKind::Other(other.as_byte()),
    }
}
