//! Blocking decompression of a stored archive into a directory.
//!
//! ZIP, gzip-compressed tar and plain tar archives are recognised by their
//! leading bytes. Every entry path is checked with [`sandbox::resolve`]
//! against the destination before anything is written, and the total number
//! of bytes written is capped.

use crate::services::{
    error::{ArchiveError, ArchiveResult},
    sandbox,
};
use flate2::read::GzDecoder;
use std::{
    fs::{self, File},
    io::{self, Read, Seek},
    path::Path,
};
use tracing::debug;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    Tar,
}

/// Recognise an archive from its first bytes (up to one tar block).
pub fn detect_format(header: &[u8]) -> Option<ArchiveFormat> {
    match header {
        [0x50, 0x4B, 0x03, 0x04, ..] | [0x50, 0x4B, 0x05, 0x06, ..] => Some(ArchiveFormat::Zip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::TarGz),
        _ if header.len() >= 262 && header[257..262] == *b"ustar" => Some(ArchiveFormat::Tar),
        _ => None,
    }
}

/// Summary of one decompression run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnpackReport {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Decompress `archive_path` into `dest`, which is created if missing.
pub fn unpack(archive_path: &Path, dest: &Path, max_bytes: u64) -> ArchiveResult<UnpackReport> {
    let mut file = File::open(archive_path)?;
    let mut header = Vec::with_capacity(512);
    file.by_ref().take(512).read_to_end(&mut header)?;
    file.rewind()?;

    let format = detect_format(&header).ok_or(ArchiveError::UnsupportedFormat)?;
    fs::create_dir_all(dest)?;

    let mut writer = EntryWriter {
        dest,
        limit: max_bytes,
        remaining: max_bytes,
        report: UnpackReport::default(),
    };
    match format {
        ArchiveFormat::Zip => unpack_zip(file, &mut writer)?,
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(file), &mut writer)?,
        ArchiveFormat::Tar => unpack_tar(file, &mut writer)?,
    }
    Ok(writer.report)
}

fn unpack_zip(file: File, writer: &mut EntryWriter<'_>) -> ArchiveResult<()> {
    let mut archive = zip::ZipArchive::new(file)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();

        if entry
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            writer.skip(&name, "symbolic link");
        } else if entry.is_dir() {
            writer.directory(&name)?;
        } else {
            writer.file(&name, &mut entry)?;
        }
    }
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, writer: &mut EntryWriter<'_>) -> ArchiveResult<()> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(corrupted)?;
    for entry in entries {
        let mut entry = entry.map_err(corrupted)?;
        let name = {
            let path = entry.path().map_err(corrupted)?;
            path.to_str()
                .map(str::to_owned)
                .ok_or_else(|| path.to_string_lossy().into_owned())
        };
        let name = match name {
            Ok(name) => name,
            Err(lossy) => {
                writer.skip(&lossy, "name is not valid UTF-8");
                continue;
            }
        };
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            writer.directory(&name)?;
        } else if entry_type.is_file() {
            writer.file(&name, &mut entry)?;
        } else {
            writer.skip(&name, "non-regular entry");
        }
    }
    Ok(())
}

fn corrupted(err: io::Error) -> ArchiveError {
    ArchiveError::Corrupted(err.to_string())
}

struct EntryWriter<'a> {
    dest: &'a Path,
    limit: u64,
    remaining: u64,
    report: UnpackReport,
}

impl EntryWriter<'_> {
    fn directory(&mut self, name: &str) -> ArchiveResult<()> {
        // The archive's own root (`./`) has nothing to create.
        if sandbox::normalize(name)?.as_os_str().is_empty() {
            return Ok(());
        }
        let target = sandbox::resolve(self.dest, name)?;
        fs::create_dir_all(&target)?;
        self.report.directories += 1;
        Ok(())
    }

    fn file(&mut self, name: &str, reader: &mut impl Read) -> ArchiveResult<()> {
        let target = sandbox::resolve(self.dest, name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        let mut bounded = reader.take(self.remaining.saturating_add(1));
        let written = io::copy(&mut bounded, &mut out)?;
        if written > self.remaining {
            return Err(ArchiveError::SizeLimitExceeded { limit: self.limit });
        }

        self.remaining -= written;
        self.report.files += 1;
        self.report.bytes += written;
        Ok(())
    }

    fn skip(&mut self, name: &str, reason: &str) {
        debug!("skipping archive entry {name}: {reason}");
        self.report.skipped += 1;
    }
}
