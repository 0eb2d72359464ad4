//! Zip packaging of source directories.

use anyhow::{bail, Context, Result};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Regular, non-hidden files below `root`, sorted by path.
fn walk_files(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter(|entry| {
            entry
                .as_ref()
                .map(|e| e.file_type().is_file())
                .unwrap_or(true)
        })
}

/// Zip every regular file below `root` into an in-memory archive.
///
/// Entry names are relative to `root` and use `/` as separator. Hidden files
/// and directories are skipped.
pub fn zip_directory(root: &Path) -> Result<Vec<u8>> {
    if !root.is_dir() {
        bail!("Directory '{}' does not exist", root.display());
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut count = 0;

    for entry in walk_files(root) {
        let entry = entry.with_context(|| format!("Failed to read {}", root.display()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .context("Walked outside the archive root")?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let contents = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        writer.write_all(&contents)?;
        count += 1;
    }

    let archive = writer.finish().context("Failed to finish archive")?.into_inner();
    debug!(files = count, bytes = archive.len(), "Packaged {}", root.display());
    Ok(archive)
}

/// Files below `root` with the given extension (without dot), sorted by path.
pub fn find_files_with_extension(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Directory '{}' does not exist", root.display());
    }

    let mut files = Vec::new();
    for entry in walk_files(root) {
        let entry = entry.with_context(|| format!("Failed to read {}", root.display()))?;
        if entry.path().extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
