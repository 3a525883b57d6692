//! Archive extraction
//!
//! Unpacks zip and tar firmware archives into a destination directory.
//! Entries whose paths would escape the destination are skipped.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use zip::ZipArchive;

/// Extract a zip archive into `destination`, returning the number of files written
pub fn extract_zip(archive_path: &Path, destination: &Path) -> io::Result<usize> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut extracted = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let outpath = match entry.enclosed_name() {
            Some(path) => destination.join(path),
            None => {
                tracing::warn!("Skipping unsafe zip entry '{}'", entry.name());
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        tracing::debug!("Extracting {}", outpath.display());
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;
        extracted += 1;
    }

    Ok(extracted)
}

/// Extract a tar archive into `destination`, returning the number of files written
pub fn extract_tar(archive_path: &Path, destination: &Path) -> io::Result<usize> {
    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(file);
    let mut extracted = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let is_file = entry.header().entry_type().is_file();
        // unpack_in refuses paths outside the destination and reports false
        if entry.unpack_in(destination)? {
            if is_file {
                extracted += 1;
            }
        } else {
            tracing::warn!("Skipping unsafe tar entry '{}'", entry.path()?.display());
        }
    }

    Ok(extracted)
}
