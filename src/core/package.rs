//! Firmware package decomposition
//!
//! Turns a firmware file into a [`FlashPackage`]: a set of partition role to
//! image path bindings. Archives are extracted into a temporary directory
//! next to the archive; the directory lives exactly as long as the package.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::partition::{classify, PartitionRole};
use crate::error::DecomposeError;
use crate::infra::archive;

/// Firmware container format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageFormat {
    /// Zip archive with `*.img` files at the top level
    Zip,
    /// Single raw image, flashed as system
    RawImage,
    /// Samsung-style tar, extracted for the vendor tool
    VendorTar,
}

impl PackageFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self, DecomposeError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "zip" => Ok(Self::Zip),
            "img" => Ok(Self::RawImage),
            "tar" => Ok(Self::VendorTar),
            _ => Err(DecomposeError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Decomposed firmware package owned by one flash run
#[derive(Debug)]
pub struct FlashPackage {
    format: PackageFormat,
    images: BTreeMap<PartitionRole, PathBuf>,
    workdir: Option<TempDir>,
}

impl FlashPackage {
    /// Detected format
    pub fn format(&self) -> PackageFormat {
        self.format
    }

    /// Image bound to `role`
    pub fn image(&self, role: PartitionRole) -> Option<&Path> {
        self.images.get(&role).map(PathBuf::as_path)
    }

    /// Bound roles in canonical order
    pub fn roles(&self) -> impl Iterator<Item = PartitionRole> + '_ {
        self.images.keys().copied()
    }

    /// Extraction directory, for formats that were unpacked
    pub fn extracted_dir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(TempDir::path)
    }
}

/// Decompose a firmware file into partition images
pub fn decompose(path: &Path) -> Result<FlashPackage, DecomposeError> {
    if !path.is_file() {
        return Err(DecomposeError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let format = PackageFormat::from_path(path)?;
    tracing::info!("Preparing flash package from {}", path.display());

    match format {
        PackageFormat::RawImage => {
            let mut images = BTreeMap::new();
            images.insert(PartitionRole::System, path.to_path_buf());
            Ok(FlashPackage {
                format,
                images,
                workdir: None,
            })
        }
        PackageFormat::Zip => {
            let workdir = create_workdir(path)?;
            let count = archive::extract_zip(path, workdir.path())
                .map_err(|e| extraction_failed(path, &e))?;
            tracing::debug!("Extracted {count} file(s) to {}", workdir.path().display());

            let images = scan_images(workdir.path()).map_err(|e| extraction_failed(path, &e))?;
            for (role, image) in &images {
                tracing::info!("Found {role} image: {}", image.display());
            }
            Ok(FlashPackage {
                format,
                images,
                workdir: Some(workdir),
            })
        }
        PackageFormat::VendorTar => {
            let workdir = create_workdir(path)?;
            let count = archive::extract_tar(path, workdir.path())
                .map_err(|e| extraction_failed(path, &e))?;
            tracing::debug!("Extracted {count} file(s) to {}", workdir.path().display());
            Ok(FlashPackage {
                format,
                images: BTreeMap::new(),
                workdir: Some(workdir),
            })
        }
    }
}

/// Fresh `<stem>_extracted*` directory next to the archive
fn create_workdir(archive: &Path) -> Result<TempDir, DecomposeError> {
    let parent = archive
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = archive
        .file_stem()
        .map_or_else(|| "firmware".into(), |s| s.to_string_lossy());

    tempfile::Builder::new()
        .prefix(&format!("{stem}_extracted"))
        .tempdir_in(parent)
        .map_err(|e| extraction_failed(archive, &e))
}

/// Bind top-level image files to roles
///
/// Entries are visited in name order so that the result does not depend on
/// directory iteration order when two files map to the same role
/// (`boot.img` and `BOOT.img`); the first name wins.
fn scan_images(dir: &Path) -> std::io::Result<BTreeMap<PartitionRole, PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    files.sort();

    let mut images = BTreeMap::new();
    for file in files {
        let Some(name) = file.file_name().map(Path::new) else {
            continue;
        };
        match classify(name) {
            Some(role) => {
                images.entry(role).or_insert(file);
            }
            None => tracing::debug!("Ignoring {}", file.display()),
        }
    }
    Ok(images)
}

fn extraction_failed(path: &Path, error: &std::io::Error) -> DecomposeError {
    DecomposeError::ExtractionFailed {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}
