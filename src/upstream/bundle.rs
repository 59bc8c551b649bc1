use std::io::{Cursor, Read};
use std::path::Path;

use tracing::{debug, info};
use zip::ZipArchive;
use zymirror_schema::{BUNDLE_DOCUMENT_NAME, BundleDocument};

use crate::error::MirrorError;

/// Finds `zywrap-data.json` anywhere inside the archive and parses it.
pub fn extract_bundle_document(archive: &[u8]) -> Result<BundleDocument, MirrorError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;

    let entry_name = zip
        .file_names()
        .find(|name| {
            Path::new(name)
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s == BUNDLE_DOCUMENT_NAME)
        })
        .map(str::to_string)
        .ok_or_else(|| {
            MirrorError::Bundle(format!("{BUNDLE_DOCUMENT_NAME} not found inside archive"))
        })?;

    let mut entry = zip.by_name(&entry_name)?;
    let mut contents = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry.read_to_end(&mut contents)?;
    debug!(entry = %entry_name, bytes = contents.len(), "bundle document extracted");

    parse_bundle_document(&contents)
}

pub fn parse_bundle_document(contents: &[u8]) -> Result<BundleDocument, MirrorError> {
    Ok(serde_json::from_slice(contents)?)
}

/// Reads a bundle from disk: a `.zip` archive or the bare JSON document.
pub fn load_bundle_file(path: &Path) -> Result<BundleDocument, MirrorError> {
    let bytes = std::fs::read(path)?;
    let is_zip = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

    info!(path = %path.display(), bytes = bytes.len(), is_zip, "loading bundle file");
    if is_zip {
        extract_bundle_document(&bytes)
    } else {
        parse_bundle_document(&bytes)
    }
}

/// Writes `<path>.part`, then renames it over `path`.
pub fn save_bundle_file(path: &Path, archive: &[u8]) -> Result<(), MirrorError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    std::fs::write(&partial, archive)?;
    std::fs::rename(&partial, path)?;
    Ok(())
}
