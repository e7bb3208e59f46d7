//! Zip bundles of selected files for download.

use anyhow::{Context, Result};
use placedoc_core::models::FileRef;
use placedoc_core::Area;
use placedoc_storage::{keys, Storage};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Sanitize filename for archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Entry name inside the bundle: `{roll_number}_{file_name}`, made unique
fn entry_name(file: &FileRef, index: usize, used: &mut HashSet<String>) -> String {
    let base = sanitize_archive_filename(
        &format!("{}_{}", file.identity.roll_number, file.file_name),
        &format!("unnamed_{}", index),
    );

    let mut name = base.clone();
    let mut n = 1;
    while !used.insert(name.clone()) {
        name = format!("{}_{}", n, base);
        n += 1;
    }
    name
}

/// Create a ZIP archive of `files` read from `area`
pub async fn bundle_zip(storage: Arc<dyn Storage>, area: Area, files: &[FileRef]) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let mut used = HashSet::new();

        for (index, file) in files.iter().enumerate() {
            let key = keys::file_key(file);
            let file_data = storage
                .get(area, &key)
                .await
                .with_context(|| format!("Failed to download file: {}", key))?;

            let safe_filename = entry_name(file, index, &mut used);

            zip.start_file(&safe_filename, options)
                .with_context(|| format!("Failed to add file to ZIP: {}", safe_filename))?;
            zip.write_all(&file_data)
                .with_context(|| format!("Failed to write file data to ZIP: {}", safe_filename))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    tracing::info!(area = %area, files = files.len(), size_bytes = buffer.len(), "Bundle created");

    Ok(buffer)
}
