//! Loading image files from disk into an [`ImageSet`].

use std::io;
use std::path::{Path, PathBuf};

use img2pdf_core::{ImageAsset, ImageSet};

use crate::mime::{is_image_path, sniff_image_mime};

/// Read one file into an asset named after its file name.
pub fn load_asset(path: &Path) -> io::Result<ImageAsset> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());

    match sniff_image_mime(&bytes) {
        Some(mime) => log::debug!("{}: {} ({} bytes)", name, mime, bytes.len()),
        None => log::warn!("{}: unrecognized image signature", name),
    }

    Ok(ImageAsset::new(name, bytes))
}

/// Expand inputs into an ordered list of image files.
///
/// Files are kept as given, in order. A directory contributes its image
/// files (by extension), sorted by name; it is not searched recursively.
pub fn collect_image_paths(inputs: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image_path(p))
                .collect();
            entries.sort();
            log::info!(
                "{}: {} image files",
                input.display(),
                entries.len()
            );
            paths.extend(entries);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

/// Load every input, preserving order.
pub fn load_image_set(inputs: &[PathBuf]) -> io::Result<ImageSet> {
    let mut set = ImageSet::new();
    for path in collect_image_paths(inputs)? {
        set.push(load_asset(&path)?);
    }
    Ok(set)
}
