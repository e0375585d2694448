//! MIME type detection for image blobs.

use std::path::Path;

/// Detect MIME type from a file path's extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

/// Detect an image MIME type from the blob's magic bytes.
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data).ok().map(|f| f.to_mime_type())
}

/// Check if a MIME type represents a raster image.
pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/") && mime != "image/svg+xml"
}

/// Whether a path looks like a raster image by extension.
pub fn is_image_path(path: &Path) -> bool {
    is_image_mime(mime_from_path(path))
}
