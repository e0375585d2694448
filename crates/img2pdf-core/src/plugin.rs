//! Collaborator traits: image decoding and page-level document writing.

use crate::asset::ImageAsset;
use crate::error::Result;
use crate::layout::Rect;
use crate::options::{Color, PageFormat};

/// Progress reporter callback type.
pub type ProgressReporter = Box<dyn Fn(f64, &str) + Send + Sync>;

/// Intrinsic pixel size of a decoded image.
pub trait DecodedDimensions {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Turns a raw blob into something a [`DocumentWriter`] can place.
pub trait ImageDecoder: Send + Sync {
    type Image: DecodedDimensions;

    /// Human-readable name of this decoder.
    fn name(&self) -> &str;

    /// Decode one image. Called once per asset, strictly in order.
    fn decode(&self, asset: &ImageAsset) -> Result<Self::Image>;
}

/// Page-level drawing surface.
///
/// A fresh writer already holds one blank page; drawing calls always target
/// the last page.
pub trait DocumentWriter {
    type Image;

    /// Human-readable name of this writer.
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    /// Append a blank page and make it current.
    fn add_page(&mut self);

    /// Fill `rect` on the current page.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Place `image` into `rect` on the current page. The writer takes
    /// ownership and must release the decoded pixels before returning;
    /// anything it keeps for serialization should be a compressed form.
    fn draw_image(&mut self, image: Self::Image, rect: Rect) -> Result<()>;

    /// Drop the last page, if any.
    fn delete_last_page(&mut self);

    /// Serialize the document.
    fn finish(self) -> Result<Vec<u8>>;
}

/// Builds a fresh writer for each export.
pub trait WriterFactory: Send + Sync {
    type Writer: DocumentWriter;

    fn create(&self, page: PageFormat, title: &str) -> Self::Writer;
}

impl<F, W> WriterFactory for F
where
    F: Fn(PageFormat, &str) -> W + Send + Sync,
    W: DocumentWriter,
{
    type Writer = W;

    fn create(&self, page: PageFormat, title: &str) -> W {
        self(page, title)
    }
}
