//! Export engine — lays out an image set onto pages, one image per page.
//!
//! Images are handled strictly one at a time in input order:
//!   decode → layout → background fill → place image → provision next page.
//! The surplus page left after the last image is trimmed before the writer
//! serializes the document. Only one decoded image is alive at any moment.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};

use crate::asset::{ImageAsset, ImageSet};
use crate::error::{ConvertError, Result};
use crate::layout::{self, Placement};
use crate::options::{ExportOptions, PageFormat};
use crate::plugin::{
    DecodedDimensions, DocumentWriter, ImageDecoder, ProgressReporter, WriterFactory,
};

/// Where an export currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Exporting { index: usize },
    Finalizing,
    Done,
    Failed,
}

/// A finished document, ready to be saved.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Layout of each page, in page order.
    pub placements: Vec<Placement>,
}

impl ExportedDocument {
    /// Write the document into `dir` under its file name.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        self.write_to(&path)?;
        Ok(path)
    }

    /// Write the document to an explicit path.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        info!(
            "Saved {} ({} pages, {} bytes)",
            path.display(),
            self.page_count,
            self.bytes.len()
        );
        Ok(())
    }
}

/// The layout-and-export engine.
pub struct ExportEngine<D, F> {
    decoder: D,
    writer_factory: F,
    page: PageFormat,
    progress_reporter: Option<ProgressReporter>,
    state: Mutex<ExportState>,
}

impl<D, F> ExportEngine<D, F>
where
    D: ImageDecoder,
    F: WriterFactory,
    F::Writer: DocumentWriter<Image = D::Image>,
{
    pub fn new(decoder: D, writer_factory: F) -> Self {
        Self {
            decoder,
            writer_factory,
            page: PageFormat::A4,
            progress_reporter: None,
            state: Mutex::new(ExportState::Idle),
        }
    }

    /// Set a progress reporter callback.
    pub fn progress_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// State reached by the most recent export.
    pub fn last_state(&self) -> ExportState {
        self.state.lock().map(|s| *s).unwrap_or(ExportState::Failed)
    }

    /// Export `images` as one document with one page per image.
    ///
    /// Fails with [`ConvertError::EmptyInput`] before any page is created
    /// when `images` is empty. Any decode or serialization failure aborts
    /// the whole export; no partial document is returned.
    pub fn export(&self, images: &ImageSet, options: &ExportOptions) -> Result<ExportedDocument> {
        self.set_state(ExportState::Idle);

        if images.is_empty() {
            self.set_state(ExportState::Failed);
            return Err(ConvertError::EmptyInput);
        }

        match self.run(images, options) {
            Ok(doc) => {
                self.set_state(ExportState::Done);
                self.report_progress(1.0, "Export complete");
                Ok(doc)
            }
            Err(e) => {
                self.set_state(ExportState::Failed);
                Err(e)
            }
        }
    }

    fn run(&self, images: &ImageSet, options: &ExportOptions) -> Result<ExportedDocument> {
        let inset = options.margin.inset();
        let total = images.len();
        info!(
            "Exporting {} images to {} ({} margin, background {}) with {}",
            total,
            self.page.name,
            options.margin,
            options.background,
            self.decoder.name()
        );
        self.report_progress(0.0, "Starting export...");

        let mut writer = self
            .writer_factory
            .create(self.page, document_title(&options.file_name));
        let mut placements = Vec::with_capacity(total);

        for (index, asset) in images.iter().enumerate() {
            self.set_state(ExportState::Exporting { index });
            self.report_progress(
                index as f64 / total as f64,
                &format!("Processing {} ({}/{})", asset.name, index + 1, total),
            );

            let image = self
                .decoder
                .decode(asset)
                .map_err(|e| decode_error(index, asset, e))?;
            let (w, h) = (image.width(), image.height());

            let placement = layout::place_image(&self.page, inset, w as f32, h as f32);
            debug!(
                "{}: {}x{} → {:.2}x{:.2} at ({:.2}, {:.2})",
                asset.name,
                w,
                h,
                placement.image.width,
                placement.image.height,
                placement.image.x,
                placement.image.y
            );

            writer.fill_rect(placement.background, options.background);
            writer.draw_image(image, placement.image)?;
            writer.add_page();
            placements.push(placement);
        }

        self.set_state(ExportState::Finalizing);
        self.report_progress(0.95, &format!("Writing {}...", writer.name()));

        // One page is always provisioned ahead of the next image.
        writer.delete_last_page();
        let page_count = writer.page_count();
        let bytes = writer.finish()?;

        info!("Export produced {} pages ({} bytes)", page_count, bytes.len());

        Ok(ExportedDocument {
            file_name: options.file_name.clone(),
            bytes,
            page_count,
            placements,
        })
    }

    fn set_state(&self, next: ExportState) {
        if let Ok(mut state) = self.state.lock() {
            debug!("Export state: {:?} → {:?}", *state, next);
            *state = next;
        }
    }

    fn report_progress(&self, fraction: f64, message: &str) {
        if let Some(ref reporter) = self.progress_reporter {
            reporter(fraction, message);
        }
    }
}

/// Attach the failing asset's position and name to a decoder error.
fn decode_error(index: usize, asset: &ImageAsset, err: ConvertError) -> ConvertError {
    let reason = match err {
        ConvertError::Decode { reason, .. } => reason,
        other => other.to_string(),
    };
    ConvertError::Decode {
        index,
        name: asset.name.clone(),
        reason,
    }
}

fn document_title(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted")
}
