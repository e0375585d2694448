//! PDF backend — decodes image blobs and writes pages with printpdf 0.8.
//!
//! Layout arrives in layout units with a top-left origin. Pages are built as
//! printpdf `Op` lists, converted to points with a bottom-left origin.
//! Images are embedded as XObjects at 72 dpi so one pixel is one point
//! before scaling.
//!
//! The document only ever keeps compressed image streams: baseline JPEG
//! blobs pass through as `/DCTDecode`, everything else is flattened to 8-bit
//! gray or RGB and stored as `/FlateDecode`. Decoded pixels are dropped as
//! soon as the image is placed.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ColorType, DynamicImage, ImageFormat, RgbaImage};
use printpdf::{
    Color as PdfColor, DictItem, ExternalStream, ExternalXObject, LinePoint, Mm, Op, PaintMode,
    PdfDocument, PdfPage, PdfSaveOptions, Point, Polygon, PolygonRing, Pt, Px, Rgb,
    WindingOrder, XObjectTransform,
};

use img2pdf_core::asset::{ImageAsset, ImageSet};
use img2pdf_core::error::{ConvertError, Result};
use img2pdf_core::layout::Rect;
use img2pdf_core::options::{Color, ExportOptions, PageFormat};
use img2pdf_core::pipeline::{ExportEngine, ExportedDocument};
use img2pdf_core::plugin::{DecodedDimensions, DocumentWriter, ImageDecoder, ProgressReporter};

/// Resolution images are embedded at.
const IMAGE_DPI: f32 = 72.0;

/// Engine wired to the printpdf decoder and writer.
pub type PdfExportEngine = ExportEngine<PdfImageDecoder, fn(PageFormat, &str) -> PdfDocumentWriter>;

/// A decoded image held until it is embedded into the document.
pub struct PdfImage {
    width: u32,
    height: u32,
    data: ImageData,
}

enum ImageData {
    /// Original JPEG stream with its component count (1 or 3).
    Jpeg { bytes: Vec<u8>, components: u8 },
    Pixels(DynamicImage),
}

impl DecodedDimensions for PdfImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Decodes blobs with the `image` crate (JPEG, PNG, GIF, BMP, WebP, ...).
pub struct PdfImageDecoder;

impl ImageDecoder for PdfImageDecoder {
    type Image = PdfImage;

    fn name(&self) -> &str {
        "image decoder"
    }

    fn decode(&self, asset: &ImageAsset) -> Result<PdfImage> {
        let decode_error = |reason: String| ConvertError::Decode {
            index: 0,
            name: asset.name.clone(),
            reason,
        };

        let format = image::guess_format(&asset.bytes).map_err(|e| decode_error(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(&asset.bytes, format)
            .map_err(|e| decode_error(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());

        let passthrough = if format == ImageFormat::Jpeg {
            jpeg_components(&asset.bytes).filter(|c| *c == 1 || *c == 3)
        } else {
            None
        };

        let data = match passthrough {
            Some(components) => {
                drop(decoded);
                ImageData::Jpeg {
                    bytes: asset.bytes.clone(),
                    components,
                }
            }
            None => ImageData::Pixels(decoded),
        };

        log::debug!(
            "{}: {:?} {}x{}{}",
            asset.name,
            format,
            width,
            height,
            if passthrough.is_some() { " (passthrough)" } else { "" }
        );
        Ok(PdfImage {
            width,
            height,
            data,
        })
    }
}

/// Component count of a baseline/progressive 8-bit JPEG, read from its
/// first SOF segment.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        if marker == 0xFF {
            i += 1;
            continue;
        }
        let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let precision = *data.get(i + 4)?;
            return if precision == 8 {
                data.get(i + 9).copied()
            } else {
                None
            };
        }
        i += 2 + len;
    }
    None
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Composite RGBA pixels over an opaque matte color.
fn flatten_alpha(rgba: &RgbaImage, matte: Color) -> Vec<u8> {
    let bg = [matte.r as u16, matte.g as u16, matte.b as u16];
    let mut out = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
    for px in rgba.pixels() {
        let a = px[3] as u16;
        for c in 0..3 {
            out.push(((px[c] as u16 * a + bg[c] * (255 - a) + 127) / 255) as u8);
        }
    }
    out
}

/// Build the compressed image XObject for `image`, consuming its pixels.
fn image_xobject(image: PdfImage, matte: Color) -> Result<ExternalXObject> {
    let (color_space, filter, content) = match image.data {
        ImageData::Jpeg { bytes, components } => {
            let space = if components == 1 { "DeviceGray" } else { "DeviceRGB" };
            (space, "DCTDecode", bytes)
        }
        ImageData::Pixels(pixels) => {
            let gray = matches!(pixels.color(), ColorType::L8 | ColorType::L16);
            let (space, raw) = if gray {
                ("DeviceGray", pixels.to_luma8().into_raw())
            } else if pixels.color().has_alpha() {
                ("DeviceRGB", flatten_alpha(&pixels.to_rgba8(), matte))
            } else {
                ("DeviceRGB", pixels.to_rgb8().into_raw())
            };
            drop(pixels);
            (space, "FlateDecode", deflate(&raw)?)
        }
    };

    let name = |n: &str| DictItem::Name(n.as_bytes().to_vec());
    let mut dict = BTreeMap::new();
    dict.insert("Type".to_string(), name("XObject"));
    dict.insert("Subtype".to_string(), name("Image"));
    dict.insert("Width".to_string(), DictItem::Int(image.width as i64));
    dict.insert("Height".to_string(), DictItem::Int(image.height as i64));
    dict.insert("ColorSpace".to_string(), name(color_space));
    dict.insert("BitsPerComponent".to_string(), DictItem::Int(8));
    dict.insert("Filter".to_string(), name(filter));

    Ok(ExternalXObject {
        stream: ExternalStream {
            dict,
            content,
            compress: false,
        },
        width: Some(Px(image.width as usize)),
        height: Some(Px(image.height as usize)),
        dpi: Some(IMAGE_DPI),
    })
}

/// Accumulates per-page operations; the last page is the current one.
pub struct PdfDocumentWriter {
    doc: PdfDocument,
    page: PageFormat,
    pages: Vec<Vec<Op>>,
    /// Last fill on the current page; transparent pixels are flattened onto it.
    matte: Color,
}

impl PdfDocumentWriter {
    /// A document with one blank page.
    pub fn new(page: PageFormat, title: &str) -> Self {
        Self {
            doc: PdfDocument::new(title),
            page,
            pages: vec![Vec::new()],
            matte: Color::WHITE,
        }
    }

    fn current_ops(&mut self) -> &mut Vec<Op> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Layout x to points.
    fn pt_x(&self, x: f32) -> Pt {
        Pt(x * PageFormat::POINTS_PER_UNIT)
    }

    /// Layout y (top-left origin) of a box's bottom edge to points (bottom-left origin).
    fn pt_y(&self, y: f32, height: f32) -> Pt {
        Pt((self.page.height() - y - height) * PageFormat::POINTS_PER_UNIT)
    }
}

impl DocumentWriter for PdfDocumentWriter {
    type Image = PdfImage;

    fn name(&self) -> &str {
        "PDF"
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.matte = Color::WHITE;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let left = self.pt_x(rect.x);
        let right = self.pt_x(rect.x + rect.width);
        let bottom = self.pt_y(rect.y, rect.height);
        let top = self.pt_y(rect.y, 0.0);

        let corner = |x: Pt, y: Pt| LinePoint {
            p: Point { x, y },
            bezier: false,
        };
        let polygon = Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    corner(left, bottom),
                    corner(right, bottom),
                    corner(right, top),
                    corner(left, top),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        };

        self.matte = color;
        let (r, g, b) = color.to_unit_rgb();
        let ops = self.current_ops();
        ops.push(Op::SaveGraphicsState);
        ops.push(Op::SetFillColor {
            col: PdfColor::Rgb(Rgb::new(r, g, b, None)),
        });
        ops.push(Op::DrawPolygon { polygon });
        ops.push(Op::RestoreGraphicsState);
    }

    fn draw_image(&mut self, image: PdfImage, rect: Rect) -> Result<()> {
        let (px_w, px_h) = (image.width as f32, image.height as f32);
        if px_w == 0.0 || px_h == 0.0 {
            return Err(ConvertError::Other("Image has zero width or height".into()));
        }

        let xobject = image_xobject(image, self.matte)?;
        log::trace!(
            "embedding {} bytes on page {}",
            xobject.stream.content.len(),
            self.pages.len()
        );
        let image_id = self.doc.add_xobject(&xobject);

        let transform = XObjectTransform {
            translate_x: Some(self.pt_x(rect.x)),
            translate_y: Some(self.pt_y(rect.y, rect.height)),
            scale_x: Some(rect.width * PageFormat::POINTS_PER_UNIT / px_w),
            scale_y: Some(rect.height * PageFormat::POINTS_PER_UNIT / px_h),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        };
        self.current_ops().push(Op::UseXobject {
            id: image_id,
            transform,
        });
        Ok(())
    }

    fn delete_last_page(&mut self) {
        self.pages.pop();
    }

    fn finish(self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(ConvertError::Serialization(
                "document has no pages".to_string(),
            ));
        }

        let (w, h) = (Mm(self.page.width_mm()), Mm(self.page.height_mm()));
        let pages: Vec<PdfPage> = self
            .pages
            .into_iter()
            .map(|ops| PdfPage::new(w, h, ops))
            .collect();

        let mut doc = self.doc;
        let mut warnings = Vec::new();
        let bytes = doc
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            log::debug!("PDF serialization produced {} warnings", warnings.len());
        }
        if bytes.is_empty() {
            return Err(ConvertError::Serialization("empty output".to_string()));
        }
        Ok(bytes)
    }
}

/// Build an export engine backed by printpdf.
pub fn pdf_engine() -> PdfExportEngine {
    ExportEngine::new(
        PdfImageDecoder,
        PdfDocumentWriter::new as fn(PageFormat, &str) -> PdfDocumentWriter,
    )
}

/// Same as [`pdf_engine`], reporting progress through `reporter`.
pub fn pdf_engine_with_progress(reporter: ProgressReporter) -> PdfExportEngine {
    pdf_engine().progress_reporter(reporter)
}

/// Export `images` to PDF bytes in one call.
pub fn export_pdf(images: &ImageSet, options: &ExportOptions) -> Result<ExportedDocument> {
    log::info!("Writing PDF: {}", options.file_name);
    pdf_engine().export(images, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use img2pdf_core::options::MarginPreset;

    fn encode(img: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([200, 40, 40]));
        encode(image::DynamicImage::ImageRgb8(img), image::ImageFormat::Jpeg)
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 200, 10, 255]));
        encode(image::DynamicImage::ImageRgba8(img), image::ImageFormat::Png)
    }

    fn gray_jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = image::GrayImage::from_pixel(w, h, image::Luma([90]));
        encode(image::DynamicImage::ImageLuma8(img), image::ImageFormat::Jpeg)
    }

    /// Bytes of image data the document is holding on to.
    fn retained_image_bytes(writer: &PdfDocumentWriter) -> usize {
        writer
            .doc
            .resources
            .xobjects
            .map
            .values()
            .map(|x| match x {
                printpdf::XObject::External(ext) => ext.stream.content.len(),
                _ => panic!("document holds a non-stream image"),
            })
            .sum()
    }

    fn image_filter(writer: &PdfDocumentWriter) -> Vec<(String, String)> {
        let name = |item: Option<&DictItem>| match item {
            Some(DictItem::Name(n)) => String::from_utf8_lossy(n).into_owned(),
            other => panic!("expected a name, got {:?}", other),
        };
        writer
            .doc
            .resources
            .xobjects
            .map
            .values()
            .filter_map(|x| match x {
                printpdf::XObject::External(ext) => Some((
                    name(ext.stream.dict.get("Filter")),
                    name(ext.stream.dict.get("ColorSpace")),
                )),
                _ => None,
            })
            .collect()
    }

    fn page_operators(bytes: &[u8]) -> Vec<Vec<String>> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let content = doc.get_page_content(page_id).unwrap();
                lopdf::content::Content::decode(&content)
                    .unwrap()
                    .operations
                    .into_iter()
                    .map(|op| op.operator)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_decoder_dimensions() {
        let asset = ImageAsset::new("a.png", png(12, 7));
        let image = PdfImageDecoder.decode(&asset).unwrap();
        assert_eq!((image.width(), image.height()), (12, 7));
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        let asset = ImageAsset::new("junk.jpg", b"not an image".to_vec());
        let err = PdfImageDecoder.decode(&asset).err().unwrap();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }

    #[test]
    fn test_jpeg_components() {
        assert_eq!(jpeg_components(&jpeg(8, 8)), Some(3));
        assert_eq!(jpeg_components(&gray_jpeg(8, 8)), Some(1));
        assert_eq!(jpeg_components(&png(8, 8)), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF]), None);
    }

    #[test]
    fn test_jpeg_kept_compressed() {
        let blob = jpeg(1000, 1000);
        let asset = ImageAsset::new("big.jpg", blob.clone());
        let full = Rect::new(0.0, 0.0, 100.0, 100.0);

        let mut writer = PdfDocumentWriter::new(PageFormat::A4, "t");
        for _ in 0..5 {
            let image = PdfImageDecoder.decode(&asset).unwrap();
            writer.draw_image(image, full).unwrap();
            writer.add_page();
        }

        // Only the original JPEG streams are held, never 1000x1000x3 pixels.
        let retained = retained_image_bytes(&writer);
        assert_eq!(retained, 5 * blob.len());
        assert!(retained < 1000 * 1000 * 3);
        assert!(image_filter(&writer)
            .iter()
            .all(|(f, cs)| f == "DCTDecode" && cs == "DeviceRGB"));
    }

    #[test]
    fn test_pixels_deflated() {
        let (w, h) = (600, 400);
        let asset = ImageAsset::new("big.png", png(w, h));
        let mut writer = PdfDocumentWriter::new(PageFormat::A4, "t");
        for _ in 0..3 {
            let image = PdfImageDecoder.decode(&asset).unwrap();
            writer.draw_image(image, Rect::new(0.0, 0.0, 60.0, 40.0)).unwrap();
            writer.add_page();
        }

        let retained = retained_image_bytes(&writer);
        assert!(retained > 0);
        assert!(retained < (w * h * 3) as usize, "retained {} bytes", retained);
        assert_eq!(
            image_filter(&writer),
            vec![("FlateDecode".to_string(), "DeviceRGB".to_string()); 3]
        );
    }

    #[test]
    fn test_gray_jpeg_color_space() {
        let asset = ImageAsset::new("g.jpg", gray_jpeg(20, 20));
        let mut writer = PdfDocumentWriter::new(PageFormat::A4, "t");
        let image = PdfImageDecoder.decode(&asset).unwrap();
        writer.draw_image(image, Rect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        assert_eq!(
            image_filter(&writer),
            vec![("DCTDecode".to_string(), "DeviceGray".to_string())]
        );
    }

    #[test]
    fn test_flatten_alpha() {
        let mut rgba = image::RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([255, 255, 255, 0]));
        rgba.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));

        assert_eq!(flatten_alpha(&rgba, Color::BLACK), vec![0, 0, 0, 10, 20, 30]);
        assert_eq!(
            flatten_alpha(&rgba, Color::rgb(100, 150, 200)),
            vec![100, 150, 200, 10, 20, 30]
        );
    }

    #[test]
    fn test_writer_provisions_and_trims() {
        let mut writer = PdfDocumentWriter::new(PageFormat::A4, "t");
        assert_eq!(writer.page_count(), 1);
        writer.add_page();
        assert_eq!(writer.page_count(), 2);
        writer.delete_last_page();
        assert_eq!(writer.page_count(), 1);
    }

    #[test]
    fn test_writer_without_pages_fails() {
        let mut writer = PdfDocumentWriter::new(PageFormat::A4, "t");
        writer.delete_last_page();
        assert!(matches!(
            writer.finish(),
            Err(ConvertError::Serialization(_))
        ));
    }

    #[test]
    fn test_coordinate_flip() {
        let writer = PdfDocumentWriter::new(PageFormat::A4, "t");
        // A box touching the top edge has its bottom at page height - box height.
        let y = writer.pt_y(0.0, 100.0);
        let expected = (PageFormat::A4.height() - 100.0) * PageFormat::POINTS_PER_UNIT;
        assert!((y.0 - expected).abs() < 1e-2);
        // The full page maps to [0, height_pt].
        assert!(writer.pt_y(0.0, PageFormat::A4.height()).0.abs() < 1e-2);
        assert!((writer.pt_x(PageFormat::A4.width()).0 - PageFormat::A4.width_pt).abs() < 1e-2);
    }

    #[test]
    fn test_export_three_pages() {
        let mut set = ImageSet::new();
        set.push(ImageAsset::new("a.jpg", jpeg(800, 600)));
        set.push(ImageAsset::new("b.jpg", jpeg(400, 400)));
        set.push(ImageAsset::new("c.jpg", jpeg(2000, 100)));

        let opts = ExportOptions {
            margin: MarginPreset::Low,
            background: Color::BLACK,
            ..Default::default()
        };
        let doc = export_pdf(&set, &opts).unwrap();

        assert_eq!(doc.file_name, "converted.pdf");
        assert_eq!(doc.page_count, 3);
        assert_eq!(&doc.bytes[..5], b"%PDF-");

        let pages = page_operators(&doc.bytes);
        assert_eq!(pages.len(), 3);
        for ops in &pages {
            let fill = ops.iter().position(|o| o.starts_with('f'));
            let draw = ops.iter().position(|o| o == "Do");
            assert!(fill.is_some(), "missing background fill: {:?}", ops);
            assert!(draw.is_some(), "missing image: {:?}", ops);
            assert!(fill < draw);
        }

        let third = doc.placements[2].image;
        assert!((third.width / third.height - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_export_mixed_formats() {
        let set: ImageSet = vec![
            ImageAsset::new("a.png", png(30, 60)),
            ImageAsset::new("b.jpg", jpeg(60, 30)),
        ]
        .into_iter()
        .collect();

        let doc = export_pdf(&set, &ExportOptions::default()).unwrap();
        let parsed = lopdf::Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 2);
    }

    #[test]
    fn test_export_empty_set() {
        let err = export_pdf(&ImageSet::new(), &ExportOptions::default()).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_export_aborts_on_bad_image() {
        let set: ImageSet = vec![
            ImageAsset::new("good.png", png(10, 10)),
            ImageAsset::new("bad.png", b"\x89PNG broken".to_vec()),
        ]
        .into_iter()
        .collect();

        match export_pdf(&set, &ExportOptions::default()) {
            Err(ConvertError::Decode { index, name, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "bad.png");
            }
            other => panic!("unexpected: {:?}", other.map(|d| d.page_count)),
        }
    }

    #[test]
    fn test_save_to_directory() {
        let set: ImageSet = vec![ImageAsset::new("a.png", png(5, 5))]
            .into_iter()
            .collect();
        let doc = export_pdf(&set, &ExportOptions::default()).unwrap();

        let dir = std::env::temp_dir().join("img2pdf_output_pdf_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = doc.save_to(&dir).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..5], b"%PDF-");
        std::fs::remove_dir_all(&dir).ok();
    }
}
