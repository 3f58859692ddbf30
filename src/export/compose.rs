//! PDF assembly: one full-page raster image per page.
//!
//! Each page holds a single image XObject named `/Im0`, scaled by the content
//! stream to cover the whole media box.

use std::io::Write;

use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use log::debug;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, StringFormat, Stream, dictionary};

use super::ExportError;
use super::libraries::Composer;

/// Pages are 1920×1080 CSS pixels expressed in points (96 px per 72 pt).
pub const PAGE_WIDTH_PT: f32 = 1920.0 * 0.75;
pub const PAGE_HEIGHT_PT: f32 = 1080.0 * 0.75;

const PRODUCER: &str = concat!("FlowPitch ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub title: String,
    pub created: DateTime<Local>,
}

impl DocumentInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created: Local::now(),
        }
    }
}

/// Output document under construction.
pub trait DocumentBuilder: Send {
    /// Append `image` as a new page covering the full page size.
    fn add_page(&mut self, image: &RgbaImage) -> Result<(), ExportError>;

    fn page_count(&self) -> usize;

    /// Serialize the finished document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, ExportError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfComposer;

impl Composer for PdfComposer {
    fn begin(&self, info: DocumentInfo) -> Box<dyn DocumentBuilder> {
        Box::new(PdfDocument::new(info))
    }
}

struct PageImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

pub struct PdfDocument {
    info: DocumentInfo,
    pages: Vec<PageImage>,
}

impl PdfDocument {
    pub fn new(info: DocumentInfo) -> Self {
        Self {
            info,
            pages: Vec::new(),
        }
    }
}

impl DocumentBuilder for PdfDocument {
    fn add_page(&mut self, image: &RgbaImage) -> Result<(), ExportError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ExportError::Compose(format!(
                "page {} has an empty image",
                self.pages.len() + 1
            )));
        }

        // PDF images carry no alpha here; composite over white.
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in image.pixels() {
            let [r, g, b, a] = pixel.0;
            let a = a as u32;
            for channel in [r, g, b] {
                rgb.push(((channel as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&rgb).map_err(compose_error)?;
        let data = encoder.finish().map_err(compose_error)?;

        debug!(
            "Page {}: {width}x{height} image, {} compressed bytes",
            self.pages.len() + 1,
            data.len()
        );
        self.pages.push(PageImage {
            width,
            height,
            data,
        });
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, ExportError> {
        if self.pages.is_empty() {
            return Err(ExportError::Compose("document has no pages".to_string()));
        }
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => page.width as i64,
                    "Height" => page.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "FlateDecode",
                },
                page.data.clone(),
            ));

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            PAGE_WIDTH_PT.into(),
                            Object::Integer(0),
                            Object::Integer(0),
                            PAGE_HEIGHT_PT.into(),
                            Object::Integer(0),
                            Object::Integer(0),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let encoded = content.encode().map_err(compose_error)?;
            let contents_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    PAGE_WIDTH_PT.into(),
                    PAGE_HEIGHT_PT.into(),
                ],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
                "Contents" => contents_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => text_string(&self.info.title),
            "Producer" => text_string(PRODUCER),
            "CreationDate" => Object::string_literal(pdf_date(&self.info.created)),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).map_err(compose_error)?;
        Ok(out)
    }
}

fn compose_error(err: impl std::fmt::Display) -> ExportError {
    ExportError::Compose(err.to_string())
}

/// PDF text string: a literal for ASCII, BOM-prefixed UTF-16BE otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::string_literal(text)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn pdf_date(at: &DateTime<Local>) -> String {
    let offset = at.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{sign}{:02}'{:02}'",
        at.format("%Y%m%d%H%M%S"),
        offset / 3600,
        (offset % 3600) / 60
    )
}
