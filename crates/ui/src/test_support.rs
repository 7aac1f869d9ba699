//! Shared fixtures for surface tests

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use image::{ImageFormat, Rgba};
use lopdf::{dictionary, Document, Object};
use scoremark_render::{DocumentSession, LopdfEngine, MemoryFetcher, RgbaImage};

use crate::SharedSession;

/// Three US Letter pages
pub const PDF_REF: &str = "scores/three.pdf";

/// 300 x 400 scan
pub const PNG_REF: &str = "scans/page.png";

pub fn three_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..3)
        .map(|_| doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id }).into())
        .collect();
    let media_box: Vec<Object> = [0, 0, 612, 792].into_iter().map(Object::Integer).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 3i64,
            "Kids" => kids,
            "MediaBox" => media_box,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture pdf should serialize");
    bytes
}

pub fn scan_png() -> Vec<u8> {
    let image = RgbaImage::from_pixel(300, 400, Rgba([240, 240, 235, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).expect("fixture png should encode");
    bytes.into_inner()
}

pub fn shared_session() -> SharedSession {
    let fetcher = MemoryFetcher::new().with(PDF_REF, three_page_pdf()).with(PNG_REF, scan_png());
    Rc::new(RefCell::new(DocumentSession::new(Box::new(fetcher), Box::new(LopdfEngine::new()))))
}
