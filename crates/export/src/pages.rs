//! Per-item page builders
//!
//! Each builder returns a standalone document whose pages carry every attribute they
//! need, ready to be absorbed into the output. Ink is rasterized at the same canvas
//! geometry the editor uses for that page, then laid over the page at its native size.

use image::imageops::{self, FilterType};
use image::Rgba;
use lopdf::{dictionary, Document, Object, ObjectId};
use scoremark_core::{CanvasGeometry, CanvasLimits, PageAnnotation};
use scoremark_render::engine::{inherited_attribute, resolve_page_size, FALLBACK_PAGE_SIZE};
use scoremark_render::raster::composite_over;
use scoremark_render::{render_overlay, Font, RgbaImage};

use crate::document::{
    add_image_xobject, add_resource, append_content, draw_xobject, media_box, page_resources, rect,
    OutputDocument, A4_HEIGHT, A4_WIDTH,
};
use crate::error::ItemFailure;

const INK_XOBJECT: &str = "ScoremarkInk";
const SCAN_XOBJECT: &str = "ScoremarkScan";

/// Copy of a PDF source with ink burned into its pages
pub fn pdf_item(
    bytes: &[u8],
    annotations: &[PageAnnotation],
    font: Option<&Font>,
) -> Result<Document, ItemFailure> {
    let mut doc = Document::load_mem(bytes)?;
    if doc.trailer.has(b"Encrypt") {
        return Err(ItemFailure::Encrypted);
    }

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(ItemFailure::Empty);
    }

    for (index, page_id) in pages.iter().enumerate() {
        flatten_inherited(&mut doc, *page_id);
        if let Some(page) = annotations.get(index).filter(|page| !page.is_empty()) {
            burn_ink(&mut doc, *page_id, page, font);
        }
    }
    Ok(doc)
}

/// Single A4 page with the image centered at its aspect ratio
pub fn image_item(
    bytes: &[u8],
    annotations: &[PageAnnotation],
    limits: &CanvasLimits,
    font: Option<&Font>,
) -> Result<Document, ItemFailure> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    let geometry = CanvasGeometry::for_image(decoded.width(), decoded.height(), limits);
    let canvas = geometry.canvas;
    if canvas.is_empty() {
        return Err(ItemFailure::Empty);
    }

    let scan = imageops::resize(&decoded, canvas.width, canvas.height, FilterType::Triangle);
    let mut raster = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba([255, 255, 255, 255]));
    composite_over(&mut raster, &scan);
    if let Some(page) = annotations.first().filter(|page| !page.is_empty()) {
        composite_over(&mut raster, &render_overlay(canvas, page, font));
    }

    let mut part = OutputDocument::new();
    let image_id = add_image_xobject(part.doc_mut(), &raster);
    let (x, y, width, height) =
        centered_fit(canvas.width as f32, canvas.height as f32, A4_WIDTH, A4_HEIGHT);
    part.add_page(
        [0.0, 0.0, A4_WIDTH, A4_HEIGHT],
        dictionary! { "XObject" => dictionary! { SCAN_XOBJECT => image_id } },
        draw_xobject(SCAN_XOBJECT, x, y, width, height),
    );
    Ok(part.finish())
}

/// Largest rectangle with the content's aspect ratio centered in the page
pub fn centered_fit(
    content_width: f32,
    content_height: f32,
    page_width: f32,
    page_height: f32,
) -> (f32, f32, f32, f32) {
    let scale = (page_width / content_width).min(page_height / content_height);
    let width = content_width * scale;
    let height = content_height * scale;
    ((page_width - width) / 2.0, (page_height - height) / 2.0, width, height)
}

/// Put inherited page attributes on the page itself
///
/// The page-tree nodes are dropped when the document is merged, so anything a page
/// inherits from them has to move onto the page first.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) {
    let resources = page_resources(doc, page_id);
    let media = media_box(doc, page_id)
        .unwrap_or([0.0, 0.0, FALLBACK_PAGE_SIZE.width_pt, FALLBACK_PAGE_SIZE.height_pt]);
    let crop_box = inherited_attribute(doc, page_id, b"CropBox").and_then(|object| match object {
        Object::Reference(id) => doc.get_object(*id).ok().cloned(),
        other => Some(other.clone()),
    });
    let rotate =
        inherited_attribute(doc, page_id, b"Rotate").and_then(|object| object.as_i64().ok());

    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        page.set("Resources", resources);
        page.set("MediaBox", rect(media));
        if let Some(crop_box) = crop_box {
            page.set("CropBox", crop_box);
        }
        if let Some(rotate) = rotate {
            page.set("Rotate", rotate);
        }
    }
}

/// Overlay the page's ink as a transparent image covering the MediaBox
///
/// Page rotation is not applied; ink is recorded against the unrotated page.
fn burn_ink(doc: &mut Document, page_id: ObjectId, page: &PageAnnotation, font: Option<&Font>) {
    let size = resolve_page_size(doc, page_id).unwrap_or(FALLBACK_PAGE_SIZE);
    let geometry = CanvasGeometry::for_page(size.width_pt as f64, size.height_pt as f64);
    let overlay = render_overlay(geometry.canvas, page, font);
    if overlay.pixels().all(|pixel| pixel[3] == 0) {
        return;
    }

    let [x0, y0, _, _] =
        media_box(doc, page_id).unwrap_or([0.0, 0.0, size.width_pt, size.height_pt]);
    let image_id = add_image_xobject(doc, &overlay);
    let mut resources = page_resources(doc, page_id);
    add_resource(doc, &mut resources, b"XObject", INK_XOBJECT, image_id.into());
    append_content(
        doc,
        page_id,
        resources,
        &draw_xobject(INK_XOBJECT, x0, y0, size.width_pt, size.height_pt),
    );
}
