//! Output document assembly
//!
//! Every part of an export (cover, each item) is built as its own lopdf document and
//! merged into the output only once it is complete, so a failing item never leaves
//! half-copied objects behind.

use std::fmt::Write as _;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use scoremark_render::RgbaImage;

pub const A4_WIDTH: f32 = 595.0;
pub const A4_HEIGHT: f32 = 842.0;

/// Page tree under construction
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self { doc, pages_id, kids: Vec::new() }
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append a page with an inline resource dictionary and one content stream
    pub fn add_page(
        &mut self,
        media_box: [f32; 4],
        resources: Dictionary,
        content: Vec<u8>,
    ) -> ObjectId {
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => rect(media_box),
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.kids.push(page_id);
        page_id
    }

    /// Move every page of `part` to the end of this document
    ///
    /// Page attributes must already sit on the pages themselves; the part's catalog
    /// and intermediate page-tree nodes are dropped. Returns the new page ids.
    pub fn absorb(&mut self, mut part: Document) -> Vec<ObjectId> {
        part.renumber_objects_with(self.doc.max_id + 1);
        let page_ids: Vec<ObjectId> = part.get_pages().into_values().collect();

        for (id, mut object) in std::mem::take(&mut part.objects) {
            if let Object::Dictionary(dict) = &mut object {
                let kind = dict.get(b"Type").and_then(Object::as_name).map(<[u8]>::to_vec).ok();
                match kind.as_deref() {
                    Some(b"Catalog") | Some(b"Pages") => continue,
                    Some(b"Page") if page_ids.contains(&id) => dict.set("Parent", self.pages_id),
                    _ => {}
                }
            }
            self.doc.objects.insert(id, object);
        }
        self.doc.max_id = self.doc.max_id.max(part.max_id);
        self.kids.extend(&page_ids);
        page_ids
    }

    /// Close the page tree and add the catalog
    pub fn finish(mut self) -> Document {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

pub fn rect(values: [f32; 4]) -> Vec<Object> {
    values.iter().map(|v| number(*v)).collect()
}

/// Integers stay integers so page boxes read back exactly
pub fn number(value: f32) -> Object {
    if value.fract() == 0.0 && value.abs() < i32::MAX as f32 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value)
    }
}

/// Number formatted for a content stream
pub fn fmt_num(value: f32) -> String {
    let mut text = format!("{value:.3}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_owned();
    }
    text
}

/// Dictionary behind `object`, following one level of indirection
pub fn resolve_dict(doc: &Document, object: &Object) -> Option<Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// Page MediaBox as `[x0, y0, x1, y1]` with the lower-left corner first
pub fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let object = scoremark_render::engine::inherited_attribute(doc, page_id, b"MediaBox")?;
    let array = match object {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    let values: Vec<f32> = array
        .iter()
        .filter_map(|obj| match obj {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(f) => Some(*f),
            _ => None,
        })
        .collect();
    match values.as_slice() {
        [a, b, c, d] => Some([a.min(*c), b.min(*d), a.max(*c), b.max(*d)]),
        _ => None,
    }
}

/// Insert `name => value` into the `category` sub-dictionary of `resources`
///
/// A referenced sub-dictionary is copied inline first so shared resources of other
/// pages stay untouched.
pub fn add_resource(
    doc: &Document,
    resources: &mut Dictionary,
    category: &[u8],
    name: &str,
    value: Object,
) {
    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|existing| resolve_dict(doc, existing))
        .unwrap_or_default();
    entries.set(name, value);
    resources.set(category.to_vec(), Object::Dictionary(entries));
}

/// Copy of the resources a page uses, inlined
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    scoremark_render::engine::inherited_attribute(doc, page_id, b"Resources")
        .and_then(|resources| resolve_dict(doc, resources))
        .unwrap_or_default()
}

/// Draw `content` after everything already on the page
///
/// The existing content is wrapped in `q`/`Q` so its transformations do not leak
/// into what is appended. `resources` replaces the page's resource dictionary.
pub fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    resources: Dictionary,
    content: &[u8],
) {
    let current = doc.get_dictionary(page_id).and_then(|page| page.get(b"Contents"));
    let existing: Vec<Object> = match current {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut tail = b"\nQ\n".to_vec();
    tail.extend_from_slice(content);
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), tail));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));

    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        page.set("Contents", contents);
        page.set("Resources", resources);
    }
}

/// Add `image` as an RGB image XObject, with a soft mask when it has transparency
pub fn add_image_xobject(doc: &mut Document, image: &RgbaImage) -> ObjectId {
    let (width, height) = image.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8i64,
    };
    if alpha.iter().any(|a| *a != 255) {
        let mask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8i64,
            },
            alpha,
        ));
        dict.set("SMask", mask_id);
    }
    doc.add_object(Stream::new(dict, rgb))
}

/// Content that paints XObject `name` over the rectangle `[x, y, width, height]`
pub fn draw_xobject(name: &str, x: f32, y: f32, width: f32, height: f32) -> Vec<u8> {
    let mut content = String::new();
    let _ = writeln!(
        content,
        "q\n{} 0 0 {} {} {} cm\n/{name} Do\nQ",
        fmt_num(width),
        fmt_num(height),
        fmt_num(x),
        fmt_num(y)
    );
    content.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(612.0), "612");
        assert_eq!(fmt_num(0.75), "0.75");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(12.3456), "12.346");
    }

    #[test]
    fn test_finish_builds_page_tree() {
        let mut out = OutputDocument::new();
        out.add_page([0.0, 0.0, A4_WIDTH, A4_HEIGHT], Dictionary::new(), b"q Q".to_vec());
        out.add_page([0.0, 0.0, 612.0, 792.0], Dictionary::new(), Vec::new());

        let doc = out.finish();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(media_box(&doc, pages[&2]), Some([0.0, 0.0, 612.0, 792.0]));
    }

    #[test]
    fn test_absorb_reparents_pages() {
        let mut part = OutputDocument::new();
        part.add_page([0.0, 0.0, 100.0, 200.0], Dictionary::new(), Vec::new());
        let part = part.finish();

        let mut out = OutputDocument::new();
        out.add_page([0.0, 0.0, A4_WIDTH, A4_HEIGHT], Dictionary::new(), Vec::new());
        let absorbed = out.absorb(part);
        assert_eq!(absorbed.len(), 1);
        assert_eq!(out.page_count(), 2);

        let doc = out.finish();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[&2], absorbed[0]);
        let catalogs = doc
            .objects
            .values()
            .filter(|obj| {
                let kind = obj.as_dict().and_then(|d| d.get(b"Type")).and_then(Object::as_name);
                matches!(kind, Ok(b"Catalog"))
            })
            .count();
        assert_eq!(catalogs, 1);
    }

    #[test]
    fn test_append_content_isolates_existing() {
        let mut out = OutputDocument::new();
        let page_id =
            out.add_page([0.0, 0.0, 100.0, 100.0], Dictionary::new(), b"2 0 0 2 0 0 cm".to_vec());
        let doc = out.doc_mut();
        let mut resources = page_resources(doc, page_id);
        add_resource(doc, &mut resources, b"XObject", "Ink", Object::Integer(1));
        append_content(doc, page_id, resources, b"/Ink Do");

        let content = String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap();
        let q = content.find("q").unwrap();
        let cm = content.find("cm").unwrap();
        let restore = content.find("Q").unwrap();
        let draw = content.find("/Ink Do").unwrap();
        assert!(q < cm && cm < restore && restore < draw);
        let resources = page_resources(doc, page_id);
        assert!(resources.get(b"XObject").and_then(Object::as_dict).unwrap().has(b"Ink"));
    }

    #[test]
    fn test_opaque_image_has_no_mask() {
        let mut doc = Document::with_version("1.7");
        let opaque =
            add_image_xobject(&mut doc, &RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255])));
        let clear = add_image_xobject(&mut doc, &RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 0])));

        let dict_of = |id| {
            doc.get_object(id).and_then(Object::as_stream).map(|s| s.dict.clone()).unwrap()
        };
        assert!(!dict_of(opaque).has(b"SMask"));
        assert!(dict_of(clear).has(b"SMask"));
        assert_eq!(dict_of(opaque).get(b"Width").and_then(Object::as_i64).unwrap(), 4);
    }
}
