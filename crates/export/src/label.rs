//! Label overlays drawn on an item's first page
//!
//! Labels use an embedded TrueType font as a Type0 font with Identity-H encoding, so
//! any script the font covers can be drawn. The font is embedded once per document
//! with widths for every glyph the labels use.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use scoremark_render::Font;

use crate::document::{add_resource, append_content, fmt_num, media_box, page_resources};

pub const LABEL_SIZE: f32 = 14.0;
const MARGIN: f32 = 18.0;
const PADDING: f32 = 6.0;
const BACKING_OPACITY: f32 = 0.75;

const FONT_RESOURCE: &str = "ScoremarkLabel";
const STATE_RESOURCE: &str = "ScoremarkLabelState";

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("label font has no glyph for some characters of {0:?}")]
    MissingGlyphs(String),
    #[error("page has no media box")]
    NoMediaBox,
}

/// Label font objects already added to a document
pub struct LabelFont<'f> {
    font: &'f Font,
    font_id: ObjectId,
    state_id: ObjectId,
}

impl<'f> LabelFont<'f> {
    /// Embed `font` with widths for the glyphs of every label it covers
    pub fn embed(doc: &mut Document, font: &'f Font, labels: &[&str]) -> Self {
        let mut glyphs: BTreeMap<u16, char> = BTreeMap::new();
        for label in labels {
            if let Some(ids) = font.glyph_ids(label) {
                for (gid, ch) in ids.into_iter().zip(label.chars()) {
                    glyphs.entry(gid).or_insert(ch);
                }
            }
        }

        let metrics = font.metrics();
        let scale = 1000.0 / metrics.units_per_em as f32;
        let pdf_units = |value: f32| Object::Integer((value * scale).round() as i64);
        let name = font.postscript_name().to_owned();

        let file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => font.data().len() as i64 },
            font.data().to_vec(),
        ));
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => name.as_str(),
            "Flags" => 32i64,
            "FontBBox" => metrics.bbox.iter().map(|v| pdf_units(*v as f32)).collect::<Vec<_>>(),
            "ItalicAngle" => 0i64,
            "Ascent" => pdf_units(metrics.ascender as f32),
            "Descent" => pdf_units(metrics.descender as f32),
            "CapHeight" => pdf_units(metrics.cap_height as f32),
            "StemV" => 80i64,
            "FontFile2" => file_id,
        });

        let widths: Vec<Object> = glyphs
            .keys()
            .flat_map(|gid| {
                let advance = pdf_units(font.advance(*gid) as f32);
                [Object::Integer(*gid as i64), Object::Array(vec![advance])]
            })
            .collect();
        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => name.as_str(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0i64,
            },
            "FontDescriptor" => descriptor_id,
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let cmap = to_unicode_cmap(&glyphs).into_bytes();
        let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), cmap));
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => name.as_str(),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => to_unicode_id,
        });
        let state_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(BACKING_OPACITY),
        });

        Self { font, font_id, state_id }
    }

    /// Draw `label` in the top-right corner of a page
    pub fn draw(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        label: &str,
    ) -> Result<(), LabelError> {
        let glyph_ids = self
            .font
            .glyph_ids(label)
            .ok_or_else(|| LabelError::MissingGlyphs(label.to_owned()))?;
        let [_, _, right, top] = media_box(doc, page_id).ok_or(LabelError::NoMediaBox)?;

        let metrics = self.font.metrics();
        let units = LABEL_SIZE / metrics.units_per_em as f32;
        let ascent = metrics.ascender as f32 * units;
        let descent = -(metrics.descender as f32) * units;

        let box_width = self.font.text_width(label, LABEL_SIZE) + 2.0 * PADDING;
        let box_height = ascent + descent + 2.0 * PADDING;
        let box_x = right - MARGIN - box_width;
        let box_y = top - MARGIN - box_height;

        let hex: String = glyph_ids.iter().map(|gid| format!("{gid:04X}")).collect();
        let mut content = String::new();
        let _ = write!(
            content,
            "q\n/{STATE_RESOURCE} gs\n1 1 1 rg\n{} {} {} {} re\nf\nQ\n",
            fmt_num(box_x),
            fmt_num(box_y),
            fmt_num(box_width),
            fmt_num(box_height)
        );
        let _ = write!(
            content,
            "BT\n0 0 0 rg\n/{FONT_RESOURCE} {} Tf\n{} {} Td\n<{hex}> Tj\nET\n",
            fmt_num(LABEL_SIZE),
            fmt_num(box_x + PADDING),
            fmt_num(box_y + PADDING + descent)
        );

        let mut resources = page_resources(doc, page_id);
        let font = Object::Reference(self.font_id);
        let state = Object::Reference(self.state_id);
        add_resource(doc, &mut resources, b"Font", FONT_RESOURCE, font);
        add_resource(doc, &mut resources, b"ExtGState", STATE_RESOURCE, state);
        append_content(doc, page_id, resources, content.as_bytes());
        Ok(())
    }
}

/// CMap mapping glyph ids back to the characters they were chosen for
fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String =
                ch.encode_utf16(&mut units).iter().map(|unit| format!("{unit:04X}")).collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}
