//! Cover page listing the exported items

use std::fmt::Write as _;

use lopdf::dictionary;

use crate::document::{fmt_num, OutputDocument, A4_HEIGHT, A4_WIDTH};

const MARGIN: f32 = 56.0;
const TITLE_SIZE: f32 = 24.0;
const BODY_SIZE: f32 = 12.0;
const LINE_HEIGHT: f32 = 18.0;

/// One line of the item list
#[derive(Debug, Clone, PartialEq)]
pub struct CoverEntry {
    pub title: String,
    pub key: Option<String>,
}

/// Add the cover, continuing the list on extra pages when it does not fit
///
/// Returns the number of pages added.
pub fn add_cover(
    out: &mut OutputDocument,
    title: &str,
    date: &str,
    entries: &[CoverEntry],
) -> usize {
    let font_id = out.doc_mut().add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources = || {
        dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        }
    };

    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| match &entry.key {
            Some(key) => format!("{}. {} ({})", i + 1, entry.title, key),
            None => format!("{}. {}", i + 1, entry.title),
        })
        .collect();

    let first_page_top = A4_HEIGHT - MARGIN - TITLE_SIZE - 2.0 * LINE_HEIGHT;
    let per_first_page = lines_fitting(first_page_top);
    let per_page = lines_fitting(A4_HEIGHT - MARGIN);

    let mut content = String::from("BT\n");
    text_line(&mut content, TITLE_SIZE, MARGIN, A4_HEIGHT - MARGIN - TITLE_SIZE, title);
    text_line(&mut content, BODY_SIZE, MARGIN, A4_HEIGHT - MARGIN - TITLE_SIZE - LINE_HEIGHT, date);
    let (head, mut rest) = lines.split_at(per_first_page.min(lines.len()));
    list_lines(&mut content, first_page_top, head);
    content.push_str("ET\n");
    out.add_page(page_box(), resources(), latin1(&content));
    let mut pages = 1;

    while !rest.is_empty() {
        let (chunk, tail) = rest.split_at(per_page.min(rest.len()));
        let mut content = String::from("BT\n");
        list_lines(&mut content, A4_HEIGHT - MARGIN, chunk);
        content.push_str("ET\n");
        out.add_page(page_box(), resources(), latin1(&content));
        pages += 1;
        rest = tail;
    }
    pages
}

fn page_box() -> [f32; 4] {
    [0.0, 0.0, A4_WIDTH, A4_HEIGHT]
}

fn lines_fitting(top: f32) -> usize {
    (((top - MARGIN) / LINE_HEIGHT).floor() as usize).max(1)
}

fn list_lines(content: &mut String, top: f32, lines: &[String]) {
    for (i, line) in lines.iter().enumerate() {
        text_line(content, BODY_SIZE, MARGIN, top - LINE_HEIGHT * (i as f32 + 1.0), line);
    }
}

fn text_line(content: &mut String, size: f32, x: f32, y: f32, text: &str) {
    let _ = writeln!(
        content,
        "/F1 {} Tf\n1 0 0 1 {} {} Tm\n({}) Tj",
        fmt_num(size),
        fmt_num(x),
        fmt_num(y),
        escape_literal(text)
    );
}

/// Escape a PDF literal string; characters outside Latin-1 become `?`
pub fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\n' | '\r' => escaped.push(' '),
            ch if (ch as u32) <= 0xFF => escaped.push(ch),
            _ => escaped.push('?'),
        }
    }
    escaped
}

/// Content bytes with every char in Latin-1 range written as one byte
fn latin1(content: &str) -> Vec<u8> {
    content.chars().map(|ch| u8::try_from(ch as u32).unwrap_or(b'?')).collect()
}
