//! Annotation store
//!
//! Owns the per-page annotation list of one open document. Every mutation records a
//! snapshot of the page it touches, so undo and redo are independent per page.
//! Bulk operations over several strokes validate every index before touching anything.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::model::{Color, PageAnnotation, Stroke, TextElement};

/// Undo depth kept for each page
pub const MAX_HISTORY: usize = 100;

/// Errors raised by store mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("page index {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("stroke index {index} is out of range on page {page} ({len} strokes)")]
    StrokeOutOfRange { page: usize, index: usize, len: usize },

    #[error("text element index {index} is out of range on page {page} ({len} elements)")]
    TextOutOfRange { page: usize, index: usize, len: usize },
}

#[derive(Debug, Clone, Default)]
struct PageHistory {
    undo: Vec<PageAnnotation>,
    redo: Vec<PageAnnotation>,
}

/// In-memory annotations for one document
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    pages: Vec<PageAnnotation>,
    history: Vec<PageHistory>,
    revision: u64,
}

impl AnnotationStore {
    /// Empty store with one entry per page
    pub fn new(page_count: usize) -> Self {
        Self {
            pages: vec![PageAnnotation::new(); page_count],
            history: vec![PageHistory::default(); page_count],
            revision: 0,
        }
    }

    /// Store seeded from a persisted payload
    ///
    /// The payload is padded with empty pages when the document has more pages than
    /// were saved. Extra saved pages are kept so nothing is lost on a later save.
    pub fn from_payload(mut pages: Vec<PageAnnotation>, page_count: usize) -> Self {
        if pages.len() != page_count {
            tracing::debug!(
                saved = pages.len(),
                page_count,
                "annotation payload does not match page count"
            );
        }
        if pages.len() < page_count {
            pages.resize_with(page_count, PageAnnotation::new);
        }
        let history = vec![PageHistory::default(); pages.len()];
        Self { pages, history, revision: 0 }
    }

    /// Full payload, one entry per page
    pub fn to_payload(&self) -> Vec<PageAnnotation> {
        self.pages.clone()
    }

    pub fn pages(&self) -> &[PageAnnotation] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page: usize) -> Option<&PageAnnotation> {
        self.pages.get(page)
    }

    /// Monotonic counter bumped on every change, including undo and redo
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(PageAnnotation::is_empty)
    }

    pub fn add_stroke(&mut self, page: usize, stroke: Stroke) -> Result<(), StoreError> {
        self.mutate(page, |annotation| annotation.strokes.push(stroke))
    }

    pub fn add_text(&mut self, page: usize, text: TextElement) -> Result<(), StoreError> {
        self.mutate(page, |annotation| annotation.text_elements.push(text))
    }

    pub fn remove_text(&mut self, page: usize, index: usize) -> Result<TextElement, StoreError> {
        let len = self.page_checked(page)?.text_elements.len();
        if index >= len {
            return Err(StoreError::TextOutOfRange { page, index, len });
        }
        let mut removed = None;
        self.mutate(page, |annotation| removed = Some(annotation.text_elements.remove(index)))?;
        removed.ok_or(StoreError::TextOutOfRange { page, index, len })
    }

    /// Remove every listed stroke, or none of them
    pub fn delete_strokes(&mut self, page: usize, indices: &[usize]) -> Result<usize, StoreError> {
        let indices = self.validate_strokes(page, indices)?;
        if indices.is_empty() {
            return Ok(0);
        }

        self.mutate(page, |annotation| {
            for &index in indices.iter().rev() {
                annotation.strokes.remove(index);
            }
        })?;
        Ok(indices.len())
    }

    /// Move every listed stroke by (dx, dy), or none of them
    pub fn translate_strokes(
        &mut self,
        page: usize,
        indices: &[usize],
        dx: f32,
        dy: f32,
    ) -> Result<(), StoreError> {
        let indices = self.validate_strokes(page, indices)?;
        if indices.is_empty() || (dx == 0.0 && dy == 0.0) {
            return Ok(());
        }

        self.mutate(page, |annotation| {
            for &index in &indices {
                annotation.strokes[index] = annotation.strokes[index].translated(dx, dy);
            }
        })
    }

    /// Recolor every listed stroke, or none of them
    pub fn recolor_strokes(
        &mut self,
        page: usize,
        indices: &[usize],
        color: Color,
    ) -> Result<(), StoreError> {
        let indices = self.validate_strokes(page, indices)?;
        if indices.is_empty() {
            return Ok(());
        }

        self.mutate(page, |annotation| {
            for &index in &indices {
                annotation.strokes[index].color = color;
            }
        })
    }

    /// Remove all ink and text from a page (undoable)
    pub fn clear_page(&mut self, page: usize) -> Result<(), StoreError> {
        if self.page_checked(page)?.is_empty() {
            return Ok(());
        }
        self.mutate(page, |annotation| *annotation = PageAnnotation::new())
    }

    /// Undo the last change on `page`; returns whether anything changed
    pub fn undo(&mut self, page: usize) -> bool {
        let Some(history) = self.history.get_mut(page) else {
            return false;
        };
        let Some(previous) = history.undo.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.pages[page], previous);
        history.redo.push(current);
        self.revision += 1;
        true
    }

    /// Redo the last undone change on `page`; returns whether anything changed
    pub fn redo(&mut self, page: usize) -> bool {
        let Some(history) = self.history.get_mut(page) else {
            return false;
        };
        let Some(next) = history.redo.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.pages[page], next);
        history.undo.push(current);
        self.revision += 1;
        true
    }

    pub fn can_undo(&self, page: usize) -> bool {
        self.history.get(page).is_some_and(|h| !h.undo.is_empty())
    }

    pub fn can_redo(&self, page: usize) -> bool {
        self.history.get(page).is_some_and(|h| !h.redo.is_empty())
    }

    fn page_checked(&self, page: usize) -> Result<&PageAnnotation, StoreError> {
        let page_count = self.pages.len();
        self.pages.get(page).ok_or(StoreError::PageOutOfRange { page, page_count })
    }

    fn validate_strokes(&self, page: usize, indices: &[usize]) -> Result<Vec<usize>, StoreError> {
        let len = self.page_checked(page)?.strokes.len();
        let unique: BTreeSet<usize> = indices.iter().copied().collect();
        if let Some(&index) = unique.iter().find(|&&index| index >= len) {
            return Err(StoreError::StrokeOutOfRange { page, index, len });
        }
        Ok(unique.into_iter().collect())
    }

    fn mutate(
        &mut self,
        page: usize,
        change: impl FnOnce(&mut PageAnnotation),
    ) -> Result<(), StoreError> {
        let snapshot = self.page_checked(page)?.clone();

        let history = &mut self.history[page];
        history.undo.push(snapshot);
        if history.undo.len() > MAX_HISTORY {
            history.undo.remove(0);
        }
        history.redo.clear();

        change(&mut self.pages[page]);
        self.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StrokePoint, StrokeTool};

    fn stroke(x: f32) -> Stroke {
        Stroke::new(
            vec![StrokePoint::new(x, 0.0), StrokePoint::new(x + 10.0, 10.0)],
            StrokeTool::Pen,
            Color::BLACK,
            2.0,
            1.0,
        )
    }

    #[test]
    fn test_add_stroke_to_page() {
        let mut store = AnnotationStore::new(3);
        store.add_stroke(1, stroke(0.0)).unwrap();

        assert!(store.page(0).unwrap().is_empty());
        assert_eq!(store.page(1).unwrap().strokes.len(), 1);
        assert!(store.page(2).unwrap().is_empty());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_page_out_of_range() {
        let mut store = AnnotationStore::new(1);
        let err = store.add_stroke(4, stroke(0.0)).unwrap_err();
        assert_eq!(err, StoreError::PageOutOfRange { page: 4, page_count: 1 });
    }

    #[test]
    fn test_undo_redo_is_per_page() {
        let mut store = AnnotationStore::new(2);
        store.add_stroke(0, stroke(0.0)).unwrap();
        store.add_stroke(1, stroke(5.0)).unwrap();
        store.add_stroke(0, stroke(10.0)).unwrap();

        assert!(store.undo(1));
        assert!(store.page(1).unwrap().strokes.is_empty());
        assert_eq!(store.page(0).unwrap().strokes.len(), 2);

        assert!(store.undo(0));
        assert_eq!(store.page(0).unwrap().strokes.len(), 1);
        assert!(store.redo(0));
        assert_eq!(store.page(0).unwrap().strokes.len(), 2);
        assert!(!store.redo(0));
        assert!(store.can_redo(1));
    }

    #[test]
    fn test_new_change_clears_redo() {
        let mut store = AnnotationStore::new(1);
        store.add_stroke(0, stroke(0.0)).unwrap();
        store.undo(0);
        assert!(store.can_redo(0));
        store.add_stroke(0, stroke(1.0)).unwrap();
        assert!(!store.can_redo(0));
    }

    #[test]
    fn test_undo_on_untouched_page() {
        let mut store = AnnotationStore::new(1);
        assert!(!store.undo(0));
        assert!(!store.undo(7));
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_bulk_delete_is_atomic() {
        let mut store = AnnotationStore::new(1);
        for x in [0.0, 1.0, 2.0] {
            store.add_stroke(0, stroke(x)).unwrap();
        }
        let before = store.to_payload();

        let err = store.delete_strokes(0, &[0, 5]).unwrap_err();
        assert_eq!(err, StoreError::StrokeOutOfRange { page: 0, index: 5, len: 3 });
        assert_eq!(store.to_payload(), before);

        assert_eq!(store.delete_strokes(0, &[2, 0, 2]).unwrap(), 2);
        let remaining = &store.page(0).unwrap().strokes;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].points[0].x, 1.0);
    }

    #[test]
    fn test_translate_and_recolor() {
        let mut store = AnnotationStore::new(1);
        store.add_stroke(0, stroke(0.0)).unwrap();
        store.add_stroke(0, stroke(20.0)).unwrap();

        store.translate_strokes(0, &[1], 5.0, -5.0).unwrap();
        store.recolor_strokes(0, &[0, 1], Color::RED).unwrap();

        let page = store.page(0).unwrap();
        assert_eq!(page.strokes[1].points[0], StrokePoint::new(25.0, -5.0));
        assert!(page.strokes.iter().all(|s| s.color == Color::RED));

        assert!(store.recolor_strokes(0, &[9], Color::BLUE).is_err());
        assert!(store.page(0).unwrap().strokes.iter().all(|s| s.color == Color::RED));
    }

    #[test]
    fn test_payload_padding() {
        let store = AnnotationStore::from_payload(vec![PageAnnotation::new()], 3);
        assert_eq!(store.page_count(), 3);
        assert!(store.is_empty());
    }

    #[test]
    fn test_text_elements() {
        let mut store = AnnotationStore::new(1);
        store.add_text(0, TextElement::new(1.0, 2.0, "dolce", 16.0, Color::BLACK)).unwrap();
        let removed = store.remove_text(0, 0).unwrap();
        assert_eq!(removed.text, "dolce");
        assert!(store.remove_text(0, 0).is_err());
        assert!(store.undo(0));
        assert_eq!(store.page(0).unwrap().text_elements.len(), 1);
    }

    #[test]
    fn test_clear_page_undoable() {
        let mut store = AnnotationStore::new(1);
        store.add_stroke(0, stroke(0.0)).unwrap();
        store.clear_page(0).unwrap();
        assert!(store.is_empty());
        store.undo(0);
        assert!(!store.is_empty());
    }
}
