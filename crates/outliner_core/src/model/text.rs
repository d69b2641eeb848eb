//! Row text payloads and image splice points.
//!
//! # Responsibility
//! - Split markdown image references out of incoming row text.
//! - Re-splice images into stored text on demand.
//! - Cache rendered markdown per row field with explicit invalidation.
//!
//! # Invariants
//! - Stored text never contains image references; images carry char offsets.
//! - Every text or image write for a row must call `RenderCache::invalidate`.

use crate::model::image::Image;
use crate::model::row::RowId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

static IMAGE_REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[\]\(([^)\s]+)\.png\)").expect("valid image reference regex"));

/// Row text field selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Topic,
    Note,
}

impl TextField {
    pub fn is_in_notes(self) -> bool {
        matches!(self, Self::Note)
    }
}

/// One image reference found in markdown text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub image_uuid: String,
    /// Char offset in the text after all references were removed.
    pub offset: usize,
}

/// Removes `![](<uuid>.png)` references and reports where they were.
pub fn split_image_references(markdown: &str) -> (String, Vec<ImageReference>) {
    let mut plain = String::with_capacity(markdown.len());
    let mut references = Vec::new();
    let mut last_end = 0;
    let mut plain_chars = 0;

    for captures in IMAGE_REFERENCE_RE.captures_iter(markdown) {
        let (Some(whole), Some(uuid)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let preceding = &markdown[last_end..whole.start()];
        plain.push_str(preceding);
        plain_chars += preceding.chars().count();
        references.push(ImageReference {
            image_uuid: uuid.as_str().to_string(),
            offset: plain_chars,
        });
        last_end = whole.end();
    }
    plain.push_str(&markdown[last_end..]);

    (plain, references)
}

/// Inserts image references into `text` at each image offset.
///
/// Offsets past the end of the text are clamped to the end.
pub fn splice_image_references(text: &str, images: &[&Image]) -> String {
    let mut chars = text.chars().collect::<Vec<_>>();
    let mut sorted = images.to_vec();
    sorted.sort_by(|left, right| right.offset.cmp(&left.offset));

    for image in sorted {
        let reference = format!("![]({}.png)", image.image_uuid());
        let at = image.offset.min(chars.len());
        let tail = chars.split_off(at);
        chars.extend(reference.chars());
        chars.extend(tail);
    }

    chars.into_iter().collect()
}

/// Splits `text` at a char position into head and tail.
pub fn split_at_char(text: &str, position: usize) -> (String, String) {
    let byte_index = text
        .char_indices()
        .nth(position)
        .map_or(text.len(), |(index, _)| index);
    (
        text[..byte_index].to_string(),
        text[byte_index..].to_string(),
    )
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Rendered-markdown cache keyed by row id and field.
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: RefCell<HashMap<(RowId, TextField), Option<String>>>,
}

impl RenderCache {
    pub fn get_or_render(
        &self,
        row_id: &str,
        field: TextField,
        render: impl FnOnce() -> Option<String>,
    ) -> Option<String> {
        let key = (row_id.to_string(), field);
        if let Some(cached) = self.entries.borrow().get(&key) {
            return cached.clone();
        }
        let rendered = render();
        self.entries.borrow_mut().insert(key, rendered.clone());
        rendered
    }

    /// Drops both cached fields of one row.
    pub fn invalidate(&self, row_id: &str) {
        let mut entries = self.entries.borrow_mut();
        entries.remove(&(row_id.to_string(), TextField::Topic));
        entries.remove(&(row_id.to_string(), TextField::Note));
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{split_at_char, split_image_references, splice_image_references};
    use crate::model::entity_id::EntityId;
    use crate::model::image::Image;

    fn image(uuid: &str, offset: usize) -> Image {
        Image::new(EntityId::image(1, "o", "r", uuid), false, offset, vec![1, 2])
    }

    #[test]
    fn split_reports_offsets_in_stripped_text() {
        let (plain, refs) = split_image_references("ab![](one.png)cd![](two.png)");
        assert_eq!(plain, "abcd");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].image_uuid, "one");
        assert_eq!(refs[0].offset, 2);
        assert_eq!(refs[1].image_uuid, "two");
        assert_eq!(refs[1].offset, 4);
    }

    #[test]
    fn splice_restores_references_in_offset_order() {
        let one = image("one", 2);
        let two = image("two", 4);
        let text = splice_image_references("abcd", &[&two, &one]);
        assert_eq!(text, "ab![](one.png)cd![](two.png)");
    }

    #[test]
    fn splice_clamps_offsets_past_the_end() {
        let late = image("late", 40);
        assert_eq!(splice_image_references("é", &[&late]), "é![](late.png)");
    }

    #[test]
    fn split_at_char_handles_multibyte_text() {
        let (head, tail) = split_at_char("héllo", 2);
        assert_eq!(head, "hé");
        assert_eq!(tail, "llo");
        let (head, tail) = split_at_char("abc", 10);
        assert_eq!(head, "abc");
        assert_eq!(tail, "");
    }
}
