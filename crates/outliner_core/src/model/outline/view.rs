//! Shadow table upkeep, view toggles, search mode and rendered text.
//!
//! # Invariants
//! - Cached row indices are written back on every refresh and hidden while
//!   the table is stale.
//! - Search matches are recomputed from the tree on every refresh.
//! - Rendered markdown comes from the render cache, which every text or
//!   image write invalidates.

use super::{ActiveSearch, Outline};
use crate::model::edit::RowEdit;
use crate::model::image::Image;
use crate::model::row::{Container, RowId};
use crate::model::text::{splice_image_references, TextField};
use crate::search::{search_outline, SearchMatches, SearchResult};
use crate::shadow::projector::{self, ShadowTable, ShadowTableEntry};
use crate::shadow::{diff_projections, ShadowTableChanges};
use log::{debug, warn};
use std::collections::HashSet;

impl Outline {
    /// Current shadow table, `None` while stale or paged out.
    pub fn shadow_table(&self) -> Option<&ShadowTable> {
        if self.shadow_stale {
            None
        } else {
            self.shadow_table.as_ref()
        }
    }

    pub fn is_shadow_table_stale(&self) -> bool {
        self.shadow_stale
    }

    /// Cached display index of a row; `None` while the table is stale or the
    /// row is hidden.
    pub fn shadow_table_index(&self, row_id: &str) -> Option<usize> {
        if self.shadow_stale {
            return None;
        }
        self.keyed_rows.get(row_id)?.cached_shadow_table_index()
    }

    /// Visible rows with indices and indent levels.
    pub fn shadow_table_entries(&self) -> Vec<ShadowTableEntry> {
        self.shadow_table()
            .map(|table| projector::entries(self, table))
            .unwrap_or_default()
    }

    /// Rows whose rendering is affected by `edits` beyond structural moves.
    ///
    /// Completion changes touch the whole subtree since descendants render
    /// their ancestor's completion.
    pub fn touched_rows(&self, edits: &[RowEdit]) -> HashSet<RowId> {
        let mut touched = HashSet::new();
        for edit in edits {
            if let Some(row_id) = edit.row_id() {
                touched.insert(row_id.to_string());
            }
            for container in edit.containers() {
                if let Container::Row(row_id) = container {
                    touched.insert(row_id.clone());
                }
            }
            if let RowEdit::CompleteChanged { row_id, .. } = edit {
                touched.extend(self.descendants(row_id));
            }
        }
        touched.retain(|row_id| self.keyed_rows.contains_key(row_id));
        touched
    }

    /// Re-projects after `edits` and returns the diff from the last table.
    ///
    /// Edit lists made only of expansion changes are patched into the old
    /// table instead of projecting the whole outline.
    pub fn refresh_shadow_table(&mut self, edits: &[RowEdit]) -> ShadowTableChanges {
        let touched = self.touched_rows(edits);
        let expansion_rows = if !edits.is_empty() && edits.iter().all(RowEdit::is_expansion) {
            edits
                .iter()
                .filter_map(RowEdit::row_id)
                .map(str::to_string)
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };
        self.project_and_diff(&touched, &expansion_rows)
    }

    /// Fully re-projects and returns the diff from the last table.
    pub fn rebuild_shadow_table(&mut self) -> ShadowTableChanges {
        self.project_and_diff(&HashSet::new(), &[])
    }

    fn project_and_diff(
        &mut self,
        touched: &HashSet<RowId>,
        expansion_rows: &[RowId],
    ) -> ShadowTableChanges {
        if !self.is_loaded {
            return ShadowTableChanges::default();
        }
        self.refresh_search();

        let previous = self.shadow_table.take();
        let old_rows = previous
            .as_ref()
            .map(|table| table.rows().to_vec())
            .unwrap_or_default();
        let table = match previous {
            Some(mut table) if !expansion_rows.is_empty() => {
                let patched = expansion_rows
                    .iter()
                    .all(|row_id| projector::resplice_descendants(self, &mut table, row_id));
                if patched {
                    table
                } else {
                    projector::project(self)
                }
            }
            _ => projector::project(self),
        };

        let changes = diff_projections(&old_rows, table.rows(), touched);
        for row_id in &old_rows {
            if let Some(row) = self.keyed_rows.get_mut(row_id) {
                row.set_shadow_table_index(None);
            }
        }
        for (index, row_id) in table.rows().iter().enumerate() {
            if let Some(row) = self.keyed_rows.get_mut(row_id) {
                row.set_shadow_table_index(Some(index));
            }
        }
        debug!(
            "event=shadow_refresh module=outline status=ok outline={} rows={} inserts={} deletes={} moves={} reloads={}",
            self.id,
            table.len(),
            changes.inserts.len(),
            changes.deletes.len(),
            changes.moves.len(),
            changes.reloads.len()
        );
        self.shadow_table = Some(table);
        self.shadow_stale = false;
        changes
    }

    /// Flips hide-completed and returns the resulting diff.
    pub fn toggle_filter(&mut self) -> ShadowTableChanges {
        self.is_filtered = !self.is_filtered;
        let id = self.id.clone();
        self.changes.mark(id);
        self.rebuild_shadow_table()
    }

    /// Flips note visibility; every visible row reloads.
    pub fn toggle_notes_hidden(&mut self) -> ShadowTableChanges {
        self.is_notes_hidden = !self.is_notes_hidden;
        let id = self.id.clone();
        self.changes.mark(id);
        let touched = self
            .shadow_table
            .as_ref()
            .map(|table| table.rows().iter().cloned().collect::<HashSet<_>>())
            .unwrap_or_default();
        self.render_cache.clear();
        self.project_and_diff(&touched, &[])
    }

    pub fn search_text(&self) -> Option<&str> {
        self.search.as_ref().map(|search| search.text.as_str())
    }

    pub fn search_matches(&self) -> Option<&SearchMatches> {
        self.search.as_ref().map(|search| &search.matches)
    }

    /// Rows forced visible by the active search.
    pub fn search_visible(&self) -> Option<&HashSet<RowId>> {
        self.search.as_ref().map(|search| &search.matches.visible)
    }

    /// Enters search mode: only matches and their ancestors are listed.
    pub fn search(&mut self, text: &str) -> SearchResult<ShadowTableChanges> {
        let matches = search_outline(self, text)?;
        let mut touched = self
            .search_matches()
            .map(|previous| previous.matches.iter().cloned().collect::<HashSet<_>>())
            .unwrap_or_default();
        touched.extend(matches.matches.iter().cloned());
        self.search = Some(ActiveSearch {
            text: text.to_string(),
            matches,
        });
        Ok(self.project_and_diff(&touched, &[]))
    }

    /// Leaves search mode and restores the normal projection.
    pub fn end_search(&mut self) -> ShadowTableChanges {
        let Some(previous) = self.search.take() else {
            return ShadowTableChanges::default();
        };
        let touched = previous.matches.matches.into_iter().collect::<HashSet<_>>();
        self.project_and_diff(&touched, &[])
    }

    fn refresh_search(&mut self) {
        let Some(text) = self.search_text().map(str::to_string) else {
            return;
        };
        match search_outline(self, &text) {
            Ok(matches) => self.search = Some(ActiveSearch { text, matches }),
            Err(err) => warn!(
                "event=search_refresh module=outline status=error outline={} error={}",
                self.id, err
            ),
        }
    }

    /// Topic with image references spliced back in.
    pub fn topic_markdown(&self, row_id: &str) -> Option<String> {
        self.render_field(row_id, TextField::Topic)
    }

    /// Note with image references spliced back in.
    pub fn note_markdown(&self, row_id: &str) -> Option<String> {
        self.render_field(row_id, TextField::Note)
    }

    fn render_field(&self, row_id: &str, field: TextField) -> Option<String> {
        let row = self.keyed_rows.get(row_id)?;
        self.render_cache.get_or_render(row_id, field, || {
            let text = match field {
                TextField::Topic => row.topic(),
                TextField::Note => row.note(),
            }?;
            let images = self
                .images_of(row_id)
                .iter()
                .filter(|image| image.is_in_notes == field.is_in_notes())
                .collect::<Vec<&Image>>();
            Some(splice_image_references(text, &images))
        })
    }

    /// Number of cached rendered fields.
    pub fn rendered_field_count(&self) -> usize {
        self.render_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::outline_with;
    use crate::model::entity_id::EntityId;
    use crate::model::image::Image;
    use crate::model::row::RowStrings;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn filter_hides_completed_rows_and_reports_insertion() {
        let mut outline = outline_with(&[("a", None), ("b", None), ("c", None)]);
        let edits = outline.complete_rows(&ids(&["b"])).unwrap();
        outline.refresh_shadow_table(&edits);

        outline.toggle_filter();
        assert_eq!(outline.shadow_table().unwrap().rows(), &ids(&["a", "c"])[..]);

        let changes = outline.toggle_filter();
        assert_eq!(outline.shadow_table().unwrap().rows(), &ids(&["a", "b", "c"])[..]);
        assert_eq!(changes.inserts, vec![1]);
        assert!(changes.moves.is_empty());
        assert!(changes.deletes.is_empty());
    }

    #[test]
    fn stale_table_hides_cached_indices() {
        let mut outline = outline_with(&[("a", None), ("b", None)]);
        assert_eq!(outline.shadow_table_index("b"), Some(1));

        let edits = outline.delete_rows(&ids(&["a"])).unwrap();
        assert_eq!(outline.shadow_table_index("b"), None);

        let changes = outline.refresh_shadow_table(&edits);
        assert_eq!(changes.deletes, vec![0]);
        assert_eq!(outline.shadow_table_index("b"), Some(0));
    }

    #[test]
    fn collapse_patch_matches_full_projection() {
        let mut outline = outline_with(&[
            ("a", None),
            ("b", Some("a")),
            ("c", Some("b")),
            ("d", None),
        ]);
        let edits = outline.collapse_rows(&ids(&["a"])).unwrap();
        let changes = outline.refresh_shadow_table(&edits);
        assert_eq!(outline.shadow_table().unwrap().rows(), &ids(&["a", "d"])[..]);
        assert_eq!(changes.deletes, vec![1, 2]);
        assert_eq!(changes.reloads, vec![0]);

        let patched = outline.shadow_table().unwrap().clone();
        outline.rebuild_shadow_table();
        assert_eq!(outline.shadow_table().unwrap(), &patched);
    }

    #[test]
    fn markdown_render_splices_images_and_invalidates() {
        let mut outline = outline_with(&[("a", None)]);
        let image = Image::new(EntityId::image(1, "o", "a", "pic"), false, 1, vec![1]);
        outline
            .import_row_text("a", Some("xy".to_string()), None, vec![image])
            .unwrap();

        assert_eq!(outline.topic_markdown("a").as_deref(), Some("x![](pic.png)y"));
        assert_eq!(outline.rendered_field_count(), 1);

        outline
            .update_row_strings("a", RowStrings::TopicMarkdown(Some("![](pic.png)xy".to_string())))
            .unwrap();
        assert_eq!(outline.rendered_field_count(), 0);
        assert_eq!(outline.topic_markdown("a").as_deref(), Some("![](pic.png)xy"));
        assert_eq!(outline.images_of("a")[0].offset, 0);
    }

    #[test]
    fn search_forces_ancestors_visible_until_ended() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a")), ("c", None)]);
        let edits = outline.collapse_rows(&ids(&["a"])).unwrap();
        outline.refresh_shadow_table(&edits);

        outline.search("b").unwrap();
        assert_eq!(outline.shadow_table().unwrap().rows(), &ids(&["a", "b"])[..]);

        outline.end_search();
        assert_eq!(outline.shadow_table().unwrap().rows(), &ids(&["a", "c"])[..]);
    }
}
