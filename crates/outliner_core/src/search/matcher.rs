//! Case-insensitive literal search over loaded rows.
//!
//! # Responsibility
//! - Report matching rows in tree order with per-field hit ranges.
//! - Force every ancestor of a match visible.
//!
//! # Invariants
//! - Query text is matched literally, never as a pattern.
//! - Hit ranges are char offsets into the stored plain text.
//! - Notes are not searched while the outline hides them.

use crate::model::outline::{Outline, OutlineError};
use crate::model::row::RowId;
use crate::model::text::TextField;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Query is empty after trimming.
    EmptyQuery,
    /// Query could not be compiled into a matcher.
    InvalidQuery { query: String, message: String },
    Outline(OutlineError),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "search query is empty"),
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid search query `{query}`: {message}")
            }
            Self::Outline(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Outline(err) => Some(err),
            Self::EmptyQuery | Self::InvalidQuery { .. } => None,
        }
    }
}

impl From<OutlineError> for SearchError {
    fn from(value: OutlineError) -> Self {
        Self::Outline(value)
    }
}

/// One matched range inside a row field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub row_id: RowId,
    pub is_in_notes: bool,
    /// Char offset of the first matched char.
    pub start: usize,
    /// Char offset one past the last matched char.
    pub end: usize,
}

/// Outcome of one search pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchMatches {
    /// Matching rows in tree order.
    pub matches: Vec<RowId>,
    /// Matches plus all of their ancestors.
    pub visible: HashSet<RowId>,
    pub hits: Vec<SearchHit>,
}

impl SearchMatches {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn is_match(&self, row_id: &str) -> bool {
        self.hits.iter().any(|hit| hit.row_id == row_id)
    }

    /// Hits for one row, topic hits first.
    pub fn hits_for<'a>(&'a self, row_id: &'a str) -> impl Iterator<Item = &'a SearchHit> + 'a {
        self.hits.iter().filter(move |hit| hit.row_id == row_id)
    }
}

/// Searches every loaded row of `outline` for `text`.
///
/// # Errors
/// - `EmptyQuery` for blank input.
/// - `Outline(NotLoaded)` when the outline is paged out.
pub fn search_outline(outline: &Outline, text: &str) -> SearchResult<SearchMatches> {
    let query = text.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if !outline.is_loaded() {
        return Err(OutlineError::NotLoaded(outline.id().clone()).into());
    }
    let matcher = build_matcher(query)?;

    let mut found = SearchMatches::default();
    for row_id in outline.rows_in_tree_order() {
        let Some(row) = outline.row(row_id) else {
            continue;
        };
        let mut fields = vec![(TextField::Topic, row.topic())];
        if !outline.is_notes_hidden() {
            fields.push((TextField::Note, row.note()));
        }

        let before = found.hits.len();
        for (field, value) in fields {
            let Some(value) = value else {
                continue;
            };
            found.hits.extend(matcher.find_iter(value).map(|hit| SearchHit {
                row_id: row_id.clone(),
                is_in_notes: field.is_in_notes(),
                start: value[..hit.start()].chars().count(),
                end: value[..hit.end()].chars().count(),
            }));
        }
        if found.hits.len() > before {
            found.matches.push(row_id.clone());
        }
    }

    for row_id in &found.matches {
        found.visible.insert(row_id.clone());
        found.visible.extend(
            outline
                .ancestors(row_id)
                .into_iter()
                .map(str::to_string),
        );
    }
    Ok(found)
}

fn build_matcher(query: &str) -> SearchResult<Regex> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .map_err(|err| SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{search_outline, SearchError};
    use crate::model::outline::test_support::outline_with;
    use crate::model::row::RowStrings;

    #[test]
    fn matches_are_case_insensitive_and_literal() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a")), ("c", None)]);
        outline
            .update_row_strings("c", RowStrings::TopicMarkdown(Some("cost (b.*)".to_string())))
            .unwrap();

        let found = search_outline(&outline, "B.*").unwrap();
        assert_eq!(found.matches, vec!["c".to_string()]);
        assert_eq!(found.hits[0].start, 6);
        assert_eq!(found.hits[0].end, 9);
    }

    #[test]
    fn ancestors_of_matches_are_visible() {
        let outline = outline_with(&[("a", None), ("b", Some("a")), ("c", Some("b"))]);
        let found = search_outline(&outline, "c").unwrap();
        assert_eq!(found.matches, vec!["c".to_string()]);
        assert!(found.visible.contains("a"));
        assert!(found.visible.contains("b"));
        assert!(found.is_match("c"));
        assert!(!found.is_match("a"));
    }

    #[test]
    fn hidden_notes_are_not_searched() {
        let mut outline = outline_with(&[("a", None)]);
        outline
            .update_row_strings("a", RowStrings::NoteMarkdown(Some("needle".to_string())))
            .unwrap();
        assert_eq!(search_outline(&outline, "needle").unwrap().matches.len(), 1);

        outline.toggle_notes_hidden();
        assert!(search_outline(&outline, "needle").unwrap().is_empty());
    }

    #[test]
    fn blank_query_is_rejected() {
        let outline = outline_with(&[("a", None)]);
        assert_eq!(search_outline(&outline, "  "), Err(SearchError::EmptyQuery));
    }

    #[test]
    fn hit_offsets_count_chars() {
        let mut outline = outline_with(&[("a", None)]);
        outline
            .update_row_strings("a", RowStrings::TopicMarkdown(Some("ünï code".to_string())))
            .unwrap();
        let found = search_outline(&outline, "code").unwrap();
        assert_eq!(found.hits_for("a").map(|hit| hit.start).collect::<Vec<_>>(), vec![4]);
    }
}
