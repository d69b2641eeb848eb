use outliner_core::{
    Container, EntityId, Image, OperationKind, Outline, OutlineError, Row, RowGroup, RowSet,
};
use std::collections::BTreeSet;

fn outline_with(rows: &[(&str, Option<&str>)]) -> Outline {
    let mut outline = Outline::new(EntityId::outline(1, "f", "o"), None);
    for (id, parent) in rows {
        let container = parent.map_or(Container::Root, Container::from);
        outline
            .append_row(Row::with_id(*id, Some(id.to_uppercase()), None), &container)
            .unwrap();
    }
    outline.rebuild_shadow_table();
    outline
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn row_from_json(json: &str) -> Row {
    serde_json::from_str(json).unwrap()
}

/// Rows reachable from the root must be exactly the keyed rows.
fn assert_tree_is_sound(outline: &Outline) {
    outline.verify_integrity().unwrap();

    let mut reachable = BTreeSet::new();
    let mut stack = outline.root_order().to_vec();
    while let Some(id) = stack.pop() {
        assert!(reachable.insert(id.clone()), "row {id} reached twice");
        let row = outline.row(&id).unwrap();
        for child in row.row_order() {
            assert_eq!(outline.row(child).unwrap().parent(), &Container::Row(id.clone()));
            stack.push(child.clone());
        }
    }
    let keyed = outline
        .row_set()
        .rows
        .iter()
        .map(|row| row.id().to_string())
        .collect::<BTreeSet<_>>();
    assert_eq!(reachable, keyed);
    assert_eq!(reachable.len(), outline.row_count());
}

#[test]
fn structure_stays_sound_across_mixed_edits() {
    let mut outline = outline_with(&[("a", None), ("b", None), ("c", None), ("d", None)]);
    assert_tree_is_sound(&outline);

    outline.indent_rows(&ids(&["b", "c"])).unwrap();
    assert_eq!(outline.row("a").unwrap().row_order(), ["b", "c"]);
    assert_tree_is_sound(&outline);

    outline.indent_rows(&ids(&["c"])).unwrap();
    assert_eq!(outline.level("c"), 2);
    assert_tree_is_sound(&outline);

    outline
        .create_row_inside("c", Row::with_id("e", None, None))
        .unwrap();
    outline
        .move_rows(&ids(&["d"]), &Container::from("b"), 0)
        .unwrap();
    assert_eq!(outline.row("b").unwrap().row_order(), ["d", "c"]);
    assert_tree_is_sound(&outline);

    outline.outdent_rows(&ids(&["c"])).unwrap();
    assert_eq!(outline.row("c").unwrap().parent(), &Container::from("a"));
    assert_tree_is_sound(&outline);

    let groups = outline.copy_rows(&ids(&["c"])).unwrap();
    outline.paste_rows(&groups, None).unwrap();
    assert_eq!(outline.root_order().len(), 2);
    assert_eq!(outline.row_count(), 7);
    assert_tree_is_sound(&outline);

    outline.delete_rows(&ids(&["a"])).unwrap();
    assert_eq!(outline.root_order().len(), 1);
    assert_eq!(outline.row_count(), 2);
    assert_tree_is_sound(&outline);

    outline.delete_all_rows().unwrap();
    assert_eq!(outline.row_count(), 0);
    assert_tree_is_sound(&outline);
}

#[test]
fn completion_is_derived_for_descendants_not_copied() {
    let mut outline = Outline::new(EntityId::outline(1, "f", "o"), None);
    outline.load(RowSet {
        root_order: ids(&["r"]),
        rows: vec![
            row_from_json(r#"{"id":"r","topic":"R","rowOrder":["a"]}"#),
            row_from_json(r#"{"id":"a","topic":"A","isComplete":true,"rowOrder":["b"]}"#),
            row_from_json(r#"{"id":"b","topic":"B","rowOrder":[]}"#),
        ],
        images: Vec::new(),
        rejected: Vec::new(),
    });

    assert!(!outline.row("b").unwrap().is_complete());
    assert!(outline.is_ancestor_complete("b"));
    assert!(!outline.is_ancestor_complete("a"));

    outline.uncomplete_rows(&ids(&["a"])).unwrap();
    assert!(!outline.is_ancestor_complete("b"));
    assert!(!outline.row("b").unwrap().is_complete());

    outline.complete_rows(&ids(&["a"])).unwrap();
    assert!(outline.is_ancestor_complete("b"));
    assert!(!outline.row("b").unwrap().is_complete());
}

#[test]
fn split_moves_tail_children_and_topic_images() {
    let mut outline = outline_with(&[("r", None), ("c1", Some("r")), ("c2", Some("r"))]);
    outline
        .import_row_text(
            "r",
            Some("Hello World".to_string()),
            Some("kept note".to_string()),
            vec![
                Image::new(EntityId::image(1, "o", "r", "early"), false, 2, vec![1]),
                Image::new(EntityId::image(1, "o", "r", "late"), false, 7, vec![2]),
                Image::new(EntityId::image(1, "o", "r", "noted"), true, 8, vec![3]),
            ],
        )
        .unwrap();

    let edits = outline.split_row("r", 5, "tail").unwrap();
    assert_tree_is_sound(&outline);

    let head = outline.row("r").unwrap();
    assert_eq!(head.topic(), Some("Hello"));
    assert_eq!(head.note(), Some("kept note"));
    assert!(head.row_order().is_empty());

    let tail = outline.row("tail").unwrap();
    assert_eq!(tail.topic(), Some(" World"));
    assert_eq!(tail.note(), None);
    assert_eq!(tail.row_order(), ["c1", "c2"]);
    assert_eq!(outline.root_order(), ["r", "tail"]);

    let head_images = outline
        .images_of("r")
        .iter()
        .map(|image| image.image_uuid().to_string())
        .collect::<Vec<_>>();
    assert_eq!(head_images, ["early", "noted"]);
    let tail_images = outline.images_of("tail");
    assert_eq!(tail_images.len(), 1);
    assert_eq!(tail_images[0].image_uuid(), "late");
    assert_eq!(tail_images[0].offset, 2);
    assert_eq!(tail_images[0].id.row_uuid(), Some("tail"));

    outline.revert(&edits).unwrap();
    assert_tree_is_sound(&outline);
    assert_eq!(outline.row("r").unwrap().topic(), Some("Hello World"));
    assert_eq!(outline.row("r").unwrap().row_order(), ["c1", "c2"]);
    assert_eq!(outline.images_of("r").len(), 3);
    assert!(outline.row("tail").is_none());
}

#[test]
fn split_past_the_topic_end_is_unavailable() {
    let mut outline = outline_with(&[("r", None)]);
    assert!(outline.is_split_row_unavailable("r", 2));
    assert!(!outline.is_split_row_unavailable("r", 1));
    assert_eq!(
        outline.split_row("r", 2, "x"),
        Err(OutlineError::Unavailable(OperationKind::SplitRow))
    );
}

#[test]
fn indent_and_outdent_respect_their_boundaries() {
    let mut outline = outline_with(&[("a", None), ("b", None), ("c", Some("b"))]);

    assert!(outline.is_indent_rows_unavailable(&ids(&["a"])));
    assert!(outline.is_indent_rows_unavailable(&ids(&["c"])));
    assert!(outline.is_outdent_rows_unavailable(&ids(&["a"])));
    assert!(!outline.is_outdent_rows_unavailable(&ids(&["c"])));
    assert_eq!(
        outline.indent_rows(&ids(&["a", "b"])),
        Err(OutlineError::Unavailable(OperationKind::IndentRows))
    );
    assert_eq!(outline.root_order(), ["a", "b"]);

    outline.indent_rows(&ids(&["b"])).unwrap();
    assert_eq!(outline.row("a").unwrap().row_order(), ["b"]);
    assert_eq!(outline.row("b").unwrap().row_order(), ["c"]);

    outline.outdent_rows(&ids(&["b"])).unwrap();
    assert_eq!(outline.root_order(), ["a", "b"]);
    assert_eq!(outline.row("b").unwrap().row_order(), ["c"]);
    assert_tree_is_sound(&outline);
}

#[test]
fn moving_a_row_into_itself_is_rejected() {
    let mut outline = outline_with(&[("a", None), ("b", Some("a"))]);
    assert!(outline.is_move_rows_unavailable(&ids(&["a"]), &Container::from("b"), 0));
    assert!(outline.is_move_rows_unavailable(&ids(&["a"]), &Container::from("a"), 0));
    assert!(outline.is_move_rows_unavailable(&ids(&["b"]), &Container::Root, 5));
    assert_eq!(
        outline.move_rows(&ids(&["a"]), &Container::from("b"), 0),
        Err(OutlineError::Unavailable(OperationKind::MoveRows))
    );
    assert_tree_is_sound(&outline);
}

#[test]
fn unknown_rows_are_reported_by_id() {
    let mut outline = outline_with(&[("a", None)]);
    assert_eq!(
        outline.delete_rows(&ids(&["ghost"])),
        Err(OutlineError::RowNotFound("ghost".to_string()))
    );
}

#[test]
fn paged_out_outlines_refuse_row_edits_but_keep_tags() {
    let mut outline = outline_with(&[("a", None)]);
    let set = outline.unload();
    assert_eq!(set.rows.len(), 1);
    assert!(!outline.is_loaded());

    assert!(matches!(
        outline.create_row_after(None, Row::with_id("b", None, None)),
        Err(OutlineError::NotLoaded(_))
    ));
    outline.add_tag("tag-1").unwrap();
    assert!(outline.has_tag("tag-1"));

    let report = outline.load(set);
    assert!(report.is_clean());
    assert_eq!(outline.root_order(), ["a"]);
}

#[test]
fn row_json_uses_sync_field_names_and_defaults() {
    let row = row_from_json(r#"{"id":"r","syncID":"s-1","rowOrder":["x"]}"#);
    assert_eq!(row.sync_id(), Some("s-1"));
    assert!(row.is_expanded());
    assert!(!row.is_complete());
    assert_eq!(row.topic(), None);

    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["syncID"], "s-1");
    assert_eq!(json["isExpanded"], true);
    assert_eq!(json["rowOrder"][0], "x");
}

#[test]
fn copied_groups_survive_the_clipboard() {
    let mut outline = outline_with(&[("a", None), ("b", Some("a"))]);
    outline
        .import_row_text(
            "b",
            Some("pic".to_string()),
            None,
            vec![Image::new(EntityId::image(1, "o", "b", "img"), false, 3, vec![9])],
        )
        .unwrap();
    let groups = outline.copy_rows(&ids(&["a", "b"])).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);

    let clipboard = serde_json::to_string(&groups).unwrap();
    let restored: Vec<RowGroup> = serde_json::from_str(&clipboard).unwrap();
    assert_eq!(restored[0].rows[0].id(), "a");
    assert_eq!(restored[0].images.len(), 1);

    outline.paste_rows(&restored, None).unwrap();
    assert_eq!(outline.root_order().len(), 2);
    assert_eq!(outline.root_order()[1], "a");
    let pasted = &outline.root_order()[0];
    assert_ne!(pasted, "a");
    let pasted_child = &outline.row(pasted).unwrap().row_order()[0];
    assert_eq!(outline.row(pasted_child).unwrap().topic(), Some("pic"));
    assert_eq!(outline.images_of(pasted_child).len(), 1);
    assert_tree_is_sound(&outline);
}
