use outliner_core::{
    Command, CommandHistory, CommandState, Container, EntityId, Image, Operation, Outline, Row,
    RowSet, RowStrings,
};

/// Tree used by every case:
///
/// ```text
/// a "Hello World" (note)
///   b
///   c (complete)
/// d
/// e (collapsed)
///   f
/// ```
fn fixture() -> Outline {
    let mut outline = Outline::new(EntityId::outline(1, "f", "o"), Some("fixture".to_string()));
    for (id, parent) in [
        ("a", None),
        ("b", Some("a")),
        ("c", Some("a")),
        ("d", None),
        ("e", None),
        ("f", Some("e")),
    ] {
        let container = parent.map_or(Container::Root, Container::from);
        outline
            .append_row(Row::with_id(id, Some(id.to_uppercase()), None), &container)
            .unwrap();
    }
    outline
        .update_row_strings(
            "a",
            RowStrings::Both(Some("Hello World".to_string()), Some("note".to_string())),
        )
        .unwrap();
    outline.complete_rows(&ids(&["c"])).unwrap();
    outline.collapse_rows(&ids(&["e"])).unwrap();
    outline.add_tag("t1").unwrap();
    outline.rebuild_shadow_table();
    outline
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[derive(Debug, PartialEq)]
struct Snapshot {
    rows: RowSet,
    tags: Vec<String>,
    table: Vec<String>,
}

fn snapshot(outline: &Outline) -> Snapshot {
    Snapshot {
        rows: outline.row_set(),
        tags: outline.tag_ids().to_vec(),
        table: outline.shadow_table().unwrap().rows().to_vec(),
    }
}

fn every_operation(outline: &Outline) -> Vec<Operation> {
    let copied = outline.copy_rows(&ids(&["a"])).unwrap();
    vec![
        Operation::CreateRowAfter {
            after: Some("d".to_string()),
            row: Row::with_id("n1", Some("New".to_string()), None),
        },
        Operation::CreateRowBefore {
            before: "d".to_string(),
            row: Row::with_id("n2", None, None),
        },
        Operation::CreateRowInside {
            parent: "d".to_string(),
            row: Row::with_id("n3", None, None),
        },
        Operation::DeleteRows {
            row_ids: ids(&["b", "d"]),
        },
        Operation::DeleteAllRows,
        Operation::IndentRows {
            row_ids: ids(&["d"]),
        },
        Operation::OutdentRows {
            row_ids: ids(&["b"]),
        },
        Operation::CompleteRows {
            row_ids: ids(&["a"]),
        },
        Operation::UncompleteRows {
            row_ids: ids(&["c"]),
        },
        Operation::CreateNotes {
            row_ids: ids(&["b"]),
        },
        Operation::DeleteNotes {
            row_ids: ids(&["a"]),
        },
        Operation::ExpandRows {
            row_ids: ids(&["e"]),
        },
        Operation::CollapseRows {
            row_ids: ids(&["a"]),
        },
        Operation::ExpandAll {
            containers: vec![Container::Root],
        },
        Operation::CollapseAll {
            containers: vec![Container::Root],
        },
        Operation::split_row("a", 5),
        Operation::MoveRows {
            row_ids: ids(&["d"]),
            to: Container::Root,
            index: 0,
        },
        Operation::paste_rows(outline, &copied, Some("d".to_string())),
        Operation::UpdateText {
            row_id: "b".to_string(),
            strings: RowStrings::TopicMarkdown(Some("Changed".to_string())),
        },
        Operation::ImportText {
            row_id: "d".to_string(),
            topic: Some("Imported".to_string()),
            note: Some("with picture".to_string()),
            images: vec![Image::new(
                EntityId::image(1, "o", "d", "img-1"),
                true,
                4,
                vec![1, 2, 3],
            )],
        },
        Operation::AddTag {
            tag_id: "t2".to_string(),
        },
        Operation::RemoveTag {
            tag_id: "t1".to_string(),
        },
    ]
}

#[test]
fn every_operation_inverts_to_the_exact_prior_state_and_redoes() {
    let cases = every_operation(&fixture()).len();
    for case in 0..cases {
        let mut outline = fixture();
        let operation = every_operation(&outline).swap_remove(case);
        let kind = operation.kind();
        let before = snapshot(&outline);

        let mut command = Command::new(&outline, operation);
        command.perform(&mut outline).unwrap();
        outline.verify_integrity().unwrap();
        assert!(!command.edits().is_empty(), "{kind} recorded no edits");
        let performed = snapshot(&outline);
        assert_ne!(performed, before, "{kind} changed nothing");

        command.invert(&mut outline).unwrap();
        outline.verify_integrity().unwrap();
        assert_eq!(snapshot(&outline), before, "{kind} did not invert exactly");
        assert_eq!(command.state(), CommandState::Unperformed);

        command.perform(&mut outline).unwrap();
        assert_eq!(snapshot(&outline), performed, "{kind} redo diverged");
    }
}

#[test]
fn unavailable_operations_leave_the_outline_untouched() {
    let mut outline = fixture();
    let before = snapshot(&outline);
    let generation = outline.generation();

    for operation in [
        Operation::IndentRows {
            row_ids: ids(&["a"]),
        },
        Operation::OutdentRows {
            row_ids: ids(&["d"]),
        },
        Operation::CompleteRows {
            row_ids: ids(&["c"]),
        },
        Operation::ExpandRows {
            row_ids: ids(&["a"]),
        },
        Operation::DeleteNotes {
            row_ids: ids(&["b"]),
        },
        Operation::RemoveTag {
            tag_id: "missing".to_string(),
        },
    ] {
        assert!(operation.is_unavailable(&outline), "{:?}", operation.kind());
        let mut command = Command::new(&outline, operation);
        assert!(command.perform(&mut outline).is_err());
        assert_eq!(command.state(), CommandState::Unperformed);
    }
    assert_eq!(snapshot(&outline), before);
    assert_eq!(outline.generation(), generation);
}

#[test]
fn history_walks_back_and_forth_through_a_session() {
    let mut outline = fixture();
    let start = snapshot(&outline);
    let mut history = CommandHistory::new(outline.id().clone());

    history
        .run(
            &mut outline,
            Operation::IndentRows {
                row_ids: ids(&["d"]),
            },
        )
        .unwrap();
    let indented = snapshot(&outline);
    history.run(&mut outline, Operation::split_row("a", 5)).unwrap();
    history
        .run(
            &mut outline,
            Operation::DeleteRows {
                row_ids: ids(&["e"]),
            },
        )
        .unwrap();
    let end = snapshot(&outline);

    history.undo(&mut outline).unwrap().unwrap();
    history.undo(&mut outline).unwrap().unwrap();
    assert_eq!(snapshot(&outline), indented);
    history.undo(&mut outline).unwrap().unwrap();
    assert_eq!(snapshot(&outline), start);
    assert!(history.undo(&mut outline).unwrap().is_none());

    for _ in 0..3 {
        history.redo(&mut outline).unwrap().unwrap();
    }
    assert_eq!(snapshot(&outline), end);
    assert!(!history.can_redo());
}

#[test]
fn split_redo_recreates_the_same_row_id() {
    let mut outline = fixture();
    let mut history = CommandHistory::new(outline.id().clone());
    history.run(&mut outline, Operation::split_row("a", 5)).unwrap();
    let new_id = outline.root_order()[1].clone();
    assert_eq!(outline.row(&new_id).unwrap().topic(), Some(" World"));

    history.undo(&mut outline).unwrap();
    assert!(outline.row(&new_id).is_none());
    history.redo(&mut outline).unwrap();
    assert_eq!(outline.root_order()[1], new_id);
    assert_eq!(outline.row(&new_id).unwrap().row_order(), ["b", "c"]);
}

#[test]
fn command_history_rejects_commands_once_the_outline_moved_on() {
    let mut outline = fixture();
    let mut first = Command::new(
        &outline,
        Operation::CompleteRows {
            row_ids: ids(&["b"]),
        },
    );
    first.perform(&mut outline).unwrap();
    outline.delete_rows(&ids(&["d"])).unwrap();
    outline.rebuild_shadow_table();

    assert!(matches!(
        first.invert(&mut outline),
        Err(outliner_core::CommandError::OutOfOrder { .. })
    ));
    assert!(outline.row("b").unwrap().is_complete());
}
