//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `outliner_core` linkage.
//! - Build a small outline through the command layer and print its shadow
//!   table, before and after one undo.
//!
//! Pass `--log-dir <absolute path>` to also write core logs.

use outliner_core::{
    default_log_level, init_logging, CommandHistory, Container, EntityId, LogConfig, Operation,
    Outline, Row,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("outliner_core ping={}", outliner_core::ping());
    println!("outliner_core version={}", outliner_core::core_version());

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--log-dir" {
            let Some(dir) = args.next() else {
                eprintln!("--log-dir needs a value");
                return ExitCode::FAILURE;
            };
            if let Err(err) = init_logging(LogConfig::new(default_log_level(), dir)) {
                eprintln!("logging disabled: {err}");
            }
        }
    }

    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let mut outline = Outline::new(EntityId::outline(1, "demo", "outline"), Some("Demo".into()));
    let mut history = CommandHistory::new(outline.id().clone());

    for (id, topic) in [("groceries", "Groceries"), ("milk", "Milk"), ("eggs", "Eggs")] {
        let after = outline.root_order().last().cloned();
        history.run(
            &mut outline,
            Operation::CreateRowAfter {
                after,
                row: Row::with_id(id, Some(topic.to_string()), None),
            },
        )?;
    }
    history.run(
        &mut outline,
        Operation::IndentRows {
            row_ids: vec!["milk".to_string(), "eggs".to_string()],
        },
    )?;
    history.run(
        &mut outline,
        Operation::CompleteRows {
            row_ids: vec!["eggs".to_string()],
        },
    )?;
    print_table("after edits", &outline);

    outline.toggle_filter();
    print_table("hide completed", &outline);
    outline.toggle_filter();

    history.undo(&mut outline)?;
    print_table("after undo", &outline);

    history.run(
        &mut outline,
        Operation::CollapseAll {
            containers: vec![Container::Root],
        },
    )?;
    print_table("collapsed", &outline);
    Ok(())
}

fn print_table(label: &str, outline: &Outline) {
    println!("-- {label}");
    for entry in outline.shadow_table_entries() {
        let Some(row) = outline.row(&entry.row_id) else {
            continue;
        };
        let marker = if row.is_complete() { "x" } else { " " };
        println!(
            "{:>2} {}[{marker}] {}",
            entry.index,
            "  ".repeat(entry.level),
            outline.topic_markdown(&entry.row_id).unwrap_or_default()
        );
    }
}
