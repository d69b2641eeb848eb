//! Bounded undo/redo stacks for one outline.
//!
//! # Invariants
//! - Running a new command clears the redo stack.
//! - The undo stack never exceeds its configured limit; the oldest entry
//!   is dropped first.
//! - A failed undo or redo leaves both stacks unchanged.

use super::{Command, CommandError, CommandResult, Operation};
use crate::model::entity_id::EntityId;
use crate::model::outline::Outline;
use crate::shadow::ShadowTableChanges;
use log::debug;
use std::collections::VecDeque;

/// Default undo depth.
pub const HISTORY_MAX_ENTRIES: usize = 100;

/// What a history step changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub changes: ShadowTableChanges,
    pub new_cursor_index: Option<usize>,
}

#[derive(Debug)]
pub struct CommandHistory {
    outline_id: EntityId,
    undo: VecDeque<Command>,
    redo: Vec<Command>,
    max_entries: usize,
}

impl CommandHistory {
    pub fn new(outline_id: EntityId) -> Self {
        Self::with_limit(outline_id, HISTORY_MAX_ENTRIES)
    }

    pub fn with_limit(outline_id: EntityId, max_entries: usize) -> Self {
        Self {
            outline_id,
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn outline_id(&self) -> &EntityId {
        &self.outline_id
    }

    /// Performs `operation` and records it for undo.
    ///
    /// Operations that change nothing are not recorded.
    pub fn run(&mut self, outline: &mut Outline, operation: Operation) -> CommandResult<CommandOutcome> {
        self.check_outline(outline)?;
        let mut command = Command::new(outline, operation);
        let changes = command.perform(outline)?;
        let outcome = CommandOutcome {
            changes,
            new_cursor_index: command.new_cursor_index(),
        };
        if command.edits().is_empty() {
            return Ok(outcome);
        }

        self.redo.clear();
        self.undo.push_back(command);
        while self.undo.len() > self.max_entries {
            self.undo.pop_front();
            debug!(
                "event=history_trim module=command status=ok outline={} limit={}",
                self.outline_id, self.max_entries
            );
        }
        Ok(outcome)
    }

    /// Inverts the latest command. `None` when there is nothing to undo.
    pub fn undo(&mut self, outline: &mut Outline) -> CommandResult<Option<CommandOutcome>> {
        self.check_outline(outline)?;
        let Some(mut command) = self.undo.pop_back() else {
            return Ok(None);
        };
        match command.invert(outline) {
            Ok(changes) => {
                let outcome = CommandOutcome {
                    changes,
                    new_cursor_index: command.new_cursor_index(),
                };
                self.redo.push(command);
                Ok(Some(outcome))
            }
            Err(err) => {
                self.undo.push_back(command);
                Err(err)
            }
        }
    }

    /// Re-performs the latest undone command. `None` when there is nothing
    /// to redo.
    pub fn redo(&mut self, outline: &mut Outline) -> CommandResult<Option<CommandOutcome>> {
        self.check_outline(outline)?;
        let Some(mut command) = self.redo.pop() else {
            return Ok(None);
        };
        match command.perform(outline) {
            Ok(changes) => {
                let outcome = CommandOutcome {
                    changes,
                    new_cursor_index: command.new_cursor_index(),
                };
                self.undo.push_back(command);
                Ok(Some(outcome))
            }
            Err(err) => {
                self.redo.push(command);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn check_outline(&self, outline: &Outline) -> CommandResult<()> {
        if outline.id() == &self.outline_id {
            Ok(())
        } else {
            Err(CommandError::OutlineMismatch {
                expected: self.outline_id.clone(),
                actual: outline.id().clone(),
            })
        }
    }
}
