//! Undoable command layer over the outline aggregate.
//!
//! # Responsibility
//! - Apply one `Operation` inside one change batch and report the shadow
//!   table diff.
//! - Invert a performed command exactly from its recorded edits.
//!
//! # Invariants
//! - A command alternates strictly between `Unperformed` and `Performed`.
//! - A command only inverts while the outline is still at the edit
//!   generation it left behind.
//!
//! # See also
//! - `history` for undo/redo stacks.

pub mod history;
pub mod operation;

use crate::model::edit::RowEdit;
use crate::model::entity_id::EntityId;
use crate::model::outline::{Outline, OutlineError};
use crate::shadow::ShadowTableChanges;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use history::{CommandHistory, CommandOutcome, HISTORY_MAX_ENTRIES};
pub use operation::Operation;

/// Result type for command APIs.
pub type CommandResult<T> = Result<T, CommandError>;

/// Lifecycle state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Unperformed,
    Performed,
}

/// Command-layer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Outline(OutlineError),
    /// Perform on a performed command or invert on an unperformed one.
    InvalidState {
        expected: CommandState,
        actual: CommandState,
    },
    /// The outline moved past the state this command produced.
    OutOfOrder { expected: u64, actual: u64 },
    /// Command was built for a different outline.
    OutlineMismatch { expected: EntityId, actual: EntityId },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outline(err) => write!(f, "{err}"),
            Self::InvalidState { expected, actual } => {
                write!(f, "command is {actual:?}, expected {expected:?}")
            }
            Self::OutOfOrder { expected, actual } => write!(
                f,
                "outline changed since command ran: generation {actual}, expected {expected}"
            ),
            Self::OutlineMismatch { expected, actual } => {
                write!(f, "command targets outline {expected}, got {actual}")
            }
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Outline(err) => Some(err),
            Self::InvalidState { .. } | Self::OutOfOrder { .. } | Self::OutlineMismatch { .. } => {
                None
            }
        }
    }
}

impl From<OutlineError> for CommandError {
    fn from(value: OutlineError) -> Self {
        Self::Outline(value)
    }
}

/// One undoable edit bound to an outline.
#[derive(Debug, Clone)]
pub struct Command {
    outline_id: EntityId,
    operation: Operation,
    edits: Vec<RowEdit>,
    state: CommandState,
    new_cursor_index: Option<usize>,
    generation_before: u64,
    generation_after: u64,
}

impl Command {
    pub fn new(outline: &Outline, operation: Operation) -> Self {
        Self {
            outline_id: outline.id().clone(),
            operation,
            edits: Vec::new(),
            state: CommandState::Unperformed,
            new_cursor_index: None,
            generation_before: 0,
            generation_after: 0,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn outline_id(&self) -> &EntityId {
        &self.outline_id
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Edits recorded by the last perform; empty while unperformed.
    pub fn edits(&self) -> &[RowEdit] {
        &self.edits
    }

    /// Shadow table index the cursor should move to after the last
    /// perform or invert.
    pub fn new_cursor_index(&self) -> Option<usize> {
        self.new_cursor_index
    }

    /// Applies the operation and refreshes the shadow table.
    ///
    /// # Errors
    /// - `InvalidState` when already performed.
    /// - `Outline(..)` when the operation is unavailable; the outline is
    ///   left unchanged.
    pub fn perform(&mut self, outline: &mut Outline) -> CommandResult<ShadowTableChanges> {
        self.check_outline(outline)?;
        self.check_state(CommandState::Unperformed)?;

        let generation_before = outline.generation();
        let edits = self.operation.apply(outline).map_err(|err| {
            warn!(
                "event=command_perform module=command status=error operation={} error={}",
                self.operation.kind(),
                err
            );
            CommandError::from(err)
        })?;
        let changes = outline.refresh_shadow_table(&edits);

        self.generation_before = generation_before;
        self.generation_after = outline.generation();
        self.edits = edits;
        self.state = CommandState::Performed;
        self.new_cursor_index = self
            .operation
            .cursor_row()
            .and_then(|row_id| outline.shadow_table_index(row_id));
        info!(
            "event=command_perform module=command status=ok operation={} edits={}",
            self.operation.kind(),
            self.edits.len()
        );
        Ok(changes)
    }

    /// Reverts the recorded edits and refreshes the shadow table.
    ///
    /// # Errors
    /// - `InvalidState` when not performed.
    /// - `OutOfOrder` when the outline was edited after this command.
    pub fn invert(&mut self, outline: &mut Outline) -> CommandResult<ShadowTableChanges> {
        self.check_outline(outline)?;
        self.check_state(CommandState::Performed)?;
        if outline.generation() != self.generation_after {
            return Err(CommandError::OutOfOrder {
                expected: self.generation_after,
                actual: outline.generation(),
            });
        }

        outline.revert(&self.edits)?;
        outline.restore_generation(self.generation_before);
        let changes = outline.refresh_shadow_table(&self.edits);

        self.new_cursor_index = self
            .edits
            .iter()
            .filter_map(RowEdit::row_id)
            .find_map(|row_id| outline.shadow_table_index(row_id));
        self.edits.clear();
        self.state = CommandState::Unperformed;
        info!(
            "event=command_invert module=command status=ok operation={}",
            self.operation.kind()
        );
        Ok(changes)
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

    fn check_state(&self, expected: CommandState) -> CommandResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CommandError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, CommandError, CommandState, Operation};
    use crate::model::outline::test_support::outline_with;
    use crate::model::outline::{OperationKind, OutlineError};
    use crate::model::row::Row;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn perform_then_invert_restores_rows() {
        let mut outline = outline_with(&[("a", None), ("b", Some("a")), ("c", None)]);
        let before = outline.row_set();
        let mut command = Command::new(&outline, Operation::DeleteRows { row_ids: ids(&["a"]) });

        let changes = command.perform(&mut outline).unwrap();
        assert_eq!(changes.deletes, vec![0, 1]);
        assert_eq!(command.state(), CommandState::Performed);

        let changes = command.invert(&mut outline).unwrap();
        assert_eq!(changes.inserts, vec![0, 1]);
        assert_eq!(outline.row_set(), before);
        assert_eq!(command.new_cursor_index(), Some(0));
    }

    #[test]
    fn state_violations_are_rejected() {
        let mut outline = outline_with(&[("a", None)]);
        let mut command = Command::new(&outline, Operation::CollapseRows { row_ids: ids(&["a"]) });
        assert!(matches!(
            command.invert(&mut outline),
            Err(CommandError::InvalidState { .. })
        ));
        assert_eq!(
            command.perform(&mut outline),
            Err(CommandError::Outline(OutlineError::Unavailable(
                OperationKind::CollapseRows
            )))
        );

        let mut create = Command::new(
            &outline,
            Operation::CreateRowAfter {
                after: Some("a".to_string()),
                row: Row::with_id("n", None, None),
            },
        );
        create.perform(&mut outline).unwrap();
        assert_eq!(create.new_cursor_index(), Some(1));
        assert!(matches!(
            create.perform(&mut outline),
            Err(CommandError::InvalidState { .. })
        ));
    }

    #[test]
    fn invert_after_later_edit_is_out_of_order() {
        let mut outline = outline_with(&[("a", None), ("b", None)]);
        let mut first = Command::new(&outline, Operation::CompleteRows { row_ids: ids(&["a"]) });
        let mut second = Command::new(&outline, Operation::CompleteRows { row_ids: ids(&["b"]) });
        first.perform(&mut outline).unwrap();
        second.perform(&mut outline).unwrap();

        assert!(matches!(
            first.invert(&mut outline),
            Err(CommandError::OutOfOrder { .. })
        ));
        second.invert(&mut outline).unwrap();
        first.invert(&mut outline).unwrap();
        assert!(!outline.row("a").unwrap().is_complete());
    }

    #[test]
    fn command_for_other_outline_is_rejected() {
        let mut outline = outline_with(&[("a", None)]);
        let other = crate::model::outline::Outline::create(1, "f", None);
        let mut command = Command::new(&other, Operation::DeleteAllRows);
        assert!(matches!(
            command.perform(&mut outline),
            Err(CommandError::OutlineMismatch { .. })
        ));
    }
}
