use baixa_core::InstallmentId;
use baixa_storage::StoreError;
use thiserror::Error;

use crate::conflict::ConflictReport;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to load reconciliation data: {0}")]
    Lookup(#[from] StoreError),
    #[error("Commit blocked: {0}")]
    Conflicts(ConflictReport),
    #[error("Batch cancelled after {processed} of {total} statement lines")]
    Cancelled { processed: usize, total: usize },
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// A review decision that would break a reconciliation item's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Row {0} does not exist")]
    UnknownRow(usize),
    #[error("Row {row}: statement line was already reconciled earlier and cannot be selected")]
    DuplicateRow { row: usize },
    #[error("Row {row}: installment {installment} is not a candidate for this line")]
    NotACandidate { row: usize, installment: InstallmentId },
    #[error("Row {row}: nothing selected to confirm")]
    NothingSelected { row: usize },
    #[error("Row {row}: installment {installment} is already settled; select it with override")]
    SettledWithoutOverride { row: usize, installment: InstallmentId },
    #[error("Row {row}: duplicate line must have no candidates and no selection")]
    InconsistentDuplicate { row: usize },
}
