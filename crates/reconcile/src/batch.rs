use baixa_core::{InstallmentId, Transaction};

use crate::commit::{CommitReport, CommitStatus};
use crate::conflict::{detect_conflicts, ConflictReport};
use crate::error::{ReconcileError, SelectionError};
use crate::item::ReconciliationItem;

/// The reviewable result of one reconciliation run.
///
/// Owns its items and is the only way to change them; conflicts are
/// recomputed after every change, so [`ReconciliationBatch::conflicts`] is
/// never stale.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationBatch {
    items: Vec<ReconciliationItem>,
    conflicts: ConflictReport,
}

impl ReconciliationBatch {
    pub(crate) fn new(items: Vec<ReconciliationItem>) -> Self {
        let conflicts = detect_conflicts(&items);
        Self { items, conflicts }
    }

    /// Rebuilds a batch from saved items, rejecting any that break an item
    /// invariant.
    pub fn from_items(items: Vec<ReconciliationItem>) -> Result<Self, SelectionError> {
        for (row, item) in items.iter().enumerate() {
            item.validate(row)?;
        }
        Ok(Self::new(items))
    }

    pub fn items(&self) -> &[ReconciliationItem] {
        &self.items
    }

    pub fn item(&self, row: usize) -> Option<&ReconciliationItem> {
        self.items.get(row)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<ReconciliationItem> {
        self.items
    }

    pub fn conflicts(&self) -> &ConflictReport {
        &self.conflicts
    }

    pub fn is_conflicted(&self, row: usize) -> bool {
        self.conflicts.is_conflicted(row)
    }

    pub fn can_commit(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn select(
        &mut self,
        row: usize,
        installment: InstallmentId,
        override_settlement: bool,
    ) -> Result<(), SelectionError> {
        self.item_mut(row)?.select(row, installment, override_settlement)?;
        self.refresh();
        Ok(())
    }

    pub fn clear_selection(&mut self, row: usize) -> Result<(), SelectionError> {
        self.item_mut(row)?.clear_selection();
        self.refresh();
        Ok(())
    }

    pub fn confirm(&mut self, row: usize) -> Result<(), SelectionError> {
        self.item_mut(row)?.confirm(row)?;
        self.refresh();
        Ok(())
    }

    pub fn unconfirm(&mut self, row: usize) -> Result<(), SelectionError> {
        self.item_mut(row)?.unconfirm();
        self.refresh();
        Ok(())
    }

    /// The confirmed work to write, or the conflicts that block it.
    pub fn commit_plan(&self) -> Result<CommitPlan, ReconcileError> {
        if !self.conflicts.is_empty() {
            return Err(ReconcileError::Conflicts(self.conflicts.clone()));
        }
        let items = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_committable())
            .filter_map(|(row, item)| {
                item.selected_installment_id().map(|installment_id| CommitItem {
                    row,
                    transaction: item.transaction().clone(),
                    installment_id,
                    override_settlement: item.override_settlement(),
                })
            })
            .collect();
        Ok(CommitPlan { items })
    }

    /// Marks every row the report shows as written, so a later plan only
    /// holds the rows that failed.
    pub fn record_commit(&mut self, report: &CommitReport) {
        for outcome in &report.outcomes {
            if matches!(outcome.status, CommitStatus::Error(_)) {
                continue;
            }
            if let Some(item) = self.items.get_mut(outcome.row) {
                item.mark_settled(outcome.installment_id);
            }
        }
        self.refresh();
    }

    fn item_mut(&mut self, row: usize) -> Result<&mut ReconciliationItem, SelectionError> {
        self.items.get_mut(row).ok_or(SelectionError::UnknownRow(row))
    }

    fn refresh(&mut self) {
        self.conflicts = detect_conflicts(&self.items);
    }
}

/// One settlement to write.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitItem {
    pub row: usize,
    pub transaction: Transaction,
    pub installment_id: InstallmentId,
    pub override_settlement: bool,
}

/// Confirmed, conflict-free work; only obtainable through
/// [`ReconciliationBatch::commit_plan`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPlan {
    items: Vec<CommitItem>,
}

impl CommitPlan {
    pub fn items(&self) -> &[CommitItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
