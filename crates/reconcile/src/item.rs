use baixa_core::{InstallmentId, Transaction};
use baixa_import::MatchCandidate;
use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// A sole open candidate at or above this score is pre-selected.
pub const AUTO_SELECT_THRESHOLD: f64 = 0.8;
/// A pre-selected candidate at or above this score is also pre-confirmed.
pub const AUTO_CONFIRM_THRESHOLD: f64 = 0.9;

/// Initial review state proposed for a freshly scored line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoSelection {
    pub installment_id: Option<InstallmentId>,
    pub confirmed: bool,
}

/// Pre-selects only when exactly one unsettled candidate exists and it scores
/// high enough. Settled candidates are never auto-selected.
pub fn auto_select(candidates: &[MatchCandidate]) -> AutoSelection {
    let mut open = candidates.iter().filter(|c| !c.was_already_settled);
    match (open.next(), open.next()) {
        (Some(only), None) if only.score >= AUTO_SELECT_THRESHOLD => AutoSelection {
            installment_id: Some(only.installment_id),
            confirmed: only.score >= AUTO_CONFIRM_THRESHOLD,
        },
        _ => AutoSelection::default(),
    }
}

/// One statement line, its candidates and the reviewer's decision on it.
///
/// Fields are private: every change goes through the batch so that selection
/// stays one of the candidates and confirmation implies a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    transaction: Transaction,
    candidates: Vec<MatchCandidate>,
    selected_installment_id: Option<InstallmentId>,
    confirmed: bool,
    #[serde(default)]
    override_settlement: bool,
    #[serde(default)]
    duplicate_identifier: bool,
    #[serde(default)]
    prior_settlement: Option<InstallmentId>,
}

impl ReconciliationItem {
    /// A line with its ranked candidates and the auto-selection applied.
    pub fn scored(transaction: Transaction, candidates: Vec<MatchCandidate>) -> Self {
        let auto = auto_select(&candidates);
        Self {
            transaction,
            candidates,
            selected_installment_id: auto.installment_id,
            confirmed: auto.confirmed,
            override_settlement: false,
            duplicate_identifier: false,
            prior_settlement: None,
        }
    }

    /// A line whose identifier already appears on a settled installment.
    pub fn duplicate(transaction: Transaction, prior_settlement: InstallmentId) -> Self {
        Self {
            transaction,
            candidates: Vec::new(),
            selected_installment_id: None,
            confirmed: false,
            override_settlement: false,
            duplicate_identifier: true,
            prior_settlement: Some(prior_settlement),
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn candidates(&self) -> &[MatchCandidate] {
        &self.candidates
    }

    pub fn candidate(&self, id: InstallmentId) -> Option<&MatchCandidate> {
        self.candidates.iter().find(|c| c.installment_id == id)
    }

    pub fn selected_installment_id(&self) -> Option<InstallmentId> {
        self.selected_installment_id
    }

    pub fn selected_candidate(&self) -> Option<&MatchCandidate> {
        self.selected_installment_id.and_then(|id| self.candidate(id))
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn override_settlement(&self) -> bool {
        self.override_settlement
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_identifier
    }

    /// The installment an earlier run settled with this line.
    pub fn prior_settlement(&self) -> Option<InstallmentId> {
        self.prior_settlement
    }

    /// Would be written on commit, conflicts aside.
    pub fn is_committable(&self) -> bool {
        self.confirmed && self.selected_installment_id.is_some() && !self.duplicate_identifier
    }

    /// Changing the target drops any previous confirmation.
    pub(crate) fn select(
        &mut self,
        row: usize,
        installment: InstallmentId,
        override_settlement: bool,
    ) -> Result<(), SelectionError> {
        if self.duplicate_identifier {
            return Err(SelectionError::DuplicateRow { row });
        }
        let candidate = self
            .candidate(installment)
            .ok_or(SelectionError::NotACandidate { row, installment })?;
        let override_settlement = override_settlement && candidate.was_already_settled;

        if self.selected_installment_id != Some(installment) {
            self.confirmed = false;
        }
        self.selected_installment_id = Some(installment);
        self.override_settlement = override_settlement;
        if self.confirmed && self.needs_override() {
            self.confirmed = false;
        }
        Ok(())
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selected_installment_id = None;
        self.confirmed = false;
        self.override_settlement = false;
    }

    pub(crate) fn confirm(&mut self, row: usize) -> Result<(), SelectionError> {
        if self.duplicate_identifier {
            return Err(SelectionError::DuplicateRow { row });
        }
        let Some(installment) = self.selected_installment_id else {
            return Err(SelectionError::NothingSelected { row });
        };
        if self.needs_override() {
            return Err(SelectionError::SettledWithoutOverride { row, installment });
        }
        self.confirmed = true;
        Ok(())
    }

    pub(crate) fn unconfirm(&mut self) {
        self.confirmed = false;
    }

    /// Turns the line into a duplicate of the installment it just settled.
    pub(crate) fn mark_settled(&mut self, installment: InstallmentId) {
        self.candidates.clear();
        self.selected_installment_id = None;
        self.confirmed = false;
        self.override_settlement = false;
        self.duplicate_identifier = true;
        self.prior_settlement = Some(installment);
    }

    /// Checks the invariants a deserialized item may have lost.
    pub(crate) fn validate(&self, row: usize) -> Result<(), SelectionError> {
        if self.duplicate_identifier {
            if !self.candidates.is_empty()
                || self.selected_installment_id.is_some()
                || self.confirmed
            {
                return Err(SelectionError::InconsistentDuplicate { row });
            }
            return Ok(());
        }
        match self.selected_installment_id {
            None if self.confirmed => Err(SelectionError::NothingSelected { row }),
            None => Ok(()),
            Some(installment) => {
                if self.candidate(installment).is_none() {
                    return Err(SelectionError::NotACandidate { row, installment });
                }
                if self.confirmed && self.needs_override() {
                    return Err(SelectionError::SettledWithoutOverride { row, installment });
                }
                Ok(())
            }
        }
    }

    fn needs_override(&self) -> bool {
        self.selected_candidate()
            .is_some_and(|c| c.was_already_settled && !self.override_settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baixa_core::StatementDate;
    use chrono::NaiveDate;

    fn candidate(id: i64, score: f64, settled: bool) -> MatchCandidate {
        MatchCandidate {
            installment_id: InstallmentId(id),
            score,
            amount_diff_minor: 0,
            date_diff_days: 0,
            was_already_settled: settled,
        }
    }

    fn tx() -> Transaction {
        Transaction {
            date: StatementDate::Calendar(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()),
            description: "PAGAMENTO FORNECEDOR ACME LTDA".to_string(),
            amount_minor: 15_000,
            payment_method_tag: None,
            external_id: Some("TX123".to_string()),
        }
    }

    #[test]
    fn sole_high_candidate_is_confirmed() {
        let auto = auto_select(&[candidate(1, 0.96, false)]);
        assert_eq!(auto.installment_id, Some(InstallmentId(1)));
        assert!(auto.confirmed);
    }

    #[test]
    fn sole_medium_candidate_is_selected_only() {
        let auto = auto_select(&[candidate(1, 0.85, false)]);
        assert_eq!(auto.installment_id, Some(InstallmentId(1)));
        assert!(!auto.confirmed);
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert!(auto_select(&[candidate(1, 0.9, false)]).confirmed);
        assert_eq!(auto_select(&[candidate(1, 0.8, false)]).installment_id, Some(InstallmentId(1)));
        assert_eq!(auto_select(&[candidate(1, 0.79, false)]), AutoSelection::default());
    }

    #[test]
    fn two_open_candidates_stay_unselected() {
        let auto = auto_select(&[candidate(1, 0.99, false), candidate(2, 0.5, false)]);
        assert_eq!(auto, AutoSelection::default());
    }

    #[test]
    fn settled_candidates_are_ignored() {
        assert_eq!(auto_select(&[candidate(1, 1.0, true)]), AutoSelection::default());
        let auto = auto_select(&[candidate(1, 1.0, true), candidate(2, 0.92, false)]);
        assert_eq!(auto.installment_id, Some(InstallmentId(2)));
        assert!(auto.confirmed);
    }

    #[test]
    fn duplicate_item_is_inert() {
        let mut item = ReconciliationItem::duplicate(tx(), InstallmentId(4));
        assert!(item.is_duplicate());
        assert!(item.candidates().is_empty());
        assert!(!item.is_committable());
        assert_eq!(item.prior_settlement(), Some(InstallmentId(4)));
        assert_eq!(item.confirm(0), Err(SelectionError::DuplicateRow { row: 0 }));
        assert_eq!(
            item.select(0, InstallmentId(4), false),
            Err(SelectionError::DuplicateRow { row: 0 })
        );
    }

    #[test]
    fn select_requires_a_candidate() {
        let mut item = ReconciliationItem::scored(tx(), vec![candidate(1, 0.5, false)]);
        assert_eq!(
            item.select(3, InstallmentId(2), false),
            Err(SelectionError::NotACandidate { row: 3, installment: InstallmentId(2) })
        );
        item.select(3, InstallmentId(1), false).unwrap();
        assert_eq!(item.selected_installment_id(), Some(InstallmentId(1)));
        assert!(!item.is_confirmed());
    }

    #[test]
    fn settled_target_needs_override_to_confirm() {
        let mut item = ReconciliationItem::scored(tx(), vec![candidate(1, 0.95, true)]);
        assert_eq!(item.selected_installment_id(), None);

        item.select(0, InstallmentId(1), false).unwrap();
        assert_eq!(
            item.confirm(0),
            Err(SelectionError::SettledWithoutOverride { row: 0, installment: InstallmentId(1) })
        );

        item.select(0, InstallmentId(1), true).unwrap();
        item.confirm(0).unwrap();
        assert!(item.is_committable());
        assert!(item.override_settlement());

        // dropping the override on the same target also drops the confirmation
        item.select(0, InstallmentId(1), false).unwrap();
        assert!(!item.is_confirmed());
    }

    #[test]
    fn override_is_ignored_for_open_candidates() {
        let mut item = ReconciliationItem::scored(tx(), vec![candidate(1, 0.5, false)]);
        item.select(0, InstallmentId(1), true).unwrap();
        assert!(!item.override_settlement());
    }

    #[test]
    fn reselecting_drops_confirmation() {
        let mut item = ReconciliationItem::scored(
            tx(),
            vec![candidate(1, 0.95, false), candidate(2, 0.7, true)],
        );
        assert!(item.is_confirmed());
        item.select(0, InstallmentId(1), false).unwrap();
        assert!(item.is_confirmed());
        item.select(0, InstallmentId(2), true).unwrap();
        assert!(!item.is_confirmed());
        item.clear_selection();
        assert_eq!(item.selected_installment_id(), None);
        assert!(!item.override_settlement());
    }

    #[test]
    fn settled_item_becomes_inert_duplicate() {
        let mut item = ReconciliationItem::scored(tx(), vec![candidate(1, 0.96, false)]);
        assert!(item.is_committable());
        item.mark_settled(InstallmentId(1));
        assert!(item.is_duplicate());
        assert!(!item.is_committable());
        assert_eq!(item.prior_settlement(), Some(InstallmentId(1)));
        assert!(item.validate(0).is_ok());
    }

    #[test]
    fn validate_catches_broken_invariants() {
        let item = ReconciliationItem::scored(tx(), vec![candidate(1, 0.95, false)]);
        assert!(item.validate(0).is_ok());

        let mut broken = item.clone();
        broken.selected_installment_id = Some(InstallmentId(9));
        assert!(matches!(broken.validate(0), Err(SelectionError::NotACandidate { .. })));

        let mut broken = item.clone();
        broken.selected_installment_id = None;
        assert_eq!(broken.validate(2), Err(SelectionError::NothingSelected { row: 2 }));

        let mut broken = ReconciliationItem::duplicate(tx(), InstallmentId(1));
        broken.candidates.push(candidate(1, 0.9, true));
        assert_eq!(broken.validate(1), Err(SelectionError::InconsistentDuplicate { row: 1 }));
    }

    #[test]
    fn serializes_for_review() {
        let item = ReconciliationItem::scored(tx(), vec![candidate(1, 0.96, false)]);
        let json = serde_json::to_string(&item).unwrap();
        let back: ReconciliationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
