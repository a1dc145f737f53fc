use std::collections::BTreeMap;
use std::fmt;

use baixa_core::InstallmentId;

use crate::item::ReconciliationItem;

/// Installments claimed by more than one confirmed line, with the claiming rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    claims: BTreeMap<InstallmentId, Vec<usize>>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn rows_for(&self, id: InstallmentId) -> Option<&[usize]> {
        self.claims.get(&id).map(Vec::as_slice)
    }

    pub fn is_conflicted(&self, row: usize) -> bool {
        self.claims.values().any(|rows| rows.contains(&row))
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstallmentId, &[usize])> {
        self.claims.iter().map(|(id, rows)| (*id, rows.as_slice()))
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} installment(s) claimed by more than one confirmed line",
            self.claims.len()
        )?;
        for (id, rows) in &self.claims {
            let rows: Vec<String> = rows.iter().map(usize::to_string).collect();
            write!(f, "; installment {id}: rows {}", rows.join(", "))?;
        }
        Ok(())
    }
}

/// Groups confirmed selections by installment and keeps the groups with more
/// than one row. Unconfirmed selections never conflict.
pub fn detect_conflicts(items: &[ReconciliationItem]) -> ConflictReport {
    let mut claims: BTreeMap<InstallmentId, Vec<usize>> = BTreeMap::new();
    for (row, item) in items.iter().enumerate() {
        if !item.is_committable() {
            continue;
        }
        if let Some(id) = item.selected_installment_id() {
            claims.entry(id).or_default().push(row);
        }
    }
    claims.retain(|_, rows| rows.len() > 1);
    ConflictReport { claims }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baixa_core::{StatementDate, Transaction};
    use baixa_import::MatchCandidate;
    use chrono::NaiveDate;

    fn item(candidate_id: i64, score: f64) -> ReconciliationItem {
        let tx = Transaction {
            date: StatementDate::Calendar(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()),
            description: "TARIFA".to_string(),
            amount_minor: 15_000,
            payment_method_tag: None,
            external_id: None,
        };
        ReconciliationItem::scored(
            tx,
            vec![MatchCandidate {
                installment_id: InstallmentId(candidate_id),
                score,
                amount_diff_minor: 0,
                date_diff_days: 0,
                was_already_settled: false,
            }],
        )
    }

    #[test]
    fn confirmed_claims_on_same_installment_conflict() {
        let items = vec![item(7, 0.95), item(8, 0.95), item(7, 0.92)];
        let report = detect_conflicts(&items);
        assert_eq!(report.len(), 1);
        assert_eq!(report.rows_for(InstallmentId(7)), Some(&[0, 2][..]));
        assert!(report.is_conflicted(0));
        assert!(!report.is_conflicted(1));
        assert!(report.to_string().contains("installment 7: rows 0, 2"));
    }

    #[test]
    fn unconfirmed_selection_does_not_conflict() {
        // 0.85 is selected but not confirmed
        let items = vec![item(7, 0.95), item(7, 0.85)];
        assert!(detect_conflicts(&items).is_empty());
    }
}
