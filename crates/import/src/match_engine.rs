use baixa_core::{Installment, InstallmentId, Transaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::similarity::{is_name_available, name_score};

const WEIGHT_VALUE: f64 = 0.4;
const WEIGHT_DATE: f64 = 0.2;
const WEIGHT_NAME: f64 = 0.4;
/// Weights used when there is no usable counterparty name on either side.
const WEIGHT_VALUE_NAMELESS: f64 = 0.85;
const WEIGHT_DATE_NAMELESS: f64 = 0.15;

/// One installment that passed the tolerance window for a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub installment_id: InstallmentId,
    /// Composite score in `[0.0, 1.0]`.
    pub score: f64,
    pub amount_diff_minor: i64,
    pub date_diff_days: i64,
    /// Whether the installment was already settled when it was scored.
    pub was_already_settled: bool,
}

/// Scores installments against a statement line.
///
/// Candidates outside the value or date tolerance are never returned; the
/// rest are ranked by a weighted blend of value, date and name closeness.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScorer {
    pub tolerance_days: u32,
    pub tolerance_percent: f64,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self {
            tolerance_days: 10,
            tolerance_percent: 1.0,
        }
    }
}

impl MatchScorer {
    pub fn new(tolerance_days: u32, tolerance_percent: f64) -> Self {
        Self {
            tolerance_days,
            tolerance_percent,
        }
    }

    /// Ranked candidates for `tx`; empty when the transaction date is not a
    /// calendar date.
    pub fn score(&self, tx: &Transaction, installments: &[Installment]) -> Vec<MatchCandidate> {
        let Some(tx_date) = tx.date.calendar() else {
            tracing::warn!(
                date = %tx.date,
                description = %tx.description,
                "statement line has an unparseable date; no candidates"
            );
            return Vec::new();
        };

        let mut candidates: Vec<MatchCandidate> = installments
            .iter()
            .filter_map(|inst| self.score_pair(tx, tx_date, inst))
            .collect();
        rank(&mut candidates);
        candidates
    }

    /// `None` when the pair falls outside the value or date tolerance.
    fn score_pair(
        &self,
        tx: &Transaction,
        tx_date: NaiveDate,
        inst: &Installment,
    ) -> Option<MatchCandidate> {
        if !value_within_tolerance(inst.amount_minor, tx.amount_minor, self.tolerance_percent) {
            return None;
        }

        let date_diff_days = (tx_date - inst.due_date).num_days().abs();
        if date_diff_days > i64::from(self.tolerance_days) {
            return None;
        }

        let amount_diff_minor = (inst.amount_minor - tx.amount_minor).abs();
        let value = value_score(inst.amount_minor, tx.amount_minor, self.tolerance_percent);
        let date = date_score(date_diff_days, self.tolerance_days);

        let counterparty = inst.counterparty_name.as_deref();
        let score = if is_name_available(&tx.description, counterparty) {
            let name = name_score(&tx.description, counterparty);
            value * WEIGHT_VALUE + date * WEIGHT_DATE + name * WEIGHT_NAME
        } else {
            value * WEIGHT_VALUE_NAMELESS + date * WEIGHT_DATE_NAMELESS
        };

        Some(MatchCandidate {
            installment_id: inst.id,
            score: score.clamp(0.0, 1.0),
            amount_diff_minor,
            date_diff_days,
            was_already_settled: inst.settled,
        })
    }
}

/// Score descending, then closer date, then smaller value gap, then id.
pub fn rank(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.date_diff_days.cmp(&b.date_diff_days))
            .then(a.amount_diff_minor.cmp(&b.amount_diff_minor))
            .then(a.installment_id.cmp(&b.installment_id))
    });
}

/// `|a - b| <= round(max(a, b) * percent / 100)`; symmetric in `a` and `b`.
pub fn value_within_tolerance(a_minor: i64, b_minor: i64, tolerance_percent: f64) -> bool {
    let larger = a_minor.max(b_minor);
    let allowed = (larger as f64 * tolerance_percent / 100.0).round();
    ((a_minor - b_minor).abs() as f64) <= allowed
}

/// The value gap as a percentage of the larger amount.
pub fn diff_percent(a_minor: i64, b_minor: i64) -> f64 {
    let larger = a_minor.max(b_minor);
    if larger <= 0 {
        return 0.0;
    }
    (a_minor - b_minor).abs() as f64 / larger as f64 * 100.0
}

pub fn value_score(a_minor: i64, b_minor: i64, tolerance_percent: f64) -> f64 {
    (1.0 - diff_percent(a_minor, b_minor) / tolerance_percent.max(1.0)).max(0.0)
}

pub fn date_score(date_diff_days: i64, tolerance_days: u32) -> f64 {
    (1.0 - date_diff_days as f64 / f64::from(tolerance_days.max(1))).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use baixa_core::StatementDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(on: NaiveDate, desc: &str, amount: i64) -> Transaction {
        Transaction {
            date: StatementDate::Calendar(on),
            description: desc.to_string(),
            amount_minor: amount,
            payment_method_tag: None,
            external_id: None,
        }
    }

    fn inst(id: i64, due: NaiveDate, name: Option<&str>, amount: i64) -> Installment {
        Installment {
            id: InstallmentId(id),
            owning_account_id: 1,
            counterparty_name: name.map(str::to_string),
            description: "Parcela".to_string(),
            amount_minor: amount,
            due_date: due,
            installment_index: 1,
            installment_count: 1,
            settled: false,
            settled_at: None,
            settled_amount_minor: None,
            payment_method_id: None,
            bank_account_id: None,
            settlement_note: None,
        }
    }

    fn acme_tx() -> Transaction {
        tx(date(2025, 3, 10), "PAGAMENTO FORNECEDOR ACME LTDA", 15000)
    }

    #[test]
    fn exact_amount_close_date_and_name_scores_high() {
        let scorer = MatchScorer::default();
        let pool = vec![inst(1, date(2025, 3, 12), Some("ACME LTDA"), 15000)];
        let result = scorer.score(&acme_tx(), &pool);
        assert_eq!(result.len(), 1);
        let c = &result[0];
        assert_eq!(c.installment_id, InstallmentId(1));
        assert_eq!(c.amount_diff_minor, 0);
        assert_eq!(c.date_diff_days, 2);
        // value 1.0, date 0.8, name 1.0
        assert!((c.score - 0.96).abs() < 1e-9, "score was {}", c.score);
        assert!(!c.was_already_settled);
    }

    #[test]
    fn value_outside_tolerance_is_excluded() {
        let scorer = MatchScorer::default();
        let pool = vec![inst(1, date(2025, 3, 12), Some("ACME LTDA"), 15200)];
        assert!(scorer.score(&acme_tx(), &pool).is_empty());
    }

    #[test]
    fn date_outside_tolerance_is_excluded() {
        let scorer = MatchScorer::default();
        let pool = vec![
            inst(1, date(2025, 3, 21), Some("ACME LTDA"), 15000),
            inst(2, date(2025, 2, 27), Some("ACME LTDA"), 15000),
            inst(3, date(2025, 3, 20), Some("ACME LTDA"), 15000),
        ];
        let result = scorer.score(&acme_tx(), &pool);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].installment_id, InstallmentId(3));
        assert_eq!(result[0].date_diff_days, 10);
    }

    #[test]
    fn unparseable_date_yields_nothing() {
        let scorer = MatchScorer::default();
        let mut t = acme_tx();
        t.date = StatementDate::Unrecognized("10 de março".to_string());
        let pool = vec![inst(1, date(2025, 3, 10), Some("ACME LTDA"), 15000)];
        assert!(scorer.score(&t, &pool).is_empty());
    }

    #[test]
    fn nameless_candidate_uses_value_and_date_only() {
        let scorer = MatchScorer::default();
        let pool = vec![inst(1, date(2025, 3, 10), None, 15000)];
        let result = scorer.score(&acme_tx(), &pool);
        assert!((result[0].score - 1.0).abs() < 1e-9);

        let pool = vec![inst(1, date(2025, 3, 15), None, 15000)];
        let result = scorer.score(&acme_tx(), &pool);
        // 0.85 * 1.0 + 0.15 * 0.5
        assert!((result[0].score - 0.925).abs() < 1e-9);
    }

    #[test]
    fn unrelated_name_drags_score_down() {
        let scorer = MatchScorer::default();
        let pool = vec![inst(1, date(2025, 3, 10), Some("Padaria Central"), 15000)];
        let result = scorer.score(&acme_tx(), &pool);
        // 0.4 * 1.0 + 0.2 * 1.0 + 0.4 * 0.0
        assert!((result[0].score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn ranking_is_by_score_then_date_then_amount_then_id() {
        let scorer = MatchScorer::default();
        let pool = vec![
            inst(5, date(2025, 3, 13), None, 15000),
            inst(4, date(2025, 3, 10), None, 15100),
            inst(3, date(2025, 3, 10), Some("ACME LTDA"), 15000),
            inst(2, date(2025, 3, 7), None, 15000),
            inst(1, date(2025, 3, 13), None, 15000),
        ];
        let result = scorer.score(&acme_tx(), &pool);
        let ids: Vec<i64> = result.iter().map(|c| c.installment_id.0).collect();
        // 3 is a perfect hit; 1, 2 and 5 tie on score, date and amount and fall
        // back to id; 4 is on the day but 0.66% off, which costs most of its
        // value score.
        assert_eq!(ids, vec![3, 1, 2, 5, 4]);
    }

    #[test]
    fn ranking_is_reproducible() {
        let scorer = MatchScorer::new(10, 2.0);
        let pool: Vec<Installment> = (0..40)
            .map(|i| {
                inst(
                    i,
                    date(2025, 3, 1 + (i % 20) as u32),
                    if i % 3 == 0 { Some("ACME LTDA") } else { None },
                    14900 + (i * 7) % 200,
                )
            })
            .collect();
        let mut reversed = pool.clone();
        reversed.reverse();

        let first = scorer.score(&acme_tx(), &pool);
        let second = scorer.score(&acme_tx(), &pool);
        let from_reversed = scorer.score(&acme_tx(), &reversed);
        assert_eq!(first, second);
        assert_eq!(first, from_reversed);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let scorer = MatchScorer::new(0, 0.0);
        let pool = vec![inst(1, date(2025, 3, 10), Some("ACME"), 15000)];
        for c in scorer.score(&acme_tx(), &pool) {
            assert!((0.0..=1.0).contains(&c.score));
        }

        let scorer = MatchScorer::new(30, 50.0);
        let pool: Vec<Installment> = (0..30)
            .map(|i| inst(i, date(2025, 3, 1 + i as u32 % 28), Some("ACME LTDA"), 10000 + i * 300))
            .collect();
        for c in scorer.score(&acme_tx(), &pool) {
            assert!((0.0..=1.0).contains(&c.score), "score was {}", c.score);
        }
    }

    #[test]
    fn tolerance_is_symmetric() {
        for pct in [0.0, 0.5, 1.0, 2.5, 10.0] {
            for a in (1..2000).step_by(37) {
                for b in (1..2000).step_by(41) {
                    let (lo, hi) = (a.min(b), a.max(b));
                    let expected = (hi - lo) as f64 <= (hi as f64 * pct / 100.0).round();
                    assert_eq!(value_within_tolerance(a, b, pct), expected);
                    assert_eq!(
                        value_within_tolerance(a, b, pct),
                        value_within_tolerance(b, a, pct)
                    );
                }
            }
        }
    }

    #[test]
    fn one_percent_boundary() {
        // round(15000 * 1%) = 150
        assert!(value_within_tolerance(15000, 15150, 1.0));
        assert!(!value_within_tolerance(15000, 15200, 1.0));
        // round(15151 * 1%) = round(151.51) = 152, diff 151
        assert!(value_within_tolerance(15000, 15151, 1.0));
    }

    #[test]
    fn component_scores() {
        assert_eq!(value_score(100, 100, 1.0), 1.0);
        assert!((value_score(9950, 10000, 1.0) - 0.5).abs() < 1e-9);
        // tolerance below 1% still divides by 1
        assert!((value_score(9950, 10000, 0.5) - 0.5).abs() < 1e-9);
        assert_eq!(date_score(0, 10), 1.0);
        assert!((date_score(5, 10) - 0.5).abs() < 1e-9);
        assert_eq!(date_score(0, 0), 1.0);
        assert_eq!(date_score(3, 0), 0.0);
    }

    #[test]
    fn settled_installments_are_still_candidates() {
        let scorer = MatchScorer::default();
        let mut settled = inst(1, date(2025, 3, 12), Some("ACME LTDA"), 15000);
        settled.settled = true;
        let result = scorer.score(&acme_tx(), &[settled]);
        assert_eq!(result.len(), 1);
        assert!(result[0].was_already_settled);
    }
}
