use baixa_core::{EngineConfig, Transaction};
use baixa_import::MatchScorer;
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::ReconciliationBatch;
use crate::dedup::{DedupGuard, MarkerLookup};
use crate::error::ReconcileError;
use crate::index::CandidateIndex;
use crate::item::ReconciliationItem;

/// How far a batch has got, reported after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

/// Runs the dedup guard and the scorer over a statement, one chunk at a time.
pub struct BatchOrchestrator<'a, L: ?Sized> {
    scorer: MatchScorer,
    chunk_size: usize,
    index: &'a CandidateIndex,
    guard: DedupGuard<'a, L>,
}

impl<'a, L: MarkerLookup + ?Sized> BatchOrchestrator<'a, L> {
    pub fn new(config: &EngineConfig, index: &'a CandidateIndex, lookup: &'a L) -> Self {
        Self {
            scorer: MatchScorer::new(config.tolerance_days, config.tolerance_percent),
            chunk_size: config.chunk_size.max(1),
            index,
            guard: DedupGuard::new(lookup),
        }
    }

    /// Items come back in input order. Cancellation is honoured between
    /// chunks; a chunk that has started always finishes.
    pub async fn run<F>(
        &self,
        transactions: Vec<Transaction>,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<ReconciliationBatch, ReconcileError>
    where
        F: FnMut(Progress),
    {
        let total = transactions.len();
        info!(
            transactions = total,
            installments = self.index.len(),
            chunk_size = self.chunk_size,
            "reconciliation started"
        );

        let mut items = Vec::with_capacity(total);
        for (chunk_no, chunk) in transactions.chunks(self.chunk_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(processed = items.len(), total, "reconciliation cancelled");
                return Err(ReconcileError::Cancelled {
                    processed: items.len(),
                    total,
                });
            }

            let chunk_items = try_join_all(chunk.iter().map(|tx| self.process(tx))).await?;
            items.extend(chunk_items);
            debug!(chunk = chunk_no, processed = items.len(), total, "chunk done");

            on_progress(Progress {
                processed: items.len(),
                total,
            });
            tokio::task::yield_now().await;
        }

        let batch = ReconciliationBatch::new(items);
        let items = batch.items();
        info!(
            transactions = total,
            duplicates = items.iter().filter(|i| i.is_duplicate()).count(),
            unmatched = items
                .iter()
                .filter(|i| !i.is_duplicate() && i.candidates().is_empty())
                .count(),
            auto_confirmed = items.iter().filter(|i| i.is_confirmed()).count(),
            conflicts = batch.conflicts().len(),
            "reconciliation finished"
        );
        Ok(batch)
    }

    async fn process(&self, tx: &Transaction) -> Result<ReconciliationItem, ReconcileError> {
        if let Some(prior) = self.guard.check(tx).await? {
            return Ok(ReconciliationItem::duplicate(tx.clone(), prior));
        }
        let candidates = self.scorer.score(tx, self.index.as_slice());
        Ok(ReconciliationItem::scored(tx.clone(), candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baixa_core::{InstallmentId, InstallmentRecord, StatementDate};
    use baixa_storage::StoreError;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct Unreachable;

    #[async_trait::async_trait]
    impl MarkerLookup for Unreachable {
        async fn settled_with_marker(
            &self,
            _marker: &str,
        ) -> Result<Vec<InstallmentId>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn record(id: i64, amount_minor: i64, due: u32) -> InstallmentRecord {
        InstallmentRecord {
            id: InstallmentId(id),
            owning_account_id: 1,
            counterparty_id: None,
            description: String::new(),
            amount_minor,
            due_date: date(due),
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

    fn tx(amount_minor: i64, external_id: Option<&str>) -> Transaction {
        Transaction {
            date: StatementDate::Calendar(date(10)),
            description: "PAGAMENTO".to_string(),
            amount_minor,
            payment_method_tag: None,
            external_id: external_id.map(str::to_string),
        }
    }

    fn config(chunk_size: usize) -> EngineConfig {
        EngineConfig {
            chunk_size,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn keeps_input_order_and_reports_progress() {
        let index = CandidateIndex::from_parts(
            vec![record(1, 10_000, 10), record(2, 20_000, 10)],
            &HashMap::new(),
        );
        let orchestrator = BatchOrchestrator::new(&config(2), &index, &index);
        let transactions = vec![
            tx(20_000, None),
            tx(10_000, None),
            tx(99_999, None),
            tx(10_000, None),
            tx(20_000, None),
        ];

        let mut reports = Vec::new();
        let batch = orchestrator
            .run(transactions, &CancellationToken::new(), |p| reports.push(p))
            .await
            .unwrap();

        let first: Vec<_> = batch
            .items()
            .iter()
            .map(|i| i.candidates().first().map(|c| c.installment_id.0))
            .collect();
        assert_eq!(first, vec![Some(2), Some(1), None, Some(1), Some(2)]);
        let processed: Vec<_> = reports.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![2, 4, 5]);
        assert!(reports.iter().all(|p| p.total == 5));
        // both lines for installment 1 are auto-confirmed
        assert!(!batch.can_commit());
    }

    #[tokio::test]
    async fn cancellation_stops_between_chunks() {
        let index = CandidateIndex::from_parts(vec![record(1, 10_000, 10)], &HashMap::new());
        let orchestrator = BatchOrchestrator::new(&config(2), &index, &index);
        let cancel = CancellationToken::new();
        let transactions = vec![tx(10_000, None); 6];

        let result = orchestrator
            .run(transactions, &cancel, |p| {
                if p.processed == 2 {
                    cancel.cancel();
                }
            })
            .await;
        assert!(matches!(
            result,
            Err(ReconcileError::Cancelled { processed: 2, total: 6 })
        ));
    }

    #[tokio::test]
    async fn lookup_failure_fails_the_batch() {
        let index = CandidateIndex::from_parts(vec![record(1, 10_000, 10)], &HashMap::new());
        let orchestrator = BatchOrchestrator::new(&config(50), &index, &Unreachable);
        let result = orchestrator
            .run(vec![tx(10_000, Some("TX1"))], &CancellationToken::new(), |_| {})
            .await;
        assert!(matches!(result, Err(ReconcileError::Lookup(_))));
    }

    #[tokio::test]
    async fn empty_statement_is_an_empty_batch() {
        let index = CandidateIndex::default();
        let orchestrator = BatchOrchestrator::new(&config(50), &index, &index);
        let batch = orchestrator
            .run(Vec::new(), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert!(batch.is_empty());
        assert!(batch.can_commit());
    }
}
