use baixa_core::{
    compose_settlement_note, EngineConfig, InstallmentId, PaymentMethod, PaymentMethodId,
    Settlement,
};
use baixa_import::similarity::normalize_text;
use baixa_storage::InstallmentStore;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::batch::{CommitItem, CommitPlan};
use crate::error::ReconcileError;

/// Batch-wide fallbacks applied to every settlement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitDefaults {
    /// Payment method name, resolved against the stored methods.
    pub payment_method: Option<String>,
    pub bank_account_id: Option<i64>,
}

impl CommitDefaults {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            payment_method: config.default_payment_method.clone(),
            bank_account_id: config.default_bank_account,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    Inserted,
    Overridden,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub row: usize,
    pub installment_id: InstallmentId,
    pub status: CommitStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub inserted: usize,
    pub overridden: usize,
    pub errored: usize,
    pub outcomes: Vec<CommitOutcome>,
}

impl CommitReport {
    fn record(&mut self, outcome: CommitOutcome) {
        match outcome.status {
            CommitStatus::Inserted => self.inserted += 1,
            CommitStatus::Overridden => self.overridden += 1,
            CommitStatus::Error(_) => self.errored += 1,
        }
        self.outcomes.push(outcome);
    }

    /// The first `limit` error descriptions, in plan order.
    pub fn error_messages(&self, limit: usize) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                CommitStatus::Error(message) => Some(format!(
                    "row {} (installment {}): {message}",
                    o.row, o.installment_id
                )),
                _ => None,
            })
            .take(limit)
            .collect()
    }
}

/// The stored method whose name matches `name`, ignoring case, accents and
/// punctuation.
pub fn resolve_payment_method(methods: &[PaymentMethod], name: &str) -> Option<PaymentMethodId> {
    let wanted = normalize_text(name);
    if wanted.is_empty() {
        return None;
    }
    methods
        .iter()
        .find(|m| normalize_text(&m.name) == wanted)
        .map(|m| m.id)
}

/// Writes a commit plan to the store, one installment at a time.
///
/// A failing item is recorded and skipped; nothing already written is rolled
/// back.
pub struct SettlementCommitter<'a, S: ?Sized> {
    store: &'a S,
    defaults: CommitDefaults,
    settled_at: NaiveDate,
}

impl<'a, S: InstallmentStore + ?Sized> SettlementCommitter<'a, S> {
    pub fn new(store: &'a S, defaults: CommitDefaults, settled_at: NaiveDate) -> Self {
        Self {
            store,
            defaults,
            settled_at,
        }
    }

    pub async fn commit(&self, plan: &CommitPlan) -> Result<CommitReport, ReconcileError> {
        let methods = self.store.payment_methods().await?;
        let default_method = self.defaults.payment_method.as_deref().and_then(|name| {
            let resolved = resolve_payment_method(&methods, name);
            if resolved.is_none() {
                warn!(payment_method = name, "default payment method is not registered");
            }
            resolved
        });

        let mut report = CommitReport::default();
        for item in plan.items() {
            let status = self.commit_one(item, &methods, default_method).await;
            if let CommitStatus::Error(message) = &status {
                warn!(
                    row = item.row,
                    installment = %item.installment_id,
                    error = %message,
                    "settlement failed"
                );
            }
            report.record(CommitOutcome {
                row: item.row,
                installment_id: item.installment_id,
                status,
            });
        }

        info!(
            inserted = report.inserted,
            overridden = report.overridden,
            errored = report.errored,
            "commit finished"
        );
        Ok(report)
    }

    async fn commit_one(
        &self,
        item: &CommitItem,
        methods: &[PaymentMethod],
        default_method: Option<PaymentMethodId>,
    ) -> CommitStatus {
        let id = item.installment_id;
        let tx = &item.transaction;
        let payment_method = tx
            .payment_method_tag
            .as_deref()
            .and_then(|tag| resolve_payment_method(methods, tag))
            .or(default_method);

        let mut overridden = false;
        if item.override_settlement {
            match self.store.installment(id).await {
                Ok(Some(current)) if current.settled => {
                    if let Err(e) = self.store.clear_settlement(id).await {
                        return CommitStatus::Error(format!(
                            "failed to clear previous settlement: {e}"
                        ));
                    }
                    overridden = true;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    return CommitStatus::Error(format!("installment {id} no longer exists"));
                }
                Err(e) => return CommitStatus::Error(format!("failed to read installment: {e}")),
            }
        }

        let settlement = Settlement {
            settled_at: self.settled_at,
            amount_minor: tx.amount_minor,
            payment_method_id: payment_method.map(|m| m.0),
            bank_account_id: self.defaults.bank_account_id,
            note: Some(compose_settlement_note(tx.external_id(), &tx.description)),
        };
        match self.store.write_settlement(id, &settlement).await {
            Ok(()) if overridden => CommitStatus::Overridden,
            Ok(()) => CommitStatus::Inserted,
            Err(e) => CommitStatus::Error(format!("failed to write settlement: {e}")),
        }
    }
}
