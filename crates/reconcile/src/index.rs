use std::collections::HashMap;

use baixa_core::{Installment, InstallmentId, InstallmentRecord};
use baixa_storage::{InstallmentStore, StoreError};
use tracing::info;

/// Read-only snapshot of every installment, joined with its counterparty name.
///
/// Built once per batch; settled installments stay in the index so they can be
/// offered for override and checked by the dedup guard.
#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    installments: Vec<Installment>,
}

impl CandidateIndex {
    pub async fn load<S: InstallmentStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let records = store.installments().await?;
        let names = store.counterparty_names().await?;
        let index = Self::from_parts(records, &names);
        info!(
            installments = index.len(),
            settled = index.settled().count(),
            "candidate index loaded"
        );
        Ok(index)
    }

    pub fn from_parts(records: Vec<InstallmentRecord>, names: &HashMap<i64, String>) -> Self {
        let installments = records
            .into_iter()
            .map(|record| {
                let name = record
                    .counterparty_id
                    .and_then(|id| names.get(&id))
                    .map(|name| name.trim())
                    .filter(|name| !name.is_empty())
                    .map(str::to_string);
                record.with_counterparty_name(name)
            })
            .collect();
        Self { installments }
    }

    pub fn as_slice(&self) -> &[Installment] {
        &self.installments
    }

    pub fn get(&self, id: InstallmentId) -> Option<&Installment> {
        self.installments.iter().find(|i| i.id == id)
    }

    pub fn settled(&self) -> impl Iterator<Item = &Installment> {
        self.installments.iter().filter(|i| i.settled)
    }

    pub fn len(&self) -> usize {
        self.installments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installments.is_empty()
    }
}
