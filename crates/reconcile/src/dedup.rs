//! Recognizes statement lines that already settled an installment in an
//! earlier run, by the `[STMT:<id>]` marker left in the settlement note.

use async_trait::async_trait;
use baixa_core::{settlement_marker, InstallmentId, Transaction};
use baixa_storage::{InstallmentStore, StoreError};
use tracing::debug;

use crate::index::CandidateIndex;

/// Finds settled installments whose settlement note contains a marker.
#[async_trait]
pub trait MarkerLookup: Send + Sync {
    async fn settled_with_marker(&self, marker: &str) -> Result<Vec<InstallmentId>, StoreError>;
}

#[async_trait]
impl MarkerLookup for CandidateIndex {
    async fn settled_with_marker(&self, marker: &str) -> Result<Vec<InstallmentId>, StoreError> {
        Ok(self
            .settled()
            .filter(|i| i.note_contains(marker))
            .map(|i| i.id)
            .collect())
    }
}

/// Marker lookups answered by querying the store directly.
pub struct StoreMarkers<'a, S: ?Sized>(pub &'a S);

#[async_trait]
impl<S: InstallmentStore + ?Sized> MarkerLookup for StoreMarkers<'_, S> {
    async fn settled_with_marker(&self, marker: &str) -> Result<Vec<InstallmentId>, StoreError> {
        self.0.find_settled_by_marker(marker).await
    }
}

pub struct DedupGuard<'a, L: ?Sized> {
    lookup: &'a L,
}

impl<'a, L: MarkerLookup + ?Sized> DedupGuard<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// The installment a previous run settled with this line, if any.
    ///
    /// Lines without an external identifier are never duplicates.
    pub async fn check(&self, tx: &Transaction) -> Result<Option<InstallmentId>, StoreError> {
        let Some(external_id) = tx.external_id() else {
            return Ok(None);
        };
        let marker = settlement_marker(external_id);
        let prior = self.lookup.settled_with_marker(&marker).await?.into_iter().min();
        if let Some(id) = prior {
            debug!(external_id, installment = %id, "statement line already reconciled");
        }
        Ok(prior)
    }
}
