use std::collections::HashMap;

use async_trait::async_trait;
use baixa_core::{InstallmentId, InstallmentRecord, PaymentMethod, Settlement};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Installment not found: {0}")]
    NotFound(InstallmentId),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the payable installment pool.
///
/// Every call either completes or fails on its own; callers never hold a
/// transaction open across calls.
#[async_trait]
pub trait InstallmentStore: Send + Sync {
    /// All installments, open and settled.
    async fn installments(&self) -> Result<Vec<InstallmentRecord>, StoreError>;

    /// Counterparty id → display name.
    async fn counterparty_names(&self) -> Result<HashMap<i64, String>, StoreError>;

    async fn installment(&self, id: InstallmentId) -> Result<Option<InstallmentRecord>, StoreError>;

    /// Settled installments whose settlement note contains `marker` verbatim.
    async fn find_settled_by_marker(&self, marker: &str) -> Result<Vec<InstallmentId>, StoreError>;

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError>;

    /// Returns the installment to open, clearing every settlement field.
    async fn clear_settlement(&self, id: InstallmentId) -> Result<(), StoreError>;

    async fn write_settlement(
        &self,
        id: InstallmentId,
        settlement: &Settlement,
    ) -> Result<(), StoreError>;
}
