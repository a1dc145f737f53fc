use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use baixa_core::{InstallmentId, InstallmentRecord, PaymentMethod, Settlement};
use tokio::sync::Mutex;

use crate::store::{InstallmentStore, StoreError};

#[derive(Debug, Default)]
struct State {
    installments: BTreeMap<InstallmentId, InstallmentRecord>,
    counterparties: HashMap<i64, String>,
    payment_methods: Vec<PaymentMethod>,
    failing_writes: HashSet<InstallmentId>,
    failing_clears: HashSet<InstallmentId>,
    reads_fail: bool,
}

/// In-memory [`InstallmentStore`] with per-installment failure injection.
///
/// Used by tests and dry runs; behaves like the SQLite store, including
/// `NotFound` for unknown ids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counterparty(mut self, id: i64, name: &str) -> Self {
        self.state.get_mut().counterparties.insert(id, name.to_string());
        self
    }

    pub fn with_installment(mut self, record: InstallmentRecord) -> Self {
        self.state.get_mut().installments.insert(record.id, record);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.state.get_mut().payment_methods.push(method);
        self
    }

    /// Every `write_settlement` for `id` fails.
    pub fn fail_writes_for(mut self, id: InstallmentId) -> Self {
        self.state.get_mut().failing_writes.insert(id);
        self
    }

    /// Every `clear_settlement` for `id` fails.
    pub fn fail_clears_for(mut self, id: InstallmentId) -> Self {
        self.state.get_mut().failing_clears.insert(id);
        self
    }

    /// Every read fails, as if the store were unreachable.
    pub fn fail_reads(mut self) -> Self {
        self.state.get_mut().reads_fail = true;
        self
    }

    fn check_reads(state: &State) -> Result<(), StoreError> {
        if state.reads_fail {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InstallmentStore for MemoryStore {
    async fn installments(&self) -> Result<Vec<InstallmentRecord>, StoreError> {
        let state = self.state.lock().await;
        Self::check_reads(&state)?;
        Ok(state.installments.values().cloned().collect())
    }

    async fn counterparty_names(&self) -> Result<HashMap<i64, String>, StoreError> {
        let state = self.state.lock().await;
        Self::check_reads(&state)?;
        Ok(state.counterparties.clone())
    }

    async fn installment(
        &self,
        id: InstallmentId,
    ) -> Result<Option<InstallmentRecord>, StoreError> {
        let state = self.state.lock().await;
        Self::check_reads(&state)?;
        Ok(state.installments.get(&id).cloned())
    }

    async fn find_settled_by_marker(&self, marker: &str) -> Result<Vec<InstallmentId>, StoreError> {
        let state = self.state.lock().await;
        Self::check_reads(&state)?;
        Ok(state
            .installments
            .values()
            .filter(|r| r.settled)
            .filter(|r| r.settlement_note.as_deref().is_some_and(|n| n.contains(marker)))
            .map(|r| r.id)
            .collect())
    }

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError> {
        let state = self.state.lock().await;
        Self::check_reads(&state)?;
        Ok(state.payment_methods.clone())
    }

    async fn clear_settlement(&self, id: InstallmentId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.failing_clears.contains(&id) {
            return Err(StoreError::Unavailable(format!("clear rejected for {id}")));
        }
        let record = state.installments.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.clear_settlement();
        Ok(())
    }

    async fn write_settlement(
        &self,
        id: InstallmentId,
        settlement: &Settlement,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.failing_writes.contains(&id) {
            return Err(StoreError::Unavailable(format!("write rejected for {id}")));
        }
        let record = state.installments.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply_settlement(settlement);
        Ok(())
    }
}
