pub mod db;
pub mod memory;
pub mod store;

pub use db::{
    create_db, insert_bank_account, insert_counterparty, insert_installment, insert_payable,
    seed_default_payment_methods, DbPool, NewInstallment, SqliteStore,
};
pub use memory::MemoryStore;
pub use store::{InstallmentStore, StoreError};
