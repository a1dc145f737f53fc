pub mod config;
pub mod installment;
pub mod money;
pub mod payment;
pub mod transaction;

pub use config::{ConfigError, EngineConfig};
pub use installment::{
    compose_settlement_note, settlement_marker, Installment, InstallmentId, InstallmentRecord,
    Settlement, UNIDENTIFIED_COUNTERPARTY,
};
pub use money::Money;
pub use payment::{PaymentMethod, PaymentMethodId, DEFAULT_PAYMENT_METHODS};
pub use transaction::{StatementDate, Transaction};
