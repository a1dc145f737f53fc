use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodId(pub i64);

impl fmt::Display for PaymentMethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
}

impl PaymentMethod {
    pub fn new(id: i64, name: &str) -> Self {
        PaymentMethod {
            id: PaymentMethodId(id),
            name: name.to_string(),
        }
    }
}

/// Seeded into a fresh database.
pub const DEFAULT_PAYMENT_METHODS: &[&str] = &[
    "PIX",
    "Boleto",
    "TED",
    "Transferência",
    "Cartão",
    "Dinheiro",
];
