use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The date column of a statement line after normalization.
///
/// Unrecognized text is carried through untouched; matching treats such a
/// transaction as having no candidates instead of rejecting the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementDate {
    Calendar(NaiveDate),
    Unrecognized(String),
}

impl StatementDate {
    pub fn calendar(&self) -> Option<NaiveDate> {
        match self {
            StatementDate::Calendar(date) => Some(*date),
            StatementDate::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for StatementDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementDate::Calendar(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            StatementDate::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}

/// One outbound bank-statement line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: StatementDate,
    pub description: String,
    /// Always positive; direction has already been resolved to outbound.
    pub amount_minor: i64,
    pub payment_method_tag: Option<String>,
    pub external_id: Option<String>,
}

impl Transaction {
    /// The external identifier, if present and not blank.
    pub fn external_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
