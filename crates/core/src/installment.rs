use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown wherever an installment's counterparty cannot be resolved.
pub const UNIDENTIFIED_COUNTERPARTY: &str = "unidentified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallmentId(pub i64);

impl fmt::Display for InstallmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An installment as stored, before its counterparty name is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRecord {
    pub id: InstallmentId,
    pub owning_account_id: i64,
    pub counterparty_id: Option<i64>,
    pub description: String,
    pub amount_minor: i64,
    pub due_date: NaiveDate,
    pub installment_index: u32,
    pub installment_count: u32,
    pub settled: bool,
    pub settled_at: Option<NaiveDate>,
    pub settled_amount_minor: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub bank_account_id: Option<i64>,
    pub settlement_note: Option<String>,
}

impl InstallmentRecord {
    /// Resets every settlement field, returning the installment to open.
    pub fn clear_settlement(&mut self) {
        self.settled = false;
        self.settled_at = None;
        self.settled_amount_minor = None;
        self.payment_method_id = None;
        self.bank_account_id = None;
        self.settlement_note = None;
    }

    pub fn apply_settlement(&mut self, settlement: &Settlement) {
        self.settled = true;
        self.settled_at = Some(settlement.settled_at);
        self.settled_amount_minor = Some(settlement.amount_minor);
        self.payment_method_id = settlement.payment_method_id;
        self.bank_account_id = settlement.bank_account_id;
        self.settlement_note = settlement.note.clone();
    }

    pub fn with_counterparty_name(self, counterparty_name: Option<String>) -> Installment {
        Installment {
            id: self.id,
            owning_account_id: self.owning_account_id,
            counterparty_name,
            description: self.description,
            amount_minor: self.amount_minor,
            due_date: self.due_date,
            installment_index: self.installment_index,
            installment_count: self.installment_count,
            settled: self.settled,
            settled_at: self.settled_at,
            settled_amount_minor: self.settled_amount_minor,
            payment_method_id: self.payment_method_id,
            bank_account_id: self.bank_account_id,
            settlement_note: self.settlement_note,
        }
    }
}

/// A matching candidate: an installment joined with its counterparty's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub owning_account_id: i64,
    /// `None` when no name could be resolved; see [`Installment::display_name`].
    pub counterparty_name: Option<String>,
    pub description: String,
    pub amount_minor: i64,
    pub due_date: NaiveDate,
    pub installment_index: u32,
    pub installment_count: u32,
    pub settled: bool,
    pub settled_at: Option<NaiveDate>,
    pub settled_amount_minor: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub bank_account_id: Option<i64>,
    pub settlement_note: Option<String>,
}

impl Installment {
    pub fn display_name(&self) -> &str {
        self.counterparty_name
            .as_deref()
            .unwrap_or(UNIDENTIFIED_COUNTERPARTY)
    }

    pub fn note_contains(&self, marker: &str) -> bool {
        self.settlement_note
            .as_deref()
            .is_some_and(|note| note.contains(marker))
    }
}

/// Fields written when an installment is marked paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub settled_at: NaiveDate,
    pub amount_minor: i64,
    pub payment_method_id: Option<i64>,
    pub bank_account_id: Option<i64>,
    pub note: Option<String>,
}

/// The tag embedded in a settlement note recording which statement line paid it.
pub fn settlement_marker(external_id: &str) -> String {
    format!("[STMT:{external_id}]")
}

/// `[STMT:<id>] <text>` when the line carries an identifier, else the text alone.
pub fn compose_settlement_note(external_id: Option<&str>, text: &str) -> String {
    let text = text.trim();
    match external_id {
        Some(id) if text.is_empty() => settlement_marker(id),
        Some(id) => format!("{} {text}", settlement_marker(id)),
        None => text.to_string(),
    }
}
