use std::borrow::Cow;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use baixa_core::{Money, StatementDate, Transaction};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_date_dmy, r"^(\d{1,2})([/-])(\d{1,2})([/-])(\d{4})$");
re!(re_date_ymd, r"^(\d{4})([/-])(\d{1,2})([/-])(\d{1,2})$");

/// Substrings of a type/direction cell that mark a line as money going out.
const OUTBOUND_MARKERS: &[&str] = &["deb", "déb", "saida", "saída", "outbound", "withdrawal"];

/// A single cell as handed over by the spreadsheet/CSV reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Empty,
}

impl RawValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawValue::Text(s) => Cow::Borrowed(s.as_str()),
            RawValue::Number(n) => Cow::Owned(n.to_string()),
            RawValue::Empty => Cow::Borrowed(""),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(s.to_string())
        }
    }
}

pub type RawRow = HashMap<String, RawValue>;

/// Which named columns of a raw row feed which transaction fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date_column: String,
    pub description_column: String,
    pub amount_column: String,
    #[serde(default)]
    pub type_column: Option<String>,
    #[serde(default)]
    pub payment_method_column: Option<String>,
    #[serde(default)]
    pub identifier_column: Option<String>,
    #[serde(default)]
    pub negative_means_outbound: bool,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            description_column: "description".to_string(),
            amount_column: "amount".to_string(),
            type_column: None,
            payment_method_column: None,
            identifier_column: None,
            negative_means_outbound: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Turns raw rows into outbound transactions, dropping everything else.
pub fn normalize_rows(rows: &[RawRow], mapping: &ColumnMapping) -> Vec<Transaction> {
    let transactions: Vec<Transaction> = rows
        .iter()
        .filter_map(|row| normalize_row(row, mapping))
        .collect();

    tracing::debug!(
        rows = rows.len(),
        kept = transactions.len(),
        dropped = rows.len() - transactions.len(),
        "normalized statement rows"
    );

    transactions
}

/// Returns `None` for inbound lines and for lines whose amount is zero or too
/// large to hold in minor units.
pub fn normalize_row(row: &RawRow, mapping: &ColumnMapping) -> Option<Transaction> {
    let amount = parse_amount(cell(row, &mapping.amount_column));
    let type_value = mapping
        .type_column
        .as_deref()
        .map(|col| cell(row, col).as_text());

    if direction(type_value.as_deref(), amount, mapping.negative_means_outbound)
        != Direction::Outbound
    {
        return None;
    }

    let amount_minor = Money::from_decimal(amount.abs()).to_minor().unwrap_or(0);
    if amount_minor <= 0 {
        return None;
    }

    Some(Transaction {
        date: normalize_date(&cell(row, &mapping.date_column).as_text()),
        description: cell(row, &mapping.description_column)
            .as_text()
            .trim()
            .to_string(),
        amount_minor,
        payment_method_tag: optional_text(row, mapping.payment_method_column.as_deref()),
        external_id: optional_text(row, mapping.identifier_column.as_deref()),
    })
}

fn cell<'a>(row: &'a RawRow, column: &str) -> &'a RawValue {
    row.get(column).unwrap_or(&RawValue::Empty)
}

fn optional_text(row: &RawRow, column: Option<&str>) -> Option<String> {
    let value = cell(row, column?).as_text();
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// An explicit type column wins; otherwise the sign decides when the
/// statement encodes payments as negative amounts.
pub fn direction(
    type_value: Option<&str>,
    amount: Decimal,
    negative_means_outbound: bool,
) -> Direction {
    if let Some(value) = type_value {
        let value = value.trim().to_lowercase();
        if value == "d" || OUTBOUND_MARKERS.iter().any(|m| value.contains(m)) {
            return Direction::Outbound;
        }
    }
    if negative_means_outbound && amount.is_sign_negative() && !amount.is_zero() {
        return Direction::Outbound;
    }
    Direction::Inbound
}

/// Parses a locale-formatted amount. Anything unparseable is zero.
pub fn parse_amount(value: &RawValue) -> Decimal {
    match value {
        RawValue::Number(n) => Decimal::from_f64(*n).unwrap_or(Decimal::ZERO),
        RawValue::Text(s) => parse_amount_text(s),
        RawValue::Empty => Decimal::ZERO,
    }
}

fn parse_amount_text(s: &str) -> Decimal {
    let s = s.trim();
    let (parenthesized, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let negative = parenthesized || s.contains('-');

    let digits: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .collect();

    // The separator that appears last is the decimal one.
    let canonical = match (digits.rfind('.'), digits.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (None, Some(_)) => digits.replace(',', "."),
        _ => digits,
    };

    match Decimal::from_str(&canonical) {
        Ok(value) if negative => -value,
        Ok(value) => value,
        Err(_) => Decimal::ZERO,
    }
}

/// Accepts `DD/MM/YYYY`, `DD-MM-YYYY`, `YYYY-MM-DD` and `YYYY/MM/DD`.
pub fn normalize_date(s: &str) -> StatementDate {
    let trimmed = s.trim();
    let parsed = if let Some(caps) = re_date_dmy().captures(trimmed) {
        (caps[2] == caps[4])
            .then(|| ymd(&caps[5], &caps[3], &caps[1]))
            .flatten()
    } else if let Some(caps) = re_date_ymd().captures(trimmed) {
        (caps[2] == caps[4])
            .then(|| ymd(&caps[1], &caps[3], &caps[5]))
            .flatten()
    } else {
        None
    };

    match parsed {
        Some(date) => StatementDate::Calendar(date),
        None => StatementDate::Unrecognized(s.to_string()),
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
