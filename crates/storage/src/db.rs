use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use baixa_core::{
    InstallmentId, InstallmentRecord, PaymentMethod, Settlement, DEFAULT_PAYMENT_METHODS,
};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::store::{InstallmentStore, StoreError};

pub type DbPool = Pool<Sqlite>;

const INSTALLMENT_COLUMNS: &str = r#"
    i.id, i.payable_id, p.counterparty_id, i.description, i.amount_minor, i.due_date,
    i.installment_index, i.installment_count, i.settled, i.settled_at,
    i.settled_amount_minor, i.payment_method_id, i.bank_account_id, i.settlement_note
"#;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS counterparties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_methods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payables (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            counterparty_id INTEGER,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (counterparty_id) REFERENCES counterparties(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS installments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payable_id INTEGER NOT NULL,
            description TEXT NOT NULL,
            amount_minor INTEGER NOT NULL CHECK (amount_minor > 0),
            due_date TEXT NOT NULL,
            installment_index INTEGER NOT NULL DEFAULT 1,
            installment_count INTEGER NOT NULL DEFAULT 1,
            settled INTEGER NOT NULL DEFAULT 0,
            settled_at TEXT,
            settled_amount_minor INTEGER,
            payment_method_id INTEGER,
            bank_account_id INTEGER,
            settlement_note TEXT,
            FOREIGN KEY (payable_id) REFERENCES payables(id) ON DELETE CASCADE,
            FOREIGN KEY (payment_method_id) REFERENCES payment_methods(id),
            FOREIGN KEY (bank_account_id) REFERENCES bank_accounts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_installments_due_date ON installments(due_date)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn seed_default_payment_methods(pool: &DbPool) -> Result<(), sqlx::Error> {
    for name in DEFAULT_PAYMENT_METHODS {
        sqlx::query("INSERT OR IGNORE INTO payment_methods (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await?;
    }

    Ok(())
}

pub async fn insert_counterparty(pool: &DbPool, name: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO counterparties (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn insert_bank_account(pool: &DbPool, name: &str) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO bank_accounts (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn insert_payable(
    pool: &DbPool,
    counterparty_id: Option<i64>,
    description: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO payables (counterparty_id, description) VALUES (?, ?)")
        .bind(counterparty_id)
        .bind(description)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// An open installment to be created under an existing payable.
#[derive(Debug, Clone)]
pub struct NewInstallment {
    pub payable_id: i64,
    pub description: String,
    pub amount_minor: i64,
    pub due_date: NaiveDate,
    pub installment_index: u32,
    pub installment_count: u32,
}

pub async fn insert_installment(
    pool: &DbPool,
    new: &NewInstallment,
) -> Result<InstallmentId, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO installments \
         (payable_id, description, amount_minor, due_date, installment_index, installment_count) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new.payable_id)
    .bind(&new.description)
    .bind(new.amount_minor)
    .bind(new.due_date)
    .bind(new.installment_index)
    .bind(new.installment_count)
    .execute(pool)
    .await?;
    Ok(InstallmentId(result.last_insert_rowid()))
}

#[derive(sqlx::FromRow)]
struct InstallmentRow {
    id: i64,
    payable_id: i64,
    counterparty_id: Option<i64>,
    description: String,
    amount_minor: i64,
    due_date: NaiveDate,
    installment_index: i64,
    installment_count: i64,
    settled: bool,
    settled_at: Option<NaiveDate>,
    settled_amount_minor: Option<i64>,
    payment_method_id: Option<i64>,
    bank_account_id: Option<i64>,
    settlement_note: Option<String>,
}

impl TryFrom<InstallmentRow> for InstallmentRecord {
    type Error = StoreError;

    fn try_from(r: InstallmentRow) -> Result<Self, Self::Error> {
        let position = |value: i64, column: &str| {
            u32::try_from(value).map_err(|_| {
                StoreError::InvalidData(format!("installment {}: {column} = {value}", r.id))
            })
        };
        Ok(InstallmentRecord {
            id: InstallmentId(r.id),
            owning_account_id: r.payable_id,
            counterparty_id: r.counterparty_id,
            installment_index: position(r.installment_index, "installment_index")?,
            installment_count: position(r.installment_count, "installment_count")?,
            description: r.description,
            amount_minor: r.amount_minor,
            due_date: r.due_date,
            settled: r.settled,
            settled_at: r.settled_at,
            settled_amount_minor: r.settled_amount_minor,
            payment_method_id: r.payment_method_id,
            bank_account_id: r.bank_account_id,
            settlement_note: r.settlement_note,
        })
    }
}

/// [`InstallmentStore`] over the SQLite ledger.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl InstallmentStore for SqliteStore {
    async fn installments(&self) -> Result<Vec<InstallmentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments i \
             JOIN payables p ON p.id = i.payable_id ORDER BY i.due_date, i.id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InstallmentRecord::try_from).collect()
    }

    async fn counterparty_names(&self) -> Result<HashMap<i64, String>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM counterparties")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn installment(
        &self,
        id: InstallmentId,
    ) -> Result<Option<InstallmentRecord>, StoreError> {
        let row = sqlx::query_as::<_, InstallmentRow>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments i \
             JOIN payables p ON p.id = i.payable_id WHERE i.id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InstallmentRecord::try_from).transpose()
    }

    async fn find_settled_by_marker(&self, marker: &str) -> Result<Vec<InstallmentId>, StoreError> {
        // instr() rather than LIKE: external ids may contain % or _.
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM installments \
             WHERE settled = 1 AND instr(settlement_note, ?) > 0 ORDER BY id",
        )
        .bind(marker)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| InstallmentId(id)).collect())
    }

    async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError> {
        let rows =
            sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM payment_methods ORDER BY id")
                .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| PaymentMethod::new(id, &name))
            .collect())
    }

    async fn clear_settlement(&self, id: InstallmentId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE installments
            SET settled = 0, settled_at = NULL, settled_amount_minor = NULL,
                payment_method_id = NULL, bank_account_id = NULL, settlement_note = NULL
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn write_settlement(
        &self,
        id: InstallmentId,
        settlement: &Settlement,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE installments
            SET settled = 1, settled_at = ?, settled_amount_minor = ?,
                payment_method_id = ?, bank_account_id = ?, settlement_note = ?
            WHERE id = ?
            "#,
        )
        .bind(settlement.settled_at)
        .bind(settlement.amount_minor)
        .bind(settlement.payment_method_id)
        .bind(settlement.bank_account_id)
        .bind(&settlement.note)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(installment = %id, "settlement written");
        Ok(())
    }
}
