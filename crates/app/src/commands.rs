use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use baixa_core::{InstallmentId, Money};
use baixa_import::{normalize_rows, read_rows};
use baixa_reconcile::{
    BatchOrchestrator, CandidateIndex, CommitDefaults, ReconcileError, ReconciliationBatch,
    ReconciliationItem, SelectionError, SettlementCommitter,
};
use baixa_storage::{create_db, seed_default_payment_methods, SqliteStore};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Commit errors printed in full; the rest are only counted.
const ERROR_DISPLAY_LIMIT: usize = 20;

pub struct Context {
    pub config: AppConfig,
    pub database: PathBuf,
    pub review: PathBuf,
}

/// A matched statement waiting for review, as saved between commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewFile {
    pub statement: PathBuf,
    pub items: Vec<ReconciliationItem>,
}

impl ReviewFile {
    fn load(path: &Path) -> Result<(PathBuf, ReconciliationBatch)> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!("No review at {}; run `baixa match` first", path.display())
        })?;
        let file: ReviewFile = serde_json::from_str(&content)
            .with_context(|| format!("Malformed review file {}", path.display()))?;
        let batch = ReconciliationBatch::from_items(file.items)
            .with_context(|| format!("Review file {} is inconsistent", path.display()))?;
        Ok((file.statement, batch))
    }

    fn save(path: &Path, statement: &Path, batch: &ReconciliationBatch) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ReviewFile {
            statement: statement.to_path_buf(),
            items: batch.items().to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write review {}", path.display()))?;
        Ok(())
    }
}

async fn open_store(path: &Path) -> Result<SqliteStore> {
    if !path.exists() {
        bail!("Database {} not found; run `baixa init` first", path.display());
    }
    let pool = create_db(path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(SqliteStore::new(pool))
}

pub async fn init(ctx: &Context) -> Result<()> {
    if let Some(parent) = ctx.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let pool = create_db(&ctx.database)
        .await
        .with_context(|| format!("Failed to create database {}", ctx.database.display()))?;
    seed_default_payment_methods(&pool).await?;
    pool.close().await;
    println!("Database ready at {}", ctx.database.display());
    Ok(())
}

pub async fn run_match(ctx: &Context, statement: &Path) -> Result<()> {
    let file = std::fs::File::open(statement)
        .with_context(|| format!("Failed to open statement {}", statement.display()))?;
    let rows = read_rows(file, ctx.config.delimiter_byte()?)
        .with_context(|| format!("Failed to read statement {}", statement.display()))?;
    let transactions = normalize_rows(&rows, &ctx.config.mapping);
    info!(rows = rows.len(), outbound = transactions.len(), "statement read");

    let store = open_store(&ctx.database).await?;
    let index = CandidateIndex::load(&store).await?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; stopping after the current chunk");
                cancel.cancel();
            }
        }
    });

    let result = BatchOrchestrator::new(&ctx.config.engine, &index, &index)
        .run(transactions, &cancel, |p| {
            info!(processed = p.processed, total = p.total, "matching")
        })
        .await;
    interrupt.abort();

    let batch = match result {
        Ok(batch) => batch,
        Err(ReconcileError::Cancelled { processed, total }) => {
            println!("Cancelled after {processed} of {total} lines; nothing was saved.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    ReviewFile::save(&ctx.review, statement, &batch)?;
    print_summary(&batch);
    println!("Review saved to {}", ctx.review.display());
    Ok(())
}

fn count(items: &[ReconciliationItem], f: impl Fn(&ReconciliationItem) -> bool) -> usize {
    items.iter().filter(|i| f(i)).count()
}

fn print_summary(batch: &ReconciliationBatch) {
    let items = batch.items();
    println!("{} outbound lines", items.len());
    println!("  confirmed:        {}", count(items, |i| i.is_confirmed()));
    println!(
        "  selected only:    {}",
        count(items, |i| i.selected_installment_id().is_some() && !i.is_confirmed())
    );
    println!(
        "  needs review:     {}",
        count(items, |i| {
            !i.is_duplicate() && !i.candidates().is_empty() && i.selected_installment_id().is_none()
        })
    );
    println!(
        "  no candidates:    {}",
        count(items, |i| !i.is_duplicate() && i.candidates().is_empty())
    );
    println!("  already settled:  {}", count(items, |i| i.is_duplicate()));
    if !batch.can_commit() {
        println!("  conflicts:        {}", batch.conflicts().len());
    }
}

pub async fn review(ctx: &Context) -> Result<()> {
    let (statement, batch) = ReviewFile::load(&ctx.review)?;
    let store = open_store(&ctx.database).await?;
    let index = CandidateIndex::load(&store).await?;

    println!("Statement: {}", statement.display());
    for (row, item) in batch.items().iter().enumerate() {
        print_item(row, item, &batch, &index);
    }
    print_conflicts(&batch);
    Ok(())
}

fn print_item(
    row: usize,
    item: &ReconciliationItem,
    batch: &ReconciliationBatch,
    index: &CandidateIndex,
) {
    let tx = item.transaction();
    let flag = if batch.is_conflicted(row) { " CONFLICT" } else { "" };
    println!(
        "#{row:<4} {}  {:>12}  {}{}{flag}",
        tx.date,
        Money::from_minor(tx.amount_minor).to_string(),
        tx.description,
        tx.external_id().map(|id| format!("  [{id}]")).unwrap_or_default(),
    );

    if let Some(prior) = item.prior_settlement() {
        println!("       already reconciled with installment {prior}");
        return;
    }
    if item.candidates().is_empty() {
        println!("       no candidates");
        return;
    }
    for candidate in item.candidates() {
        let selected = item.selected_installment_id() == Some(candidate.installment_id);
        let mark = match (selected, item.is_confirmed()) {
            (true, true) => "[x]",
            (true, false) => "[~]",
            _ => "[ ]",
        };
        let (name, due) = index
            .get(candidate.installment_id)
            .map(|i| (i.display_name().to_string(), i.due_date.to_string()))
            .unwrap_or_else(|| ("?".to_string(), "?".to_string()));
        println!(
            "       {mark} {:<6} {:.2}  {name}  due {due}  diff {} / {}d{}",
            candidate.installment_id.0,
            candidate.score,
            Money::from_minor(candidate.amount_diff_minor),
            candidate.date_diff_days,
            if candidate.was_already_settled { "  (settled)" } else { "" },
        );
    }
}

fn print_conflicts(batch: &ReconciliationBatch) {
    if batch.can_commit() {
        return;
    }
    println!("Conflicts (resolve before committing):");
    for (installment, rows) in batch.conflicts().iter() {
        let rows: Vec<String> = rows.iter().map(|r| format!("#{r}")).collect();
        println!("  installment {installment} claimed by {}", rows.join(", "));
    }
}

/// Loads the saved review, applies `change`, and saves it back.
fn edit_review<F>(ctx: &Context, change: F) -> Result<()>
where
    F: FnOnce(&mut ReconciliationBatch) -> Result<(), SelectionError>,
{
    let (statement, mut batch) = ReviewFile::load(&ctx.review)?;
    change(&mut batch)?;
    ReviewFile::save(&ctx.review, &statement, &batch)?;
    print_conflicts(&batch);
    Ok(())
}

pub fn select(
    ctx: &Context,
    row: usize,
    installment: i64,
    override_settlement: bool,
    confirm: bool,
) -> Result<()> {
    edit_review(ctx, |batch| {
        batch.select(row, InstallmentId(installment), override_settlement)?;
        if confirm {
            batch.confirm(row)?;
        }
        Ok(())
    })
}

pub fn clear(ctx: &Context, row: usize) -> Result<()> {
    edit_review(ctx, |batch| batch.clear_selection(row))
}

pub fn confirm(ctx: &Context, row: usize) -> Result<()> {
    edit_review(ctx, |batch| batch.confirm(row))
}

pub fn unconfirm(ctx: &Context, row: usize) -> Result<()> {
    edit_review(ctx, |batch| batch.unconfirm(row))
}

pub async fn commit(ctx: &Context) -> Result<()> {
    let (statement, mut batch) = ReviewFile::load(&ctx.review)?;
    let plan = match batch.commit_plan() {
        Ok(plan) => plan,
        Err(ReconcileError::Conflicts(_)) => {
            print_conflicts(&batch);
            bail!("Commit blocked: an installment is claimed by more than one confirmed line");
        }
        Err(e) => return Err(e.into()),
    };
    if plan.is_empty() {
        println!("Nothing confirmed to commit.");
        return Ok(());
    }

    let store = open_store(&ctx.database).await?;
    let today = chrono::Local::now().date_naive();
    let defaults = CommitDefaults::from_config(&ctx.config.engine);
    let report = SettlementCommitter::new(&store, defaults, today)
        .commit(&plan)
        .await?;

    println!("Inserted:   {}", report.inserted);
    println!("Overridden: {}", report.overridden);
    println!("Errors:     {}", report.errored);
    for message in report.error_messages(ERROR_DISPLAY_LIMIT) {
        println!("  {message}");
    }
    if report.errored > ERROR_DISPLAY_LIMIT {
        println!("  ... and {} more", report.errored - ERROR_DISPLAY_LIMIT);
    }

    if report.errored == 0 {
        std::fs::remove_file(&ctx.review)
            .with_context(|| format!("Failed to remove review {}", ctx.review.display()))?;
    } else {
        batch.record_commit(&report);
        ReviewFile::save(&ctx.review, &statement, &batch)?;
        println!(
            "Review kept at {} with the {} failed row(s) still confirmed",
            ctx.review.display(),
            report.errored
        );
    }
    Ok(())
}
