use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::{IngestConfig, ValueKind};
use crate::key::KeyBuilder;
use crate::ledger::LedgerView;
use crate::model::{IngestPlan, IngestResult, MonthlyReport, RowAppend};
use crate::resolve::resolve_columns;
use crate::value::{coerce_amount, coerce_timestamp, CellValue};

/// Decide which monthly rows land in the ledger, and where. Pure: the view
/// is not modified.
pub fn plan(view: &LedgerView, report: &MonthlyReport, config: &IngestConfig) -> IngestPlan {
    // Pre-scan
    let headers = view.header_index();
    let last_row_before = view.last_used_row();
    let header_width = view.header_width();
    let rows_before = view.data_row_count();

    let keys = KeyBuilder::new(config, &headers, report);
    let mut existing: HashSet<_> = (2..=last_row_before)
        .filter_map(|row| keys.ledger_key(view, row))
        .collect();
    info!(
        "ledger '{}': {} data row(s), {} distinct key(s)",
        view.sheet(),
        rows_before,
        existing.len()
    );

    // Resolve
    let resolution = resolve_columns(config, report, &headers);
    for col in &resolution.resolved {
        debug!("'{}' -> column {}", col.monthly, crate::range::column_letters(col.column));
    }

    let mut plan = IngestPlan {
        sheet: view.sheet().to_string(),
        last_row_before,
        header_width,
        rows_before,
        appends: Vec::new(),
        duplicates_skipped: 0,
        blank_rows_skipped: 0,
        dedupe_fields: keys.fields(),
        resolution,
    };

    if plan.is_write_free() {
        info!("no monthly field resolved to a ledger column, nothing to write");
        return plan;
    }

    // Write loop
    let mut cursor = last_row_before + 1;
    for idx in 0..report.rows.len() {
        let key = keys.monthly_key(report, idx);
        if key.as_ref().is_some_and(|k| existing.contains(k)) {
            debug!("monthly row {}: duplicate, skipped", idx + 1);
            plan.duplicates_skipped += 1;
            continue;
        }

        let mut cells: Vec<(u32, CellValue)> = plan
            .resolution
            .resolved
            .iter()
            .map(|col| (col.column, write_value(col.kind, report.value(idx, col.monthly_index), config)))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        if cells.is_empty() {
            debug!("monthly row {}: no values, skipped", idx + 1);
            plan.blank_rows_skipped += 1;
            continue;
        }

        cells.sort_by_key(|(col, _)| *col);
        plan.appends.push(RowAppend { row: cursor, monthly_row: idx, cells });
        cursor += 1;
        if let Some(key) = key {
            existing.insert(key);
        }
    }

    info!(
        "planned {} row(s), {} duplicate(s) skipped, {} blank row(s) skipped",
        plan.rows_added(),
        plan.duplicates_skipped,
        plan.blank_rows_skipped
    );
    plan
}

/// The value a mapped cell receives in the ledger.
pub fn write_value(kind: ValueKind, value: &CellValue, config: &IngestConfig) -> CellValue {
    match kind {
        ValueKind::Timestamp => coerce_timestamp(value).map(CellValue::Timestamp).unwrap_or_default(),
        ValueKind::Amount => match coerce_amount(value, &config.amount_strip) {
            Ok(n) => CellValue::Number(n),
            Err(_) => value.trimmed_text(),
        },
        ValueKind::Text => value.trimmed_text(),
        ValueKind::Raw => match value {
            CellValue::Text(_) => value.trimmed_text(),
            other => other.clone(),
        },
    }
}

/// Where the run's output went and what the post-write sheet looks like.
pub struct RunOutcome<'a> {
    pub after: &'a LedgerView,
    pub ledger_path: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub dates_normalized: usize,
    pub date_formulas_skipped: usize,
    pub dry_run: bool,
    pub run_at: DateTime<Utc>,
}

/// Assemble the caller-facing summary.
pub fn summarize(plan: &IngestPlan, outcome: RunOutcome<'_>) -> IngestResult {
    IngestResult {
        master_backup: outcome.backup_path,
        updated_master: outcome.ledger_path,
        sheet: plan.sheet.clone(),
        rows_before: plan.rows_before,
        rows_added: plan.rows_added(),
        rows_after: outcome.after.data_row_count(),
        dedupe_skipped: plan.duplicates_skipped,
        blank_rows_skipped: plan.blank_rows_skipped,
        dates_normalized: outcome.dates_normalized,
        date_formulas_skipped: outcome.date_formulas_skipped,
        unmapped_monthly_columns: plan.resolution.unmapped.clone(),
        unresolved_targets: plan.resolution.unresolved.clone(),
        resolved_map: plan.resolution.letter_map(),
        dry_run: outcome.dry_run,
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: outcome.run_at.to_rfc3339(),
    }
}
