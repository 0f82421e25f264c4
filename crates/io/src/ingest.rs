//! One ingestion run: load both workbooks, plan, back up, write back.

use std::path::Path;

use aprledger_ingest::engine::{summarize, RunOutcome};
use aprledger_ingest::header::{normalize_monthly, AliasTable};
use aprledger_ingest::range::maintain;
use aprledger_ingest::{plan, IngestConfig, IngestError, IngestResult};
use chrono::{Local, Utc};
use log::{info, warn};

use crate::backup::backup_ledger;
use crate::ledger::LedgerWorkbook;
use crate::monthly::read_monthly;

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Plan and report only: no backup, no save.
    pub dry_run: bool,
}

/// Append the monthly report's new rows to the ledger sheet, in place.
pub fn ingest(ledger: &Path, monthly: &Path, config: &IngestConfig) -> Result<IngestResult, IngestError> {
    ingest_with_options(ledger, monthly, config, IngestOptions::default())
}

pub fn ingest_with_options(
    ledger: &Path,
    monthly: &Path,
    config: &IngestConfig,
    options: IngestOptions,
) -> Result<IngestResult, IngestError> {
    if !ledger.is_file() {
        return Err(IngestError::LedgerNotFound(ledger.to_path_buf()));
    }
    if !monthly.is_file() {
        return Err(IngestError::MonthlyNotFound(monthly.to_path_buf()));
    }

    let started = Local::now();
    let raw = read_monthly(monthly, &config.monthly)?;
    let report = normalize_monthly(raw, &AliasTable::from_config(config));

    let workbook = LedgerWorkbook::open(ledger, &config.ledger_sheet)?;
    let view = workbook.view();
    let plan = plan(view, &report, config);

    let backup_path = if options.dry_run {
        None
    } else {
        Some(backup_ledger(ledger, &config.backup_dir, started.naive_local())?)
    };

    if plan.is_write_free() {
        warn!("no monthly column maps onto the '{}' header, ledger left unchanged", plan.sheet);
        return Ok(summarize(
            &plan,
            RunOutcome {
                after: view,
                ledger_path: ledger.to_path_buf(),
                backup_path,
                dates_normalized: 0,
                date_formulas_skipped: 0,
                dry_run: options.dry_run,
                run_at: started.with_timezone(&Utc),
            },
        ));
    }

    let after = view.with_appends(&plan.appends);
    let mut edits = maintain(&after, &workbook.ranges(), config);
    let mut date_formulas_skipped = workbook.drop_formula_date_fixes(&mut edits);

    let dates_normalized = if options.dry_run {
        edits.date_fixes.len()
    } else {
        let report = workbook.save(&plan, &edits, &config.date_format, ledger)?;
        info!("saved {} ({})", ledger.display(), report.parts_rewritten.join(", "));
        date_formulas_skipped += report.formula_cells_skipped;
        report.dates_normalized
    };

    Ok(summarize(
        &plan,
        RunOutcome {
            after: &after,
            ledger_path: ledger.to_path_buf(),
            backup_path,
            dates_normalized,
            date_formulas_skipped,
            dry_run: options.dry_run,
            run_at: started.with_timezone(&Utc),
        },
    ))
}
