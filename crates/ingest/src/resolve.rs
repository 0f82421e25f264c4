//! Column resolution: canonical monthly field → ledger column.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::config::{IngestConfig, ValueKind};
use crate::header::normalize_header;
use crate::model::MonthlyReport;
use crate::range::column_letters;

/// Normalized ledger header → 1-based column. Leftmost column wins.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    columns: HashMap<String, u32>,
}

impl HeaderIndex {
    pub fn new<'a>(headers: impl IntoIterator<Item = (u32, &'a str)>) -> Self {
        let mut columns = HashMap::new();
        for (col, header) in headers {
            let key = normalize_header(header);
            if key.is_empty() {
                continue;
            }
            columns
                .entry(key)
                .and_modify(|c: &mut u32| *c = (*c).min(col))
                .or_insert(col);
        }
        Self { columns }
    }

    pub fn find(&self, header: &str) -> Option<u32> {
        self.columns.get(&normalize_header(header)).copied()
    }

    /// First candidate spelling present in the ledger.
    pub fn resolve(&self, candidates: &[String]) -> Option<u32> {
        candidates.iter().find_map(|c| self.find(c))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    /// Canonical monthly label.
    pub monthly: String,
    /// 0-based column in the monthly report.
    pub monthly_index: usize,
    /// 1-based ledger column.
    pub column: u32,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnResolution {
    pub resolved: Vec<ResolvedColumn>,
    /// Mapped fields the monthly report does not carry.
    pub unmapped: Vec<String>,
    /// Field → ledger spellings tried without a match.
    pub unresolved: BTreeMap<String, Vec<String>>,
}

impl ColumnResolution {
    /// Field → column letter, for reporting.
    pub fn letter_map(&self) -> BTreeMap<String, String> {
        self.resolved
            .iter()
            .map(|r| (r.monthly.clone(), column_letters(r.column)))
            .collect()
    }
}

/// Resolve every configured mapping against the monthly columns and the
/// ledger header. Never fails; gaps are reported.
pub fn resolve_columns(
    config: &IngestConfig,
    report: &MonthlyReport,
    ledger: &HeaderIndex,
) -> ColumnResolution {
    let mut out = ColumnResolution::default();
    let mut claimed: HashMap<u32, String> = HashMap::new();

    for mapping in &config.columns {
        let Some(monthly_index) = report.column_index(&mapping.monthly) else {
            out.unmapped.push(mapping.monthly.clone());
            continue;
        };

        let Some(column) = ledger.resolve(&mapping.targets) else {
            warn!(
                "no ledger column for '{}' (tried {})",
                mapping.monthly,
                mapping.targets.join(", ")
            );
            out.unresolved.insert(mapping.monthly.clone(), mapping.targets.clone());
            continue;
        };

        if let Some(owner) = claimed.get(&column) {
            warn!(
                "ledger column {} already receives '{}', dropping '{}'",
                column_letters(column),
                owner,
                mapping.monthly
            );
            out.unresolved.insert(mapping.monthly.clone(), mapping.targets.clone());
            continue;
        }

        claimed.insert(column, mapping.monthly.clone());
        out.resolved.push(ResolvedColumn {
            monthly: mapping.monthly.clone(),
            monthly_index,
            column,
            kind: mapping.kind,
        });
    }

    out
}
