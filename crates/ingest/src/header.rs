//! Header normalization and alias resolution.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::config::IngestConfig;
use crate::model::{MonthlyReport, RawTable};

/// Canonical comparison form: whitespace runs collapsed, trimmed, lowercased.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Normalized alias → canonical monthly label.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    pub fn from_config(config: &IngestConfig) -> Self {
        let mut table = Self::default();
        // Canonical labels first so explicit aliases can't shadow them
        for col in &config.columns {
            table.insert(&col.monthly, &col.monthly);
        }
        for field in &config.dedupe {
            table.insert(&field.monthly, &field.monthly);
        }
        for (alias, label) in &config.aliases {
            table.map.entry(normalize_header(alias)).or_insert_with(|| label.clone());
            table.insert(label, label);
        }
        table
    }

    fn insert(&mut self, alias: &str, label: &str) {
        self.map.entry(normalize_header(alias)).or_insert_with(|| label.to_string());
    }

    /// Canonical label for `raw`, or `raw` unchanged when it is not an alias.
    pub fn canonicalize(&self, raw: &str) -> String {
        self.map
            .get(&normalize_header(raw))
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}

/// Drop empty columns and relabel the rest with canonical names.
pub fn normalize_monthly(table: RawTable, aliases: &AliasTable) -> MonthlyReport {
    let width = table
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(table.headers.len()))
        .max()
        .unwrap_or(0);

    let mut keep = Vec::new();
    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for idx in 0..width {
        let has_data = table
            .rows
            .iter()
            .any(|row| row.get(idx).is_some_and(|v| !v.trimmed_text().is_empty()));
        if !has_data {
            continue;
        }

        let raw = table.headers.get(idx).map(|h| h.trim()).unwrap_or("");
        let label = if raw.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            aliases.canonicalize(raw)
        };

        let label = if seen.insert(normalize_header(&label)) {
            label
        } else {
            debug!("monthly column {} '{}' repeats label '{}', keeping raw header", idx + 1, raw, label);
            let fallback = if raw.is_empty() { format!("column_{}", idx + 1) } else { raw.to_string() };
            seen.insert(normalize_header(&fallback));
            fallback
        };

        keep.push(idx);
        columns.push(label);
    }

    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            keep.iter()
                .map(|&idx| row.get(idx).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    MonthlyReport { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.into())
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_header("  API  Credit\tType "), "api credit type");
        assert_eq!(normalize_header("MSISDN"), "msisdn");
        assert_eq!(normalize_header("   "), "");
    }

    #[test]
    fn aliases_map_to_canonical_labels() {
        let aliases = AliasTable::from_config(&IngestConfig::default());
        assert_eq!(aliases.canonicalize("Customer  Name"), "Cust Name");
        assert_eq!(aliases.canonicalize("cust name"), "Cust Name");
        assert_eq!(aliases.canonicalize(" CONTRACT ID "), "CRTR_ID");
        assert_eq!(aliases.canonicalize("api   credit type"), "API Credit Type");
        // Unknown headers pass through untouched
        assert_eq!(aliases.canonicalize("Region Code"), "Region Code");
    }

    #[test]
    fn empty_columns_are_dropped() {
        let table = RawTable {
            headers: vec!["MSISDN".into(), "Unnamed".into(), "Amount".into()],
            rows: vec![
                vec![text("2783"), CellValue::Empty, CellValue::Number(10.0)],
                vec![text("2784"), text("   "), CellValue::Number(12.0)],
            ],
        };
        let report = normalize_monthly(table, &AliasTable::from_config(&IngestConfig::default()));
        assert_eq!(report.columns, vec!["MSISDN", "Amount"]);
        assert_eq!(report.rows[1], vec![text("2784"), CellValue::Number(12.0)]);
    }

    #[test]
    fn blank_header_with_data_gets_placeholder() {
        let table = RawTable {
            headers: vec!["Amount".into()],
            rows: vec![vec![CellValue::Number(5.0), text("note")]],
        };
        let report = normalize_monthly(table, &AliasTable::default());
        assert_eq!(report.columns, vec!["Amount", "column_2"]);
    }

    #[test]
    fn repeated_label_keeps_first_column() {
        let table = RawTable {
            headers: vec!["Amount".into(), "Purchase Amount".into()],
            rows: vec![vec![CellValue::Number(1.0), CellValue::Number(2.0)]],
        };
        let report = normalize_monthly(table, &AliasTable::from_config(&IngestConfig::default()));
        assert_eq!(report.columns, vec!["Amount", "Purchase Amount"]);
        assert_eq!(report.column_index("Amount"), Some(0));
    }
}
