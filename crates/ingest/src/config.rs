use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::IngestError;
use crate::header::normalize_header;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything the engine needs to know about the ledger and monthly schemas.
///
/// `IngestConfig::default()` is the built-in APR Bundle schema; a TOML file
/// can override any section.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_ledger_sheet")]
    pub ledger_sheet: String,
    #[serde(default)]
    pub monthly: MonthlyConfig,
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnMapping>,
    #[serde(default = "default_dedupe")]
    pub dedupe: Vec<DedupeField>,
    /// Monthly header alias → canonical monthly label.
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,
    /// Ledger header whose cells are re-typed as dates after every run.
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Tokens removed from amount text before parsing.
    #[serde(default = "default_amount_strip")]
    pub amount_strip: Vec<String>,
    /// Backup directory, relative to the ledger's directory.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

// ---------------------------------------------------------------------------
// Monthly report layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyConfig {
    /// Sheet to read; the first sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
    /// 0-based physical row holding the headers.
    #[serde(default = "default_header_row")]
    pub header_row: u32,
}

impl Default for MonthlyConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: default_header_row(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping + dedupe fields
// ---------------------------------------------------------------------------

/// How a value is typed when it is written or keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// As read; text trimmed.
    #[default]
    Raw,
    /// Always text; numbers use their display form.
    Text,
    /// Numeric after stripping separators; raw text when unparseable.
    Amount,
    /// Datetime truncated to whole seconds; empty when unparseable.
    Timestamp,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Text => write!(f, "text"),
            Self::Amount => write!(f, "amount"),
            Self::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// A canonical monthly field and the ledger header spellings it may land in.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    pub monthly: String,
    pub targets: Vec<String>,
    #[serde(default)]
    pub kind: ValueKind,
}

/// One position of the identity key.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupeField {
    /// Ledger header carrying this field.
    pub ledger: String,
    /// Canonical monthly label carrying this field.
    pub monthly: String,
    #[serde(default)]
    pub kind: ValueKind,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_ledger_sheet() -> String {
    "APR Bundle".into()
}

fn default_header_row() -> u32 {
    3
}

fn default_date_column() -> String {
    "Purchase Date".into()
}

fn default_date_format() -> String {
    "yyyy-mm-dd hh:mm:ss".into()
}

fn default_amount_strip() -> Vec<String> {
    vec![",".into(), "$".into()]
}

fn default_backup_dir() -> String {
    "_backups".into()
}

fn mapping(monthly: &str, targets: &[&str], kind: ValueKind) -> ColumnMapping {
    ColumnMapping {
        monthly: monthly.into(),
        targets: targets.iter().map(|t| t.to_string()).collect(),
        kind,
    }
}

fn default_columns() -> Vec<ColumnMapping> {
    vec![
        mapping("Cust Name", &["CUSTOMER_NAME"], ValueKind::Raw),
        mapping("Cust Type", &["CUSTOMER_TYPE"], ValueKind::Raw),
        mapping("MSISDN", &["MSISDN"], ValueKind::Text),
        mapping("Purchase Date", &["Purchase Date"], ValueKind::Timestamp),
        mapping("Prod Name", &["PRODUCT_NAME"], ValueKind::Raw),
        mapping("Amount", &["PURCHASE_AMT"], ValueKind::Amount),
        mapping("Package Status", &["STAT"], ValueKind::Raw),
        mapping("API Credit Type", &["API Credit Type", "API  Credit Type"], ValueKind::Raw),
        mapping("Prod Code", &["PRODUCT_ID"], ValueKind::Raw),
        mapping("CRTR_ID", &["CONTRACT_ID"], ValueKind::Raw),
    ]
}

fn dedupe(ledger: &str, monthly: &str, kind: ValueKind) -> DedupeField {
    DedupeField {
        ledger: ledger.into(),
        monthly: monthly.into(),
        kind,
    }
}

fn default_dedupe() -> Vec<DedupeField> {
    vec![
        dedupe("MSISDN", "MSISDN", ValueKind::Text),
        dedupe("Purchase Date", "Purchase Date", ValueKind::Timestamp),
        dedupe("PRODUCT_NAME", "Prod Name", ValueKind::Raw),
        dedupe("PURCHASE_AMT", "Amount", ValueKind::Amount),
        dedupe("CONTRACT_ID", "CRTR_ID", ValueKind::Raw),
        dedupe("PRODUCT_ID", "Prod Code", ValueKind::Raw),
    ]
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("cust name", "Cust Name"),
        ("customer name", "Cust Name"),
        ("cust type", "Cust Type"),
        ("customer type", "Cust Type"),
        ("msisdn", "MSISDN"),
        ("purchase date", "Purchase Date"),
        ("date", "Purchase Date"),
        ("prod name", "Prod Name"),
        ("product name", "Prod Name"),
        ("amount", "Amount"),
        ("purchase amount", "Amount"),
        ("purchase amt", "Amount"),
        ("package status", "Package Status"),
        ("stat", "Package Status"),
        ("api credit type", "API Credit Type"),
        ("prod code", "Prod Code"),
        ("product id", "Prod Code"),
        ("crtr_id", "CRTR_ID"),
        ("crtr id", "CRTR_ID"),
        ("contract id", "CRTR_ID"),
    ]
    .into_iter()
    .map(|(alias, label)| (alias.to_string(), label.to_string()))
    .collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ledger_sheet: default_ledger_sheet(),
            monthly: MonthlyConfig::default(),
            columns: default_columns(),
            dedupe: default_dedupe(),
            aliases: default_aliases(),
            date_column: default_date_column(),
            date_format: default_date_format(),
            amount_strip: default_amount_strip(),
            backup_dir: default_backup_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl IngestConfig {
    pub fn from_toml(input: &str) -> Result<Self, IngestError> {
        let config: IngestConfig =
            toml::from_str(input).map_err(|e| IngestError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.ledger_sheet.trim().is_empty() {
            return Err(IngestError::ConfigValidation("ledger_sheet must not be empty".into()));
        }

        if self.columns.is_empty() {
            return Err(IngestError::ConfigValidation(
                "at least one [[columns]] mapping is required".into(),
            ));
        }

        let mut labels = HashSet::new();
        for col in &self.columns {
            if col.monthly.trim().is_empty() {
                return Err(IngestError::ConfigValidation(
                    "column mapping has an empty monthly label".into(),
                ));
            }
            if col.targets.iter().all(|t| t.trim().is_empty()) {
                return Err(IngestError::ConfigValidation(format!(
                    "column '{}': targets must list at least one ledger header",
                    col.monthly
                )));
            }
            if !labels.insert(normalize_header(&col.monthly)) {
                return Err(IngestError::ConfigValidation(format!(
                    "column '{}' is mapped more than once",
                    col.monthly
                )));
            }
        }

        let alias_labels: HashSet<String> =
            self.aliases.values().map(|label| normalize_header(label)).collect();
        for field in &self.dedupe {
            if field.ledger.trim().is_empty() {
                return Err(IngestError::ConfigValidation(format!(
                    "dedupe field '{}': ledger header must not be empty",
                    field.monthly
                )));
            }
            let monthly = normalize_header(&field.monthly);
            if !labels.contains(&monthly) && !alias_labels.contains(&monthly) {
                return Err(IngestError::ConfigValidation(format!(
                    "dedupe field '{}': monthly label '{}' is neither a mapped column nor an alias target",
                    field.ledger, field.monthly
                )));
            }
        }

        if self.date_format.trim().is_empty() {
            return Err(IngestError::ConfigValidation("date_format must not be empty".into()));
        }

        if self.backup_dir.trim().is_empty() {
            return Err(IngestError::ConfigValidation("backup_dir must not be empty".into()));
        }

        Ok(())
    }

    /// The mapping for a canonical monthly label, if any.
    pub fn column(&self, monthly: &str) -> Option<&ColumnMapping> {
        let wanted = normalize_header(monthly);
        self.columns.iter().find(|c| normalize_header(&c.monthly) == wanted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOM: &str = r#"
ledger_sheet = "Ledger"
date_column = "When"

[monthly]
sheet = "Export"
header_row = 0

[[columns]]
monthly = "Phone"
targets = ["PHONE", "PHONE NO"]
kind = "text"

[[columns]]
monthly = "Paid"
targets = ["AMOUNT"]
kind = "amount"

[[columns]]
monthly = "When"
targets = ["When"]
kind = "timestamp"

[[dedupe]]
ledger = "PHONE"
monthly = "Phone"
kind = "text"

[[dedupe]]
ledger = "When"
monthly = "When"
kind = "timestamp"

[aliases]
"mobile" = "Phone"
"paid amount" = "Paid"
"#;

    #[test]
    fn default_schema_is_valid() {
        let config = IngestConfig::default();
        config.validate().unwrap();
        assert_eq!(config.ledger_sheet, "APR Bundle");
        assert_eq!(config.monthly.header_row, 3);
        assert_eq!(config.columns.len(), 10);
        assert_eq!(config.dedupe.len(), 6);
        assert_eq!(config.aliases["contract id"], "CRTR_ID");
        assert_eq!(
            config.column("api credit type").unwrap().targets,
            vec!["API Credit Type", "API  Credit Type"]
        );
    }

    #[test]
    fn empty_toml_yields_default_schema() {
        let config = IngestConfig::from_toml("").unwrap();
        assert_eq!(config.ledger_sheet, "APR Bundle");
        assert_eq!(config.date_format, "yyyy-mm-dd hh:mm:ss");
        assert_eq!(config.backup_dir, "_backups");
    }

    #[test]
    fn parse_custom_schema() {
        let config = IngestConfig::from_toml(CUSTOM).unwrap();
        assert_eq!(config.ledger_sheet, "Ledger");
        assert_eq!(config.monthly.sheet.as_deref(), Some("Export"));
        assert_eq!(config.monthly.header_row, 0);
        assert_eq!(config.columns.len(), 3);
        assert_eq!(config.columns[0].kind, ValueKind::Text);
        assert_eq!(config.columns[1].kind, ValueKind::Amount);
        assert_eq!(config.dedupe[1].kind, ValueKind::Timestamp);
        assert_eq!(config.aliases.len(), 2);
        // Unlisted sections keep their defaults
        assert_eq!(config.amount_strip, vec![",", "$"]);
    }

    #[test]
    fn kind_defaults_to_raw() {
        let input = r#"
[[columns]]
monthly = "Cust Name"
targets = ["CUSTOMER_NAME"]

[[dedupe]]
ledger = "CUSTOMER_NAME"
monthly = "Cust Name"
"#;
        let config = IngestConfig::from_toml(input).unwrap();
        assert_eq!(config.columns[0].kind, ValueKind::Raw);
        assert_eq!(config.dedupe[0].kind, ValueKind::Raw);
    }

    #[test]
    fn reject_unknown_kind() {
        let input = r#"
[[columns]]
monthly = "Amount"
targets = ["PURCHASE_AMT"]
kind = "money"
"#;
        let err = IngestConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, IngestError::ConfigParse(_)));
    }

    #[test]
    fn reject_duplicate_monthly_label() {
        let input = r#"
dedupe = []

[[columns]]
monthly = "Amount"
targets = ["PURCHASE_AMT"]

[[columns]]
monthly = "amount "
targets = ["OTHER"]
"#;
        let err = IngestConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("mapped more than once"));
    }

    #[test]
    fn reject_mapping_without_targets() {
        let input = r#"
dedupe = []

[[columns]]
monthly = "Amount"
targets = []
"#;
        let err = IngestConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("targets"));
    }

    #[test]
    fn reject_dedupe_on_unknown_monthly_label() {
        let input = r#"
aliases = {}

[[columns]]
monthly = "Amount"
targets = ["PURCHASE_AMT"]

[[dedupe]]
ledger = "MSISDN"
monthly = "Phone"
"#;
        let err = IngestConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'Phone'"));
    }

    #[test]
    fn reject_empty_sheet_name() {
        let err = IngestConfig::from_toml("ledger_sheet = \"  \"").unwrap_err();
        assert!(err.to_string().contains("ledger_sheet"));
    }
}
