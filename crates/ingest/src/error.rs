use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum IngestError {
    /// The ledger workbook path does not exist.
    LedgerNotFound(PathBuf),
    /// The monthly report path does not exist.
    MonthlyNotFound(PathBuf),
    /// The ledger workbook has no sheet with the configured name.
    SheetNotFound { path: PathBuf, sheet: String, available: Vec<String> },
    /// The monthly report could not be opened or decoded.
    MonthlyRead { path: PathBuf, message: String },
    /// The ledger package could not be opened or decoded.
    LedgerRead { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty targets, duplicate labels, etc.).
    ConfigValidation(String),
    /// The pre-mutation backup copy failed.
    Backup { path: PathBuf, message: String },
    /// Writing the patched ledger back failed.
    Save { path: PathBuf, message: String },
}

impl IngestError {
    /// Errors caused by the inputs or configuration rather than by reading or
    /// writing a file that was found.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::LedgerNotFound(_)
                | Self::MonthlyNotFound(_)
                | Self::SheetNotFound { .. }
                | Self::ConfigParse(_)
                | Self::ConfigValidation(_)
        )
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LedgerNotFound(path) => write!(f, "ledger not found: {}", path.display()),
            Self::MonthlyNotFound(path) => {
                write!(f, "monthly report not found: {}", path.display())
            }
            Self::SheetNotFound { path, sheet, available } => {
                write!(f, "sheet '{sheet}' not found in {}", path.display())?;
                if !available.is_empty() {
                    write!(f, " (available: {})", available.join(", "))?;
                }
                Ok(())
            }
            Self::MonthlyRead { path, message } => {
                write!(f, "cannot read monthly report {}: {message}", path.display())
            }
            Self::LedgerRead { path, message } => {
                write!(f, "cannot read ledger {}: {message}", path.display())
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Backup { path, message } => {
                write!(f, "backup to {} failed: {message}", path.display())
            }
            Self::Save { path, message } => {
                write!(f, "cannot save ledger {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for IngestError {}
