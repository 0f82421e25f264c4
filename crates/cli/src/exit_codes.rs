//! CLI Exit Code Registry
//!
//! Every exit code `aprledger` can return lives here. Scripts that schedule
//! monthly runs branch on these values, so they do not change meaning.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success (including runs that append zero rows)       |
//! | 1    | General error                                        |
//! | 2    | Usage error or missing input file                    |
//! | 3    | Configuration error (bad TOML, missing ledger sheet) |
//! | 4    | A workbook could not be read                         |
//! | 5    | Backup or save failed                                |

use aprledger_ingest::IngestError;

/// Command completed. Zero appended rows is still success.
pub const EXIT_SUCCESS: u8 = 0;

/// Unspecified failure, e.g. stdout closed while printing the summary.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments, or the ledger / monthly file does not exist.
pub const EXIT_USAGE: u8 = 2;

/// Config file invalid, or the ledger lacks the configured sheet.
pub const EXIT_CONFIG: u8 = 3;

/// Ledger or monthly workbook exists but could not be decoded.
pub const EXIT_READ: u8 = 4;

/// Backup copy, save, or `--output` write failed.
pub const EXIT_WRITE: u8 = 5;

pub fn ingest_exit_code(err: &IngestError) -> u8 {
    match err {
        IngestError::LedgerNotFound(_) | IngestError::MonthlyNotFound(_) => EXIT_USAGE,
        IngestError::SheetNotFound { .. } | IngestError::ConfigParse(_) | IngestError::ConfigValidation(_) => {
            EXIT_CONFIG
        }
        IngestError::MonthlyRead { .. } | IngestError::LedgerRead { .. } => EXIT_READ,
        IngestError::Backup { .. } | IngestError::Save { .. } => EXIT_WRITE,
    }
}
