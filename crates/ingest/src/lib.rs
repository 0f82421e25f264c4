//! `aprledger-ingest`: column reconciliation and deduplicated-append engine.
//!
//! Pure engine crate: receives a pre-loaded ledger view and monthly report,
//! returns an explicit append plan and range edits. No file IO.

pub mod config;
pub mod engine;
pub mod error;
pub mod header;
pub mod key;
pub mod ledger;
pub mod model;
pub mod range;
pub mod resolve;
pub mod value;

pub use config::IngestConfig;
pub use engine::plan;
pub use error::IngestError;
pub use ledger::LedgerView;
pub use model::{IngestPlan, IngestResult, MonthlyReport, RawTable, RowAppend};
pub use value::CellValue;
