//! `aprledger-io`: workbook access for the ledger ingestion engine.
//!
//! Reads the monthly report with calamine, reads and patches the ledger
//! package part-by-part (zip + quick-xml), and runs the end-to-end ingestion.

pub mod backup;
pub mod ingest;
pub mod ledger;
pub mod monthly;
pub mod package;
pub mod shared_strings;
pub mod sheet_xml;
pub mod styles;
pub mod xml;

pub use ingest::{ingest, ingest_with_options, IngestOptions};
pub use ledger::{LedgerWorkbook, SaveReport};
