//! # Report Builder
//!
//! Generates periodic business reports from tabular CSV/Excel extracts by
//! populating fixed Office templates.
//!
//! ## Features
//!
//! - **Slide decks**: one slide per entity, cloned from a single template slide
//!   whose regions are found by content and position, then merged into one deck
//! - **Charts**: weekly bar charts and double donut charts rendered to PNG
//! - **Structural validation**: output tables are checked against the template's
//!   fixed geometry
//! - **Monthly workbooks**: campaign promotion cost and point usage spreadsheets
//!   filled in place from extracts
//!
//! ## Commands
//!
//! - `deck`: generate the entity deck for a period
//! - `validate`: check a deck against the template
//! - `monthly`: generate the monthly spreadsheet reports
pub mod chart;
pub mod config;
pub mod deck;
pub mod error;
mod helpers;
mod package;
pub mod report;
pub mod tabular;
pub mod workbook;

pub use config::ReportConfig;
pub use error::ReportError;
