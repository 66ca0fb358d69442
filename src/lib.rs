//! Normalize heterogeneous bank and card exports into one canonical
//! transaction record: date, cleaned merchant name, signed amount, type,
//! category, fundamental and the essential/fixed flags.
//!
//! The [`engine::Engine`] composes five replaceable strategies
//! ([`extract::FieldExtractor`], [`dates::DateNormalizer`],
//! [`names::NameCleaner`], [`amounts::AmountNormalizer`],
//! [`categorizer::Classifier`]) and never performs I/O itself; the
//! [`importer`] adapters turn files into [`models::RawRow`]s.

pub mod amounts;
pub mod assembler;
pub mod categorizer;
pub mod dates;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fmt;
pub mod importer;
pub mod models;
pub mod names;
pub mod rules;
pub mod settings;

pub use engine::{BatchReport, Engine, EngineBuilder, ErrorPolicy};
pub use error::{Result, RowError, RowErrorKind, TxnormError};
pub use models::{CanonicalTransaction, CellValue, Fundamental, RawRow, TransactionType};
