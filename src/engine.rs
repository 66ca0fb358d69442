//! The normalization engine: composes the per-row strategies, applies the
//! error policy and keeps results in input order.

use std::borrow::Borrow;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::amounts::{AmountConvention, AmountNormalizer, StandardAmountNormalizer};
use crate::assembler::{assemble, SignPolicy};
use crate::categorizer::{Classifier, RuleClassifier};
use crate::dates::{DateNormalizer, LocaleDateNormalizer};
use crate::error::{Result, RowError, RowErrorKind};
use crate::extract::{FieldExtractor, RawAmount, RoleExtractor};
use crate::models::{CanonicalTransaction, CellValue, RawRow};
use crate::names::{NameCleaner, PatternNameCleaner};
use crate::rules::RuleSet;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Omit failing rows and report them alongside the output.
    #[default]
    SkipAndReport,
    /// Stop at the first failing row.
    FailFast,
}

/// Output of a whole batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub transactions: Vec<CanonicalTransaction>,
    /// Rejected rows in input order.
    pub rejected: Vec<RowError>,
}

impl BatchReport {
    pub fn total_rows(&self) -> usize {
        self.transactions.len() + self.rejected.len()
    }
}

pub struct Engine {
    extractor: Box<dyn FieldExtractor>,
    dates: Box<dyn DateNormalizer>,
    names: Box<dyn NameCleaner>,
    amounts: Box<dyn AmountNormalizer>,
    classifier: Box<dyn Classifier>,
    sign_policy: SignPolicy,
    convention: AmountConvention,
    error_policy: ErrorPolicy,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Normalize a single row. `index` is its zero-based position in the input.
    pub fn process_row(
        &self,
        index: usize,
        row: &RawRow,
    ) -> std::result::Result<CanonicalTransaction, RowError> {
        self.normalize(row).map_err(|kind| RowError::new(index, kind))
    }

    fn normalize(&self, row: &RawRow) -> std::result::Result<CanonicalTransaction, RowErrorKind> {
        let fields = self.extractor.extract(row)?;
        let date = self.dates.normalize(&fields.date)?;
        let amount = self.convention.apply(self.resolve_amount(&fields.amount)?);
        let name = self.names.clean(&fields.description.to_text());
        let classification = self.classifier.classify(&name, amount);
        assemble(date, name, amount, classification, &self.sign_policy)
            .map_err(RowErrorKind::InvalidRecord)
    }

    /// Split columns give `credit - |debit|`; a blank side counts as zero.
    fn resolve_amount(&self, raw: &RawAmount) -> std::result::Result<f64, RowErrorKind> {
        match raw {
            RawAmount::Single(cell) => self.amounts.normalize(cell),
            RawAmount::Split { debit, credit } => {
                let side = |cell: &CellValue| {
                    if cell.is_blank() {
                        Ok(None)
                    } else {
                        self.amounts.normalize(cell).map(Some)
                    }
                };
                match (side(debit)?, side(credit)?) {
                    (None, None) => Err(RowErrorKind::UnparseableAmount { raw: String::new() }),
                    (debit, credit) => Ok(credit.unwrap_or(0.0) - debit.unwrap_or(0.0).abs()),
                }
            }
        }
    }

    /// Lazily normalize `rows`, one result per input row, in input order.
    pub fn process<'a, I>(
        &'a self,
        rows: I,
    ) -> impl Iterator<Item = std::result::Result<CanonicalTransaction, RowError>> + 'a
    where
        I: IntoIterator,
        I::IntoIter: 'a,
        I::Item: Borrow<RawRow>,
    {
        rows.into_iter()
            .enumerate()
            .map(move |(index, row)| self.process_row(index, row.borrow()))
    }

    /// Process a whole batch under the configured error policy.
    pub fn run<I>(&self, rows: I) -> std::result::Result<BatchReport, RowError>
    where
        I: IntoIterator,
        I::Item: Borrow<RawRow>,
    {
        let mut report = BatchReport::default();
        for result in self.process(rows) {
            self.record(&mut report, result)?;
        }
        log_summary(&report);
        Ok(report)
    }

    /// Same output as [`Engine::run`], with contiguous chunks processed on
    /// scoped worker threads.
    pub fn run_parallel(
        &self,
        rows: &[RawRow],
        workers: NonZeroUsize,
    ) -> std::result::Result<BatchReport, RowError> {
        if workers.get() == 1 || rows.len() < 2 {
            return self.run(rows);
        }
        let chunk_size = rows.len().div_ceil(workers.get());
        let chunks = std::thread::scope(|scope| {
            let handles: Vec<_> = rows
                .chunks(chunk_size)
                .enumerate()
                .map(|(i, chunk)| scope.spawn(move || self.process_chunk(i * chunk_size, chunk)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect::<Vec<_>>()
        });
        debug!(workers = workers.get(), chunks = chunks.len(), "parallel batch finished");

        let mut report = BatchReport::default();
        for result in chunks.into_iter().flatten() {
            self.record(&mut report, result)?;
        }
        log_summary(&report);
        Ok(report)
    }

    fn process_chunk(
        &self,
        offset: usize,
        chunk: &[RawRow],
    ) -> Vec<std::result::Result<CanonicalTransaction, RowError>> {
        let mut out = Vec::with_capacity(chunk.len());
        for (i, row) in chunk.iter().enumerate() {
            let result = self.process_row(offset + i, row);
            let failed = result.is_err();
            out.push(result);
            if failed && self.error_policy == ErrorPolicy::FailFast {
                break;
            }
        }
        out
    }

    fn record(
        &self,
        report: &mut BatchReport,
        result: std::result::Result<CanonicalTransaction, RowError>,
    ) -> std::result::Result<(), RowError> {
        match result {
            Ok(txn) => report.transactions.push(txn),
            Err(err) => {
                debug!(row = err.row, kind = err.kind.code(), "{err}");
                if self.error_policy == ErrorPolicy::FailFast {
                    return Err(err);
                }
                report.rejected.push(err);
            }
        }
        Ok(())
    }
}

fn log_summary(report: &BatchReport) {
    info!(
        rows = report.total_rows(),
        normalized = report.transactions.len(),
        rejected = report.rejected.len(),
        "batch complete"
    );
}

/// Assembles an [`Engine`]. Any strategy left unset takes the standard one.
#[derive(Default)]
pub struct EngineBuilder {
    extractor: Option<Box<dyn FieldExtractor>>,
    dates: Option<Box<dyn DateNormalizer>>,
    names: Option<Box<dyn NameCleaner>>,
    amounts: Option<Box<dyn AmountNormalizer>>,
    classifier: Option<Box<dyn Classifier>>,
    sign_policy: SignPolicy,
    convention: AmountConvention,
    error_policy: ErrorPolicy,
}

impl EngineBuilder {
    /// Strategies and policies from `settings`; the rule file is loaded and
    /// validated here, before any row is seen.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let rules = RuleSet::effective(
            settings.rules_path().as_deref(),
            settings.replace_default_rules,
        )?;
        let names = PatternNameCleaner::with_extras(
            &settings.extra_noise_patterns,
            &settings.brand_exceptions,
        )?;
        Ok(Self::default()
            .dates(LocaleDateNormalizer::new(settings.date_locale))
            .names(names)
            .classifier(RuleClassifier::new(rules))
            .sign_policy(settings.sign_policy)
            .amount_convention(settings.amount_convention)
            .error_policy(settings.error_policy))
    }

    pub fn extractor(mut self, extractor: impl FieldExtractor + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn dates(mut self, dates: impl DateNormalizer + 'static) -> Self {
        self.dates = Some(Box::new(dates));
        self
    }

    pub fn names(mut self, names: impl NameCleaner + 'static) -> Self {
        self.names = Some(Box::new(names));
        self
    }

    pub fn amounts(mut self, amounts: impl AmountNormalizer + 'static) -> Self {
        self.amounts = Some(Box::new(amounts));
        self
    }

    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn sign_policy(mut self, policy: SignPolicy) -> Self {
        self.sign_policy = policy;
        self
    }

    pub fn amount_convention(mut self, convention: AmountConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn build(self) -> Result<Engine> {
        let names: Box<dyn NameCleaner> = match self.names {
            Some(names) => names,
            None => Box::new(PatternNameCleaner::standard()?),
        };
        let classifier: Box<dyn Classifier> = match self.classifier {
            Some(classifier) => classifier,
            None => Box::new(RuleClassifier::new(RuleSet::builtin()?)),
        };
        Ok(Engine {
            extractor: self
                .extractor
                .unwrap_or_else(|| Box::new(RoleExtractor::default())),
            dates: self
                .dates
                .unwrap_or_else(|| Box::new(LocaleDateNormalizer::default())),
            names,
            amounts: self
                .amounts
                .unwrap_or_else(|| Box::new(StandardAmountNormalizer)),
            classifier,
            sign_policy: self.sign_policy,
            convention: self.convention,
            error_policy: self.error_policy,
        })
    }
}
