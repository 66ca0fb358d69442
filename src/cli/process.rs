use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, Table};

use txnorm::amounts::AmountConvention;
use txnorm::engine::{BatchReport, EngineBuilder, ErrorPolicy};
use txnorm::extract::{AmountColumns, ColumnRoles, ColumnSpec, RoleExtractor};
use txnorm::fmt::{flag, money};
use txnorm::importer::{read_table, SourceTable};
use txnorm::settings::{load_settings, Settings};

use super::{OutputFormat, ProcessArgs};

pub fn run(args: &ProcessArgs, config: Option<&Path>) -> Result<()> {
    let mut settings = load_settings(config)?;
    apply_overrides(&mut settings, args);

    let table = read_table(&args.file, args.sheet.as_deref())
        .with_context(|| format!("reading {}", args.file.display()))?;
    let roles = resolve_roles(&table, args)?;
    let engine = EngineBuilder::from_settings(&settings)?
        .extractor(RoleExtractor::new(roles))
        .build()?;
    let workers = settings.worker_count()?;

    let report = engine.run_parallel(&table.rows, workers)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, &report, args.format)?;
    out.flush()?;
    print_summary(&report);
    Ok(())
}

fn apply_overrides(settings: &mut Settings, args: &ProcessArgs) {
    if let Some(locale) = args.locale {
        settings.date_locale = locale;
    }
    if let Some(rules) = &args.rules {
        settings.rules_file = Some(rules.to_string_lossy().to_string());
    }
    if args.fail_fast {
        settings.error_policy = ErrorPolicy::FailFast;
    }
    if args.charges_positive {
        settings.amount_convention = AmountConvention::ChargesPositive;
    }
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
}

/// A column given on the command line: all digits is a position, anything else a header name.
fn column(raw: &str) -> ColumnSpec {
    match raw.trim().parse::<usize>() {
        Ok(index) => ColumnSpec::index(index),
        Err(_) => ColumnSpec::named(raw.trim()),
    }
}

fn resolve_roles(table: &SourceTable, args: &ProcessArgs) -> Result<ColumnRoles> {
    let amount = match (&args.amount_column, &args.debit_column, &args.credit_column) {
        (Some(a), _, _) => Some(AmountColumns::Single(column(a))),
        (None, Some(d), Some(c)) => Some(AmountColumns::Split {
            debit: column(d),
            credit: column(c),
        }),
        _ => None,
    };
    let date = args.date_column.as_deref().map(column);
    let description = args.description_column.as_deref().map(column);

    if let (Some(date), Some(description), Some(amount)) = (&date, &description, &amount) {
        return Ok(ColumnRoles {
            date: date.clone(),
            description: description.clone(),
            amount: amount.clone(),
        });
    }
    let detected = table.roles().context(
        "could not find the transaction columns; name them with --date-column, \
         --description-column and --amount-column",
    )?;
    Ok(ColumnRoles {
        date: date.unwrap_or(detected.date),
        description: description.unwrap_or(detected.description),
        amount: amount.unwrap_or(detected.amount),
    })
}

fn write_report(out: &mut impl Write, report: &BatchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report.transactions)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(&mut *out);
            for txn in &report.transactions {
                wtr.serialize(txn)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec![
                "Date",
                "Name",
                "Amount",
                "Type",
                "Category",
                "Fundamental",
                "Essential",
                "Fixed",
            ]);
            for txn in &report.transactions {
                let amount = if txn.amount < 0.0 {
                    money(txn.amount).red().to_string()
                } else {
                    money(txn.amount).green().to_string()
                };
                table.add_row(vec![
                    Cell::new(&txn.date),
                    Cell::new(&txn.name),
                    Cell::new(amount),
                    Cell::new(txn.kind),
                    Cell::new(&txn.category),
                    Cell::new(txn.fundamental),
                    Cell::new(flag(txn.essential)),
                    Cell::new(flag(txn.fixed)),
                ]);
            }
            writeln!(out, "{table}")?;
        }
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    for err in &report.rejected {
        eprintln!("  {} {err}", "skipped".yellow());
    }
    let line = format!(
        "Normalized {} of {} rows",
        report.transactions.len(),
        report.total_rows()
    );
    if report.rejected.is_empty() {
        eprintln!("{}", line.green());
    } else {
        eprintln!("{} ({} rejected)", line.yellow(), report.rejected.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use txnorm::extract::ColumnRef;
    use txnorm::models::RawRow;

    use crate::cli::{Cli, Commands};

    fn parse(argv: &[&str]) -> ProcessArgs {
        match Cli::parse_from(argv).command {
            Commands::Process(args) => args,
            _ => panic!("expected process"),
        }
    }

    fn table(headers: &[&str]) -> SourceTable {
        SourceTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: vec![RawRow::new()],
        }
    }

    #[test]
    fn test_column_parsing() {
        assert_eq!(column("2").candidates(), &[ColumnRef::Index(2)]);
        assert_eq!(column(" Memo "), ColumnSpec::named("Memo"));
    }

    #[test]
    fn test_roles_detected_without_overrides() {
        let args = parse(&["txnorm", "process", "x.csv"]);
        let roles = resolve_roles(&table(&["Date", "Payee", "Amount"]), &args).unwrap();
        assert_eq!(roles.description, ColumnSpec::named("Payee"));
    }

    #[test]
    fn test_overrides_replace_detection() {
        let args = parse(&[
            "txnorm",
            "process",
            "x.csv",
            "--date-column",
            "When",
            "--description-column",
            "1",
            "--debit-column",
            "Out",
            "--credit-column",
            "In",
        ]);
        let roles = resolve_roles(&table(&["When", "What", "Out", "In"]), &args).unwrap();
        assert_eq!(roles.date, ColumnSpec::named("When"));
        assert_eq!(roles.description, ColumnSpec::index(1));
        assert!(matches!(roles.amount, AmountColumns::Split { .. }));
    }

    #[test]
    fn test_partial_override_uses_detected_rest() {
        let args = parse(&["txnorm", "process", "x.csv", "--description-column", "Memo"]);
        let roles = resolve_roles(&table(&["Date", "Description", "Memo", "Amount"]), &args).unwrap();
        assert_eq!(roles.description, ColumnSpec::named("Memo"));
        assert_eq!(roles.date, ColumnSpec::named("Date"));
    }

    #[test]
    fn test_undetectable_columns_error() {
        let args = parse(&["txnorm", "process", "x.csv"]);
        assert!(resolve_roles(&table(&["Foo", "Bar"]), &args).is_err());
    }

    #[test]
    fn test_overrides_reach_settings() {
        let args = parse(&[
            "txnorm",
            "process",
            "x.csv",
            "--locale",
            "day-first",
            "--fail-fast",
            "--charges-positive",
            "--workers",
            "3",
        ]);
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &args);
        assert_eq!(settings.error_policy, ErrorPolicy::FailFast);
        assert_eq!(settings.amount_convention, AmountConvention::ChargesPositive);
        assert_eq!(settings.workers, 3);
    }

    #[test]
    fn test_empty_json_output() {
        let report = BatchReport::default();
        let mut buf = Vec::new();
        write_report(&mut buf, &report, OutputFormat::Json).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim(), "[]");
    }
}
