use std::num::NonZeroUsize;

use txnorm::dates::DateLocale;
use txnorm::engine::{EngineBuilder, ErrorPolicy};
use txnorm::error::RowErrorKind;
use txnorm::extract::RoleExtractor;
use txnorm::importer::read_table;
use txnorm::names::{NameCleaner, PatternNameCleaner};
use txnorm::settings::Settings;
use txnorm::{Fundamental, RawRow, TransactionType};

fn engine_for(settings: &Settings, table: &txnorm::importer::SourceTable) -> txnorm::Engine {
    EngineBuilder::from_settings(settings)
        .unwrap()
        .extractor(RoleExtractor::new(table.roles().unwrap()))
        .build()
        .unwrap()
}

#[test]
fn checking_export_with_preamble_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stmt.csv");
    std::fs::write(
        &path,
        "\
Description,,Summary Amt.
Beginning balance as of 01/01/2025,,\"1,000.00\"

Date,Description,Amount,Running Bal.
01/03/2025,CHECKCARD 0102 WHOLEFDS MKT #10234,-82.16,917.84
01/05/2025,ACH DEBIT CITY WATER UTIL,-45.00,872.84
01/07/2025,Payroll Direct Deposit,\"2,400.00\",\"3,272.84\"
01/09/2025,MORTGAGE PAYMENT 0042,\"(1,850.00)\",\"1,422.84\"
",
    )
    .unwrap();
    let table = read_table(&path, None).unwrap();
    let engine = engine_for(&Settings::default(), &table);
    let report = engine.run(&table.rows).unwrap();

    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    let summary: Vec<(&str, &str, TransactionType)> = report
        .transactions
        .iter()
        .map(|t| (t.name.as_str(), t.category.as_str(), t.kind))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Wholefds Mkt", "Groceries", TransactionType::Expense),
            ("City Water Util", "Utilities", TransactionType::Expense),
            ("Payroll Direct Deposit", "Income", TransactionType::Income),
            ("Mortgage Payment", "Housing", TransactionType::Debt),
        ]
    );
    let mortgage = &report.transactions[3];
    assert_eq!(mortgage.amount, -1850.0);
    assert_eq!(mortgage.fundamental, Fundamental::Debts);
    assert_eq!(mortgage.date, "2025-01-09");
}

#[test]
fn split_columns_day_first_latin1() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eu.csv");
    let mut bytes = b"Date,Details,Debit,Credit\n".to_vec();
    bytes.extend_from_slice(b"14/02/2025,BOULANGERIE CR");
    bytes.push(0xC9); // É
    bytes.extend_from_slice(b"PE,\"3,50\",\n");
    bytes.extend_from_slice(b"03/02/2025,SALARY,,\"2.100,00\"\n");
    std::fs::write(&path, bytes).unwrap();

    let settings = Settings {
        date_locale: DateLocale::DayFirst,
        ..Settings::default()
    };
    let table = read_table(&path, None).unwrap();
    let report = engine_for(&settings, &table).run(&table.rows).unwrap();
    assert_eq!(report.transactions.len(), 2);

    let bakery = &report.transactions[0];
    assert_eq!(bakery.date, "2025-02-14");
    assert_eq!(bakery.amount, -3.5);
    assert_eq!(bakery.name, "Boulangerie Cr\u{e9}pe");

    let salary = &report.transactions[1];
    assert_eq!(salary.date, "2025-02-03");
    assert_eq!(salary.amount, 2100.0);
    assert_eq!(salary.kind, TransactionType::Income);
}

#[test]
fn skip_and_report_preserves_order_and_counts() {
    let rows: Vec<RawRow> = [
        ("03/14/2024", "STARBUCKS #1234 POS DEBIT", "-5.75"),
        ("32/13/2024", "BAD DATE", "-1.00"),
        ("03/15/2024", "NETFLIX.COM", "-15.49"),
        ("03/16/2024", "MYSTERY", "--"),
        ("03/17/2024", "SHELL OIL 12345", "-40.00"),
    ]
    .iter()
    .map(|(d, n, a)| RawRow::from_pairs([("Date", *d), ("Description", *n), ("Amount", *a)]))
    .collect();

    let engine = EngineBuilder::default().build().unwrap();
    let report = engine
        .run_parallel(&rows, NonZeroUsize::new(2).unwrap())
        .unwrap();
    let names: Vec<&str> = report.transactions.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Starbucks", "Netflix.Com", "Shell Oil"]);
    assert_eq!(report.rejected.len(), 2);
    assert!(matches!(report.rejected[0].kind, RowErrorKind::UnparseableDate { .. }));
    assert!(matches!(report.rejected[1].kind, RowErrorKind::UnparseableAmount { .. }));
    assert_eq!(report.rejected[1].row, 3);
}

#[test]
fn fail_fast_stops_at_first_bad_row() {
    let rows = vec![
        RawRow::from_values(["2024-01-01", "Coffee", "-3"]),
        RawRow::from_values(["2024-01-02", "Tea", "abc"]),
    ];
    let settings = Settings {
        error_policy: ErrorPolicy::FailFast,
        ..Settings::default()
    };
    let engine = EngineBuilder::from_settings(&settings).unwrap().build().unwrap();
    let err = engine.run(&rows).unwrap_err();
    assert_eq!(err.row, 1);
}

#[test]
fn cleaned_names_are_stable_under_recleaning() {
    let cleaner = PatternNameCleaner::standard().unwrap();
    for raw in [
        "STARBUCKS #1234 POS DEBIT",
        "PURCHASE AUTHORIZED ON 03/12 SAFEWAY 0912",
        "SQ *BLUE BOTTLE COFFEE 8812",
        "AMZN Mktp US*2K3LL1",
        "CHECKCARD 0102 WHOLEFDS MKT #10234",
    ] {
        let once = cleaner.clean(raw);
        assert!(!once.is_empty());
        assert_eq!(cleaner.clean(&once), once, "{raw}");
    }
}
