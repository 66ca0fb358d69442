/// Signed dollar amount with grouped thousands, e.g. `-$1,850.00`.
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if val < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

/// Check mark for table cells.
pub fn flag(on: bool) -> &'static str {
    if on {
        "\u{2713}"
    } else {
        ""
    }
}
