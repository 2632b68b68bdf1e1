//! Display formatting for transaction rows.

use chrono::{DateTime, NaiveDate};

/// Indian rupee amount with en-IN digit grouping, e.g. `₹1,23,456.78`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("₹{amount}");
    }
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}₹{}.{fraction}", group_indian(whole))
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    groups.push(rest);
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

/// `2023-03-15` becomes `15 Mar 2023`. Empty input renders as `-`; input
/// that is not a date is returned unchanged.
pub fn format_date(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return "-".to_string();
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        });
    match date {
        Some(date) => date.format("%d %b %Y").to_string(),
        None => value.to_string(),
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{value:.1}%")
}

/// Cuts `text` to `max_chars` characters and appends `...` when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
