//! Number handling for upstream payloads and report text.

use serde_json::Value;

/// Read a number that may arrive as a JSON number or a numeric string.
///
/// Missing or unparsable values read as zero.
pub(crate) fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// First present, non-null field among `names`.
pub(crate) fn first_field<'a>(object: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null() && value.as_str() != Some(""))
}

/// First present field among `names` rendered as text.
pub(crate) fn text_field(object: &Value, names: &[&str]) -> Option<String> {
    first_field(object, names).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Format an amount with thousands separators and two decimals.
pub(crate) fn money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let formatted = format!("{}.{:02}", grouped(cents / 100), cents % 100);
    if negative && cents > 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Format an integer with thousands separators.
pub(crate) fn grouped(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Percentage of `part` in `total`; zero when `total` is zero.
pub(crate) fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number() {
        assert_eq!(number(Some(&json!("12.50"))), 12.5);
        assert_eq!(number(Some(&json!(3))), 3.0);
        assert_eq!(number(Some(&json!("n/a"))), 0.0);
        assert_eq!(number(None), 0.0);
    }

    #[test]
    fn test_first_field() {
        let order = json!({"status": null, "estado": "entregado", "total": ""});
        assert_eq!(first_field(&order, &["status", "estado"]), Some(&json!("entregado")));
        assert_eq!(first_field(&order, &["total"]), None);
        assert_eq!(text_field(&json!({"id": 42}), &["id"]), Some("42".to_string()));
    }

    #[test]
    fn test_money() {
        assert_eq!(money(0.0), "0.00");
        assert_eq!(money(1234.5), "1,234.50");
        assert_eq!(money(1_000_000.0), "1,000,000.00");
        assert_eq!(money(-12.5), "-12.50");
    }

    #[test]
    fn test_grouped_and_rate() {
        assert_eq!(grouped(999), "999");
        assert_eq!(grouped(12345), "12,345");
        assert_eq!(rate(1, 4), 25.0);
        assert_eq!(rate(3, 0), 0.0);
    }
}
