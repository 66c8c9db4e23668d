use serde::{Deserialize, Serialize};

/// Tenant-independent search criteria applied on top of the site's own search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    /// Minimum price
    pub min_price: Option<f64>,
    /// Maximum price
    pub max_price: Option<f64>,
    /// Minimum number of rooms
    pub min_rooms: Option<f64>,
    /// Maximum number of rooms
    pub max_rooms: Option<f64>,
    /// Minimum size in square meters
    pub min_size: Option<f64>,
    /// Maximum size in square meters
    pub max_size: Option<f64>,
    /// Case-insensitive patterns; a listing whose title matches one is dropped
    pub excluded_titles: Vec<String>,
}

/// Parse a human-formatted amount such as `"1.250.000 €"`, `"35,5 m²"` or `"3 rum"`.
///
/// When both `.` and `,` occur the last one is the decimal separator. A single
/// kind of separator followed by exactly three digits is read as grouping.
pub fn parse_amount(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | ' ' | '\u{a0}' | '\''))
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\''))
        .collect();
    let number = number.trim_end_matches(|c: char| c == '.' || c == ',');

    let normalized = match (number.rfind('.'), number.rfind(',')) {
        (Some(dot), Some(comma)) if dot > comma => number.replace(',', ""),
        (Some(_), Some(_)) => number.replace('.', "").replace(',', "."),
        (Some(_), None) => normalize_single(number, '.'),
        (None, Some(_)) => normalize_single(number, ','),
        (None, None) => number.to_string(),
    };

    normalized.parse().ok()
}

fn normalize_single(number: &str, separator: char) -> String {
    let groups: Vec<&str> = number.split(separator).collect();
    let grouping = groups.len() > 2 || groups.last().is_some_and(|g| g.len() == 3);
    if grouping {
        groups.concat()
    } else {
        number.replace(separator, ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grouped_prices() {
        assert_eq!(parse_amount("1.250.000 €"), Some(1_250_000.0));
        assert_eq!(parse_amount("5 195 000 kr"), Some(5_195_000.0));
        assert_eq!(parse_amount("€ 850"), Some(850.0));
        assert_eq!(parse_amount("1,200"), Some(1200.0));
    }

    #[test]
    fn parses_decimals() {
        assert_eq!(parse_amount("35,5 kvadratmeter"), Some(35.5));
        assert_eq!(parse_amount("2.5 rum"), Some(2.5));
        assert_eq!(parse_amount("1.234,50"), Some(1234.5));
    }

    #[test]
    fn rejects_text_without_digits() {
        assert_eq!(parse_amount("?"), None);
        assert_eq!(parse_amount(""), None);
    }
}
