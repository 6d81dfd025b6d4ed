//! Fact name normalization.
//!
//! Callers name facts freely ("risk score", "Risk-Score"); artifacts expose
//! them under camel-case accessor names ("RiskScore").

use crate::FactError;

/// Converts a free-form fact name into an accessor identifier.
///
/// Splits on whitespace, drops every non-alphanumeric character, capitalizes
/// each word and joins them. The first letter of the result is then upper-
/// or lower-cased according to `capitalize_first`.
pub fn normalize(raw: &str, capitalize_first: bool) -> Result<String, FactError> {
    let joined: String = raw
        .split_whitespace()
        .map(|word| {
            let cleaned: String = word.chars().filter(char::is_ascii_alphanumeric).collect();
            with_first(&cleaned, true)
        })
        .collect();

    if joined.is_empty() {
        return Err(FactError::EmptyName);
    }
    Ok(with_first(&joined, capitalize_first))
}

fn with_first(word: &str, upper: bool) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if upper => first.to_ascii_uppercase().to_string() + chars.as_str(),
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
