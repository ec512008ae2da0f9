//! Amount grammar
//!
//! Recognizes bare, comma-grouped, currency-prefixed and suffixed amounts
//! and converts them to exact kobo. Bare numerals of ten or more digits are
//! account or phone numbers, never amounts.

use crate::models::Kobo;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Longest bare numeral still read as an amount
const MAX_BARE_DIGITS: usize = 9;

/// Fraction digits beyond this cannot be an exact kobo value at any multiplier
const MAX_FRACTION_DIGITS: usize = 9;

lazy_static! {
    static ref AMOUNT_TOKEN: Regex =
        Regex::new(r"^(₦|ngn|n)?(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d+))?(k|m|naira)?$")
            .expect("amount pattern compiles");
}

/// Amount found in a token stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountToken {
    pub kobo: Kobo,
    /// Tokens that made up the amount, space-joined ("5 k", "₦5,000")
    pub raw: String,
    /// Index of the numeral token
    pub index: usize,
    /// Carried a currency marker, suffix or digit grouping
    pub explicit: bool,
}

fn is_currency_word(token: &str) -> bool {
    matches!(token, "₦" | "ngn" | "n")
}

fn multiplier_word(token: &str) -> Option<i64> {
    match token {
        "k" | "thousand" => Some(1_000),
        "m" | "million" | "mil" => Some(1_000_000),
        _ => None,
    }
}

/// Whole naira digits, optional fraction and a multiplier to exact kobo.
fn to_kobo(int_digits: &str, fraction: Option<&str>, multiplier: i64) -> Option<Kobo> {
    let whole: i128 = int_digits.parse().ok()?;
    let unit = i128::from(multiplier) * i128::from(Kobo::PER_NAIRA);
    let mut total = whole.checked_mul(unit)?;

    if let Some(fraction) = fraction {
        if fraction.len() > MAX_FRACTION_DIGITS {
            return None;
        }
        let scale = 10_i128.pow(fraction.len() as u32);
        let scaled = fraction.parse::<i128>().ok()?.checked_mul(unit)?;
        if scaled % scale != 0 {
            return None;
        }
        total = total.checked_add(scaled / scale)?;
    }

    i64::try_from(total).ok().map(Kobo)
}

/// Scan lowercase tokens for every amount, left to right.
pub fn scan_amounts(tokens: &[String]) -> Vec<AmountToken> {
    let mut found = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let start = i;
        let spaced_currency = is_currency_word(&tokens[i])
            && tokens
                .get(i + 1)
                .map_or(false, |next| AMOUNT_TOKEN.is_match(next));
        let num_idx = if spaced_currency { i + 1 } else { i };

        let Some(caps) = AMOUNT_TOKEN.captures(&tokens[num_idx]) else {
            i += 1;
            continue;
        };

        let int_part = caps.get(2).map_or("", |m| m.as_str());
        let fraction = caps.get(3).map(|m| m.as_str());
        let attached_suffix = caps.get(4).map(|m| m.as_str());
        let prefix = caps.get(1).map(|m| m.as_str());

        let mut multiplier = match attached_suffix {
            Some("k") => 1_000,
            Some("m") => 1_000_000,
            _ => 1,
        };
        let mut explicit = spaced_currency
            || prefix.is_some()
            || attached_suffix.is_some()
            || int_part.contains(',');
        let mut end = num_idx;

        if attached_suffix.is_none() {
            if let Some(mult) = tokens.get(end + 1).and_then(|t| multiplier_word(t)) {
                multiplier = mult;
                explicit = true;
                end += 1;
            }
        }
        if attached_suffix != Some("naira") {
            if let Some(next) = tokens.get(end + 1) {
                if next == "naira" || next == "ngn" {
                    explicit = true;
                    end += 1;
                }
            }
        }

        let digits = int_part.replace(',', "");
        if explicit || digits.len() <= MAX_BARE_DIGITS {
            if let Some(kobo) = to_kobo(&digits, fraction, multiplier) {
                found.push(AmountToken {
                    kobo,
                    raw: tokens[start..=end].join(" "),
                    index: num_idx,
                    explicit,
                });
            }
        }

        i = end + 1;
    }

    found
}

/// Parse a standalone amount phrase ("5k", "₦5,000", "5,000 naira").
pub fn parse_amount(text: &str) -> Option<Kobo> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    let amounts = scan_amounts(&tokens);
    match amounts.as_slice() {
        [only] if only.raw.split(' ').count() == tokens.len() => Some(only.kobo),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(|t| t.to_lowercase()).collect()
    }

    #[test]
    fn test_equivalent_forms() {
        for text in ["5k", "5000", "₦5,000", "5,000 naira", "5 k", "₦ 5000", "NGN5000", "5 thousand"] {
            assert_eq!(parse_amount(text), Some(Kobo(500_000)), "form {}", text);
        }
    }

    #[test]
    fn test_fractional_amounts() {
        assert_eq!(parse_amount("1.5k"), Some(Kobo(150_000)));
        assert_eq!(parse_amount("2.5m"), Some(Kobo(250_000_000)));
        assert_eq!(parse_amount("5000.50"), Some(Kobo(500_050)));
        // sub-kobo precision is not an exact amount
        assert_eq!(parse_amount("10.005"), None);
    }

    #[test]
    fn test_long_numerals_are_not_amounts() {
        assert!(scan_amounts(&tokens("1234567890")).is_empty());
        assert!(scan_amounts(&tokens("08012345678")).is_empty());
        // an explicit currency marker still makes it money
        assert_eq!(scan_amounts(&tokens("₦1234567890")).len(), 1);
    }

    #[test]
    fn test_scan_positions() {
        let found = scan_amounts(&tokens("send 5 k to 0123456789 and 2,000 naira later"));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].index, 1);
        assert_eq!(found[0].raw, "5 k");
        assert_eq!(found[1].kobo, Kobo(200_000));
        assert!(found[1].explicit);
    }

    #[test]
    fn test_non_amount_words() {
        assert!(scan_amounts(&tokens("send money to mom")).is_empty());
        assert!(scan_amounts(&tokens("n")).is_empty());
        assert_eq!(parse_amount("5k please"), None);
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(parse_amount("999999999999999999999m"), None);
    }
}
