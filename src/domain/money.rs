use thiserror::Error;

/// Money is an integer count of the currency's smallest unit.
/// For EUR/USD/CAD, 1 unit = 100 cents, so 50.00 = 5000.
pub type Cents = i64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid money format: {0:?}")]
    InvalidFormat(String),
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("too many decimal places in {0:?} (at most 2)")]
    TooPrecise(String),
    #[error("amount out of range: {0}")]
    Overflow(String),
}

/// Format minor units as a decimal string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parse a non-negative decimal amount into minor units.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
///
/// Unlike display formatting this is strict: more than two decimals is an
/// error rather than a silent truncation, since the result moves money.
pub fn parse_cents(input: &str) -> Result<Cents, AmountError> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative(trimmed.to_string()));
    }

    let (units, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if units.is_empty() && fraction.is_empty() {
        return Err(AmountError::InvalidFormat(trimmed.to_string()));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(units) || !all_digits(fraction) {
        return Err(AmountError::InvalidFormat(trimmed.to_string()));
    }
    if fraction.len() > 2 {
        return Err(AmountError::TooPrecise(trimmed.to_string()));
    }

    let overflow = || AmountError::Overflow(trimmed.to_string());
    let units: Cents = if units.is_empty() {
        0
    } else {
        units.parse().map_err(|_| overflow())?
    };
    let fraction: Cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<Cents>().map_err(|_| overflow())? * 10,
        _ => fraction.parse().map_err(|_| overflow())?,
    };

    units
        .checked_mul(100)
        .and_then(|cents| cents.checked_add(fraction))
        .ok_or_else(overflow)
}
