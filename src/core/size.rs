//! Human-readable capacity strings ("500G", "1.5T", "4096") to byte counts.

use super::error::ParseError;

const KIB: u64 = 1024;

/// Multiplier for a unit suffix, powers of 1024.
fn suffix_factor(suffix: char) -> Option<u64> {
    match suffix.to_ascii_uppercase() {
        'K' => Some(KIB),
        'M' => Some(KIB.pow(2)),
        'G' => Some(KIB.pow(3)),
        'T' => Some(KIB.pow(4)),
        _ => None,
    }
}

/// Digits with at most one `.`; no sign, exponent or whitespace.
fn is_decimal(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && s.bytes().filter(|&b| b == b'.').count() <= 1
}

/// Parse a size string into bytes.
///
/// Accepts a bare integer (bytes) or a decimal number followed by one of
/// `K`, `M`, `G`, `T` in either case. Fractional suffixed values truncate
/// toward zero. No surrounding whitespace is accepted.
pub fn parse_size(input: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidSize(input.to_string());

    let last = input.chars().last().ok_or_else(invalid)?;

    if last.is_ascii_digit() {
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        return input.parse::<u64>().map_err(|_| invalid());
    }

    let factor = suffix_factor(last).ok_or_else(invalid)?;
    let number = &input[..input.len() - last.len_utf8()];
    if !is_decimal(number) {
        return Err(invalid());
    }

    // Plain integers keep full precision; only fractions go through f64.
    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(factor).ok_or_else(invalid);
    }

    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }

    let bytes = value * factor as f64;
    if bytes >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bytes as u64)
}

/// Convert whole gigabytes (GiB) to bytes.
pub fn gb_to_bytes(gb: u64) -> u64 {
    gb.saturating_mul(KIB.pow(3))
}

/// Render a byte count as gigabytes with two decimals, for log lines.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / KIB.pow(3) as f64)
}
