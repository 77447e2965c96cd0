use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::UnitsError;

/// Fixed-point scale of oracle rates and of the rendered best price.
pub const RATE_DECIMALS: u8 = 18;

/// `10^exp` as a big integer.
pub fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// Parse a user-entered decimal string into base units.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"1."`. Fractional digits beyond
/// `decimals` are truncated.
pub fn parse_units(amount: &str, decimals: u8) -> Result<BigUint, UnitsError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::InvalidAmount(amount.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(UnitsError::InvalidAmount(amount.to_string()));
    }

    let decimals = decimals as usize;
    let kept = &fraction[..fraction.len().min(decimals)];

    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    digits.push_str(kept);
    digits.extend(std::iter::repeat_n('0', decimals - kept.len()));

    if digits.is_empty() {
        return Ok(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| UnitsError::InvalidAmount(amount.to_string()))
}

/// Render base units as a decimal string.
///
/// Trailing fractional zeros are trimmed but one fractional digit is always
/// kept, so `10^18` at 18 decimals renders as `"1.0"`. With zero decimals the
/// integer is returned as-is.
pub fn format_units(amount: &BigUint, decimals: u8) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return s;
    }

    let (integer_part, decimal_part) = if s.len() <= decimals {
        let mut padded = String::with_capacity(decimals);
        padded.extend(std::iter::repeat_n('0', decimals - s.len()));
        padded.push_str(&s);
        ("0".to_string(), padded)
    } else {
        let (i, d) = s.split_at(s.len() - decimals);
        (i.to_string(), d.to_string())
    };

    let trimmed = decimal_part.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{integer_part}.0")
    } else {
        format!("{integer_part}.{trimmed}")
    }
}

/// Render a fixed-point value rounded half-up to exactly `places` fractional digits.
pub fn format_rounded(amount: &BigUint, decimals: u8, places: u8) -> String {
    let scaled = if places >= decimals {
        amount * pow10(u32::from(places - decimals))
    } else {
        let divisor = pow10(u32::from(decimals - places));
        let half = &divisor / 2u32;
        (amount + half) / divisor
    };

    if places == 0 {
        return scaled.to_string();
    }

    let unit = pow10(u32::from(places));
    let whole = &scaled / &unit;
    let fraction = (&scaled % &unit).to_string();
    let pad = places as usize - fraction.len();
    format!("{whole}.{}{fraction}", "0".repeat(pad))
}

/// Scale a raw oracle rate by the decimal difference between the two tokens.
///
/// A positive difference multiplies, a negative one integer-divides.
pub fn scale_rate(raw: &BigUint, src_decimals: u8, dst_decimals: u8) -> BigUint {
    let diff = i32::from(src_decimals) - i32::from(dst_decimals);
    match diff.cmp(&0) {
        std::cmp::Ordering::Greater => raw * pow10(diff.unsigned_abs()),
        std::cmp::Ordering::Less => raw / pow10(diff.unsigned_abs()),
        std::cmp::Ordering::Equal => raw.clone(),
    }
}

/// Convert a raw oracle rate into a display string.
///
/// Absent and zero rates render as `"0"`.
pub fn convert_rate(raw: Option<&BigUint>, src_decimals: u8, dst_decimals: u8) -> String {
    match raw {
        Some(rate) if !rate.is_zero() => {
            format_units(&scale_rate(rate, src_decimals, dst_decimals), RATE_DECIMALS)
        }
        _ => "0".to_string(),
    }
}
