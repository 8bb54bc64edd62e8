//! Numeric utilities: lenient parsing of user-supplied parameter values.
//!
//! Guidelines
//! - Parsing is prefix-based: an optional sign followed by leading digits is
//!   consumed and anything after is ignored ("50abc" parses as 50), matching
//!   how permissive HTTP parameter handling is expected to behave.
//! - Parsing is fallible (Option<T>); the caller decides the fallback, so
//!   defaults stay at the call site and are searchable.
//! - Out-of-range magnitudes saturate instead of wrapping or panicking.

/// Parses a leading base-10 integer from `s`, ignoring surrounding noise.
///
/// Leading whitespace is skipped, an optional `+`/`-` sign is honored and
/// digits are consumed until the first non-digit. Returns `None` when no
/// digits are found. Magnitudes beyond `i64` saturate.
#[must_use]
pub fn lenient_i64(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (neg, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: &str = rest.split(|c: char| !c.is_ascii_digit()).next().unwrap_or("");
    if digits.is_empty() {
        return None;
    }
    let mut acc: i64 = 0;
    for b in digits.bytes() {
        let d = i64::from(b - b'0');
        acc = match acc.checked_mul(10).and_then(|v| v.checked_add(d)) {
            Some(v) => v,
            None => return Some(if neg { i64::MIN } else { i64::MAX }),
        };
    }
    Some(if neg { -acc } else { acc })
}

/// Parses a leading base-10 float from `s`, ignoring surrounding noise.
///
/// Accepts an optional sign, integer digits, a fractional part and an
/// exponent; consumption stops at the first character that cannot extend a
/// valid literal. Returns `None` when no digits are found.
#[must_use]
pub fn lenient_f64(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let prefix = float_prefix_len(s);
    if prefix == 0 {
        return None;
    }
    s[..prefix].parse::<f64>().ok()
}

/// Length of the longest prefix of `s` that parses as an `f64` literal.
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let has_int = i > int_start;
    let mut end = if has_int { i } else { 0 };
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > frac_start {
            i = j;
            end = j;
        } else if has_int {
            // "12." is a valid literal prefix; a bare "." is not.
            i += 1;
            end = i;
        }
    }
    if end == 0 {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }
    end
}
