//! Plain scalar resolution.
//!
//! Resolution follows the YAML 1.1 type set used by App Engine's historic loader
//! (`yes`/`no`/`on`/`off` booleans, leading-zero octal) and additionally accepts
//! the YAML 1.2 `0o` octal prefix and exponent-only floats such as `1e3`.
//!
//! Sexagesimal numbers (`1:30`) are not resolved and stay strings.

/// An integer literal after base detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IntLiteral {
    Value(i128),
    /// Syntactically an integer, but it does not fit 128 bits.
    TooLarge,
}

/// What a plain scalar resolves to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Resolved<'a> {
    Null,
    Bool(bool),
    Int(IntLiteral),
    Float(f64),
    Str(&'a str),
}

/// Switches that change how plain scalars resolve.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScalarRules {
    pub(crate) strict_booleans: bool,
    pub(crate) legacy_octal: bool,
}

pub(crate) fn is_null_literal(s: &str) -> bool {
    matches!(s, "" | "~" | "null" | "Null" | "NULL")
}

/// YAML 1.1 booleans in their three accepted casings. With `strict`, only the
/// `true`/`false` family is recognized.
pub(crate) fn parse_bool(s: &str, strict: bool) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ if strict => None,
        "yes" | "Yes" | "YES" | "on" | "On" | "ON" => Some(true),
        "no" | "No" | "NO" | "off" | "Off" | "OFF" => Some(false),
        _ => None,
    }
}

fn digit_value(b: u8, radix: u32) -> Option<u32> {
    let d = match b {
        b'0'..=b'9' => (b - b'0') as u32,
        b'a'..=b'f' => (b - b'a') as u32 + 10,
        b'A'..=b'F' => (b - b'A') as u32 + 10,
        _ => return None,
    };
    (d < radix).then_some(d)
}

/// Accumulate `digits` (with `_` separators) in `radix`. `None` if any character
/// is not a digit of the radix or there are no digits at all.
fn accumulate(digits: &str, radix: u32, neg: bool) -> Option<IntLiteral> {
    let mut saw_digit = false;
    let mut acc: Option<i128> = Some(0);
    for b in digits.bytes() {
        if b == b'_' {
            continue;
        }
        let d = digit_value(b, radix)? as i128;
        saw_digit = true;
        // Accumulate negatives as negatives so that i128::MIN is reachable.
        acc = acc.and_then(|v| v.checked_mul(radix as i128)).and_then(|v| {
            if neg { v.checked_sub(d) } else { v.checked_add(d) }
        });
    }
    if !saw_digit {
        return None;
    }
    Some(match acc {
        Some(v) => IntLiteral::Value(v),
        None => IntLiteral::TooLarge,
    })
}

pub(crate) fn parse_int(s: &str, legacy_octal: bool) -> Option<IntLiteral> {
    let (neg, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if rest.is_empty() || rest.starts_with('_') {
        return None;
    }

    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        return accumulate(hex, 16, neg);
    }
    if let Some(oct) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        return accumulate(oct, 8, neg);
    }
    if let Some(bin) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        return accumulate(bin, 2, neg);
    }
    if rest.len() > 1 && rest.starts_with('0') && legacy_octal {
        return accumulate(&rest[1..], 8, neg);
    }
    accumulate(rest, 10, neg)
}

fn parse_special_float(s: &str) -> Option<f64> {
    let (neg, rest) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    match rest {
        ".inf" | ".Inf" | ".INF" => Some(if neg { f64::NEG_INFINITY } else { f64::INFINITY }),
        ".nan" | ".NaN" | ".NAN" if s == rest => Some(f64::NAN),
        _ => None,
    }
}

/// Shape check for `[-+]?(\.[0-9]+|[0-9][0-9_]*(\.[0-9_]*)?)([eE][-+]?[0-9]+)?`
/// where a fraction or an exponent must be present.
fn looks_like_float(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'-' | b'+')) {
        i += 1;
    }
    let mantissa_start = i;
    let mut int_digits = 0;
    while i < b.len() && (b[i].is_ascii_digit() || (b[i] == b'_' && int_digits > 0)) {
        if b[i] != b'_' {
            int_digits += 1;
        }
        i += 1;
    }
    let mut has_fraction = false;
    let mut frac_digits = 0;
    if i < b.len() && b[i] == b'.' {
        has_fraction = true;
        i += 1;
        while i < b.len() && (b[i].is_ascii_digit() || b[i] == b'_') {
            if b[i] != b'_' {
                frac_digits += 1;
            }
            i += 1;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }
    if i == mantissa_start {
        return false;
    }
    let mut has_exponent = false;
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        has_exponent = true;
        i += 1;
        if i < b.len() && (b[i] == b'-' || b[i] == b'+') {
            i += 1;
        }
        let exp_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == b.len() && (has_fraction || has_exponent)
}

fn parse_float_text(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<f64>().ok()
}

/// Parse a float literal. Plain decimal integers are accepted too, for `!!float 3`.
pub(crate) fn parse_float(s: &str) -> Option<f64> {
    if let Some(special) = parse_special_float(s) {
        return Some(special);
    }
    if looks_like_float(s) {
        return parse_float_text(s);
    }
    match parse_int(s, false) {
        Some(IntLiteral::Value(v)) => Some(v as f64),
        Some(IntLiteral::TooLarge) => parse_float_text(s),
        None => None,
    }
}

/// Resolve an untagged plain scalar.
pub(crate) fn resolve_plain(s: &str, rules: ScalarRules) -> Resolved<'_> {
    if is_null_literal(s) {
        return Resolved::Null;
    }
    if let Some(b) = parse_bool(s, rules.strict_booleans) {
        return Resolved::Bool(b);
    }
    if let Some(i) = parse_int(s, rules.legacy_octal) {
        return Resolved::Int(i);
    }
    if let Some(f) = parse_special_float(s) {
        return Resolved::Float(f);
    }
    if looks_like_float(s) {
        if let Some(f) = parse_float_text(s) {
            return Resolved::Float(f);
        }
    }
    Resolved::Str(s)
}
