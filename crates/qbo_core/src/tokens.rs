//! Token splitting and lenient numeric conversion.
//!
//! Conversion never fails: a malformed token decodes to its longest numeric
//! prefix, or to zero. Grammars detect corruption by counting tokens before
//! converting them.

/// Split a line on runs of whitespace (spaces and tabs may be mixed).
pub fn split(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Text following the leading keyword of `line`, trimmed.
pub fn remainder<'a>(line: &'a str, keyword: &str) -> &'a str {
    line.strip_prefix(keyword).unwrap_or(line).trim()
}

/// Decode a float, falling back to the numeric prefix of the token.
pub fn to_float(token: &str) -> f32 {
    if let Ok(value) = token.parse::<f32>() {
        return value;
    }
    token[..numeric_prefix_len(token, true)]
        .parse()
        .unwrap_or(0.0)
}

/// Decode an integer, falling back to the numeric prefix of the token.
///
/// A fractional token such as `3.7` decodes to `3`.
pub fn to_int(token: &str) -> i64 {
    if let Ok(value) = token.parse::<i64>() {
        return value;
    }
    token[..numeric_prefix_len(token, false)]
        .parse()
        .unwrap_or(0)
}

/// Returns true if the whole token is an optionally signed integer.
pub fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` run of `token`.
fn numeric_prefix_len(token: &str, allow_fraction: bool) -> usize {
    let bytes = token.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if !allow_fraction {
        return end;
    }

    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        let fraction_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        has_digits |= end > fraction_start;
    }
    if !has_digits {
        return 0;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-' | b'+')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mixed_whitespace() {
        assert_eq!(split("v\t1  2 \t3"), vec!["v", "1", "2", "3"]);
        assert!(split("").is_empty());
    }

    #[test]
    fn test_remainder() {
        assert_eq!(remainder("usemtl  Red Paint ", "usemtl"), "Red Paint");
        assert_eq!(remainder("o", "o"), "");
    }

    #[test]
    fn test_to_float() {
        assert_eq!(to_float("1.5"), 1.5);
        assert_eq!(to_float("-2e3"), -2000.0);
        assert_eq!(to_float(".25"), 0.25);
        // Malformed tokens never fail
        assert_eq!(to_float("abc"), 0.0);
        assert_eq!(to_float("1.5abc"), 1.5);
        assert_eq!(to_float("3e"), 3.0);
        assert_eq!(to_float("-"), 0.0);
        assert_eq!(to_float("."), 0.0);
    }

    #[test]
    fn test_to_int() {
        assert_eq!(to_int("42"), 42);
        assert_eq!(to_int("-3"), -3);
        assert_eq!(to_int("3.7"), 3);
        assert_eq!(to_int(""), 0);
        assert_eq!(to_int("x"), 0);
    }

    #[test]
    fn test_is_integer() {
        assert!(is_integer("12"));
        assert!(is_integer("-1"));
        assert!(!is_integer("Hips"));
        assert!(!is_integer("1.0"));
        assert!(!is_integer("-"));
    }
}
