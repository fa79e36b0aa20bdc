//! Algebraic direction strings such as `+0.0015x-0.99y`.

use geompix_core::Vec3;

/// Splits a direction into signed terms, e.g. `-x+0.5y` into `["-x", "+0.5y"]`.
///
/// A sign directly after an exponent marker (`1e-3x`) stays in its term.
fn split_terms(value: &str) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut terms = Vec::new();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'+' || b == b'-') && i > start {
            let prev = bytes[i - 1];
            let is_exponent = (prev == b'e' || prev == b'E')
                && i >= 2
                && (bytes[i - 2].is_ascii_digit() || bytes[i - 2] == b'.');
            if !is_exponent {
                terms.push(&value[start..i]);
                start = i;
            }
        }
    }
    if start < value.len() {
        terms.push(&value[start..]);
    }
    terms
}

/// Parses a direction string into a vector.
///
/// Each term is an optional signed coefficient followed by one of the axes
/// `x`, `y` or `z`. Axes not mentioned are zero.
///
/// # Errors
/// Returns a description of the problem for empty directions, unknown axes
/// and malformed coefficients.
pub fn parse_direction(value: &str) -> Result<Vec3, String> {
    let terms = split_terms(value);
    if terms.is_empty() {
        return Err("empty direction".to_string());
    }

    let mut direction = Vec3::default();
    for term in terms {
        let Some(axis) = term.chars().last() else {
            continue;
        };
        let coefficient = &term[..term.len() - axis.len_utf8()];
        let coefficient = match coefficient {
            "" | "+" => 1.0,
            "-" => -1.0,
            number => number
                .parse::<f64>()
                .map_err(|e| format!("invalid coefficient {number:?}: {e}"))?,
        };
        match axis {
            'x' => direction.x = coefficient,
            'y' => direction.y = coefficient,
            'z' => direction.z = coefficient,
            other => return Err(format!("invalid axis {other:?} (must be x, y or z)")),
        }
    }
    Ok(direction)
}
