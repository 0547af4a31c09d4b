//! Rendering values for diagnostics.

use crate::engine::{Scalar, Shape, Structured};
use crate::errors::ValueErrors;

/// Longest input preview shown in a diagnostic.
pub const DEFAULT_PREVIEW_LIMIT: usize = 200;

/// Formats a float the way `%g` does for shortest representations: plain
/// decimal for ordinary magnitudes, exponent form for very large or very
/// small ones.
///
/// ```rust
/// use schema_harness::format::format_float;
/// assert_eq!(format_float(1.5), "1.5");
/// assert_eq!(format_float(8080.0), "8080");
/// assert_eq!(format_float(1e21), "1e+21");
/// assert_eq!(format_float(0.00001), "1e-05");
/// ```
pub fn format_float(x: f64) -> String {
    let magnitude = x.abs();
    if x != 0.0 && x.is_finite() && !(1e-4..1e21).contains(&magnitude) {
        let formatted = format!("{x:e}");
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            return format!("{mantissa}e{sign}{digits:0>2}");
        }
        formatted
    } else {
        format!("{x}")
    }
}

/// Scalars in their literal form, everything else as canonical JSON.
pub fn format_value<V: Structured>(value: &V) -> Result<String, ValueErrors> {
    match value.shape() {
        Shape::Scalar(Scalar::String(s)) => Ok(quote(&s)),
        Shape::Scalar(Scalar::Int(n)) => Ok(n.to_string()),
        Shape::Scalar(Scalar::Float(x)) => Ok(format_float(x)),
        Shape::Scalar(Scalar::Bool(b)) => Ok(b.to_string()),
        Shape::Scalar(Scalar::Null) => Ok("null".to_string()),
        _ => value.to_json().map(|json| json.to_string()),
    }
}

/// Like [`format_value`], falling back to the engine's own rendering for
/// values with no JSON form (`int`, `>=0`, ...).
pub fn render_value<V: Structured>(value: &V) -> String {
    format_value(value).unwrap_or_else(|_| value.describe())
}

/// Indented JSON, for expectations compared as a whole. Values with no
/// JSON form use the engine's rendering.
pub fn pretty<V: Structured>(value: &V) -> String {
    value
        .to_json()
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| value.describe())
}

/// JSON rendering of an input, cut to `limit` characters.
pub fn preview<V: Structured>(value: &V, limit: usize) -> String {
    match value.to_json() {
        Ok(json) => truncate(&json.to_string(), limit),
        Err(_) => "<cannot marshal input>".to_string(),
    }
}

/// Keeps at most `limit` characters, marking the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
