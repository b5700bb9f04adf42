use proc_macro2::Literal;

/// Render `value` as a Rust string literal.
///
/// Quotes, backslashes and control characters are escaped, so the literal
/// always fits on one line and parses back to `value`.
pub fn literal(value: &str) -> String {
    Literal::string(value).to_string()
}
