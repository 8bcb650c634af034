//! Cleaning of raw widget form input before it is forwarded to the backend.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("tag pattern compiles"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

// RFC 5322 simplified: local@domain.tld
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email pattern compiles")
});

/// Strips markup, collapses whitespace and trims.
pub fn sanitize_text_field(input: &str) -> String {
    let without_tags = TAGS.replace_all(input, "");
    WHITESPACE
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// Returns the address with whitespace removed, or an empty string when it
/// is not a plausible email.
pub fn sanitize_email(input: &str) -> String {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if EMAIL.is_match(&compact) {
        compact
    } else {
        String::new()
    }
}

/// Reads an integer the way a form post is coerced: leading sign and digits,
/// anything unparseable is zero.
pub fn coerce_int(input: &str) -> i64 {
    let trimmed = input.trim();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().unwrap_or(0)
}

/// Accepts either a JSON value or a JSON document encoded as a string.
/// Strings that do not decode become `null`.
pub fn decode_json_field(input: Value) -> Value {
    match input {
        Value::String(encoded) => serde_json::from_str(&encoded).unwrap_or(Value::Null),
        other => other,
    }
}
