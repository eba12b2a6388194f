//! Language code normalization for prompts.

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("de", "German"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("ru", "Russian"),
    ("so", "Somali"),
    ("sv", "Swedish"),
    ("uk", "Ukrainian"),
];

/// Trimmed, lowercased language code, or `fallback` when empty.
pub fn normalize_code(code: &str, fallback: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        fallback.trim().to_ascii_lowercase()
    } else {
        code.to_ascii_lowercase()
    }
}

/// Human-readable language name; unmapped codes are returned as given.
pub fn language_name(code: &str) -> String {
    let normalized = code.trim().to_ascii_lowercase();
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| *known == normalized)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| code.trim().to_string())
}

pub fn same_language(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
