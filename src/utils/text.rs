use regex::Regex;
use std::sync::OnceLock;

fn mojibake_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Ã[^\s]{1,2}").expect("static regex"))
}

/// 修復被當成 Latin-1 解碼的 UTF-8 字串（例如 "Ã¶" -> "ö"）
pub fn fix_encoding(text: &str) -> String {
    if !mojibake_pattern().is_match(text) {
        return text.to_string();
    }

    // Every char must fit in one Latin-1 byte, otherwise the text is not mojibake.
    let bytes: Option<Vec<u8>> = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect();

    match bytes.and_then(|b| String::from_utf8(b).ok()) {
        Some(fixed) => fixed,
        None => text.to_string(),
    }
}

pub fn underscore_spaces(text: &str) -> String {
    text.replace(' ', "_")
}

/// Repaired and space-free form used for stadium, event, race and city columns.
pub fn normalize_label(text: &str) -> String {
    underscore_spaces(&fix_encoding(text))
}

pub fn skater_name(first_name: &str, last_name: &str) -> String {
    format!(
        "{}_{}",
        fix_encoding(first_name),
        underscore_spaces(&fix_encoding(last_name))
    )
}

pub fn gender_label(code: &str) -> String {
    match code {
        "F" => "Women".to_string(),
        "M" => "Men".to_string(),
        other => other.to_string(),
    }
}
