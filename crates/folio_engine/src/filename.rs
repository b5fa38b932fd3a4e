use sha2::{Digest, Sha256};

use crate::export::ExportFormat;

const MAX_STEM_CHARS: usize = 80;

/// Filesystem-safe, deterministic name: `{sanitized_title}--{short_hash(url)}.{ext}`.
pub fn suggested_filename(title: Option<&str>, url: &str, format: ExportFormat) -> String {
    let sanitized = sanitize_title(title.unwrap_or("untitled"));
    let hash = short_hash(url);
    format!("{sanitized}--{hash}.{}", format.extension())
}

fn sanitize_title(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) || (c.is_whitespace() && c != ' ') {
            '_'
        } else {
            c
        };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    let trimmed = compacted.trim_matches(&['_', ' ', '.'][..]);
    let mut final_name: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    final_name = final_name.trim_end_matches(&['_', ' ', '.'][..]).to_string();
    if final_name.is_empty() {
        final_name = "untitled".to_string();
    }
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_titles_are_cut_on_char_boundaries() {
        let title = "\u{e9}".repeat(200);
        let name = suggested_filename(Some(&title), "https://example.com", ExportFormat::Txt);
        let stem = name.split("--").next().unwrap();
        assert_eq!(stem.chars().count(), MAX_STEM_CHARS);
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn empty_title_falls_back_to_untitled() {
        let name = suggested_filename(Some(" ... "), "https://example.com", ExportFormat::Pdf);
        assert!(name.starts_with("untitled--"));
    }
}
