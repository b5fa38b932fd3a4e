const TRUNCATED_MARKER: &str = "...";
pub const MAX_PREVIEW_CHARS: usize = 1200;

/// First [`MAX_PREVIEW_CHARS`] characters of the plain-text rendering.
pub fn prepare_preview(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_PREVIEW_CHARS) {
        None => text.to_string(),
        Some((end, _)) => format!("{}{TRUNCATED_MARKER}", &text[..end]),
    }
}
