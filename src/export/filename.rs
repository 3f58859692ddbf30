use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_ARTIFACT_NAME: &str = "FlowPitch.pdf";
const MAX_NAME_LEN: usize = 200;

// Invalid on Windows: < > : " / \ | ? * and control characters (0-31)
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid regex"));

static RESERVED_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(CON|PRN|AUX|NUL|COM[1-9]|LPT[1-9])(\..*)?$").expect("valid regex")
});

/// Sanitize a filename for cross-platform compatibility
/// Removes/replaces characters that are invalid on Windows, macOS, or Linux
pub fn sanitize_filename(name: &str) -> String {
    let sanitized = INVALID_CHARS.replace_all(name, "_");

    // Trim leading/trailing spaces and dots (problematic on Windows)
    let sanitized = sanitized.trim_matches(|c| c == ' ' || c == '.');

    if RESERVED_NAMES.is_match(sanitized) {
        return format!("_{sanitized}");
    }

    let mut end = sanitized.len().min(MAX_NAME_LEN);
    while !sanitized.is_char_boundary(end) {
        end -= 1;
    }
    let sanitized = &sanitized[..end];

    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized.to_string()
    }
}

/// File name of the exported document: the configured name, sanitized, with a
/// `.pdf` extension.
pub fn artifact_file_name(configured: &str) -> String {
    if configured.trim().is_empty() {
        return DEFAULT_ARTIFACT_NAME.to_string();
    }
    let name = sanitize_filename(configured);
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name
    } else {
        format!("{name}.pdf")
    }
}
