//! Extension checks for uploaded files.

use std::path::Path;

/// Lowercased extension including the leading dot, e.g. `".png"`.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Whether the declared filename carries one of the allowed extensions.
///
/// `allowed` entries are expected lowercase with a leading dot.
pub fn is_allowed_upload(filename: &str, allowed: &[String]) -> bool {
    match extension_of(filename) {
        Some(ext) => allowed.iter().any(|a| *a == ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        [".jpg", ".jpeg", ".png", ".tiff", ".bmp"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn accepts_allowed_extensions_case_insensitively() {
        assert!(is_allowed_upload("scan.PNG", &allowed()));
        assert!(is_allowed_upload("dir/photo.jpeg", &allowed()));
    }

    #[test]
    fn rejects_text_and_missing_extension() {
        assert!(!is_allowed_upload("notes.txt", &allowed()));
        assert!(!is_allowed_upload("README", &allowed()));
        assert!(!is_allowed_upload("trailing.", &allowed()));
    }
}
