//! crates/docchat_core/src/resolver.rs
//!
//! Turns a document link into something retrievable: a Google Drive file
//! identifier, a direct-download URL and the scratch file name for it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::FileReference;

/// Host serving raw Drive file contents.
pub const DRIVE_DOWNLOAD_BASE: &str = "https://drive.usercontent.google.com";

/// Link shapes in the order they are tried. The first match wins, so a link
/// that fits several shapes resolves to the earliest one in this list.
static FILE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/file/d/([a-zA-Z0-9_-]{25,})",
        r"[?&]id=([a-zA-Z0-9_-]{25,})",
        r"/document/d/([a-zA-Z0-9_-]{25,})",
        r"/spreadsheets/d/([a-zA-Z0-9_-]{25,})",
        r"/presentation/d/([a-zA-Z0-9_-]{25,})",
        // Anything that looks like a Drive id.
        r"([a-zA-Z0-9_-]{25,})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("file id pattern is valid"))
    .collect()
});

/// Extracts the Drive file identifier from a shared link, or `None` if the
/// link has no recognisable identifier.
pub fn extract_file_reference(url: &str) -> Option<FileReference> {
    FILE_ID_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|id| FileReference::new(id.as_str()))
    })
}

/// Direct-download URL for a Drive file on the public download host.
pub fn build_download_url(reference: &FileReference) -> String {
    build_download_url_with_base(DRIVE_DOWNLOAD_BASE, reference)
}

pub fn build_download_url_with_base(base: &str, reference: &FileReference) -> String {
    format!(
        "{}/uc?id={}&export=download",
        base.trim_end_matches('/'),
        reference.as_str()
    )
}

/// Scratch file name for a downloaded Drive document. Two sessions on the
/// same document share this name.
pub fn artifact_file_name(reference: &FileReference) -> String {
    format!("{}.pdf", reference.as_str())
}

/// Keeps only the last path component and replaces anything outside
/// `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn extracted(url: &str) -> Option<String> {
        extract_file_reference(url).map(|r| r.as_str().to_string())
    }

    #[test]
    fn recognises_every_drive_link_shape() {
        let links = [
            format!("https://drive.google.com/file/d/{ID}/view?usp=sharing"),
            format!("https://drive.google.com/open?id={ID}"),
            format!("https://drive.google.com/uc?export=download&id={ID}"),
            format!("https://docs.google.com/document/d/{ID}/edit"),
            format!("https://docs.google.com/spreadsheets/d/{ID}/edit#gid=0"),
            format!("https://docs.google.com/presentation/d/{ID}/edit"),
            format!("drive share: {ID}"),
        ];
        for link in links {
            assert_eq!(extracted(&link).as_deref(), Some(ID), "link: {link}");
        }
    }

    #[test]
    fn returns_none_without_a_long_enough_token() {
        assert_eq!(extracted("https://example.com/files/report.pdf"), None);
        assert_eq!(extracted("https://drive.google.com/file/d/short_id/view"), None);
        assert_eq!(extracted(""), None);
    }

    #[test]
    fn earlier_shape_wins_when_several_match() {
        let other = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

        let file_and_query = format!("https://drive.google.com/file/d/{ID}/view?id={other}");
        assert_eq!(extracted(&file_and_query).as_deref(), Some(ID));

        // `?id=` is tried before `/document/d/`.
        let document_and_query = format!("https://docs.google.com/document/d/{other}/edit?id={ID}");
        assert_eq!(extracted(&document_and_query).as_deref(), Some(ID));
    }

    #[test]
    fn fallback_takes_the_first_long_run() {
        let other = "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCC";
        let link = format!("https://example.com/{ID}/{other}");
        assert_eq!(extracted(&link).as_deref(), Some(ID));
    }

    #[test]
    fn download_url_uses_fixed_template() {
        let reference = FileReference::new(ID);
        assert_eq!(
            build_download_url(&reference),
            format!("https://drive.usercontent.google.com/uc?id={ID}&export=download")
        );
        assert_eq!(
            build_download_url_with_base("http://127.0.0.1:9000/", &reference),
            format!("http://127.0.0.1:9000/uc?id={ID}&export=download")
        );
        assert_eq!(artifact_file_name(&reference), format!("{ID}.pdf"));
    }

    #[test]
    fn sanitizes_client_file_names() {
        assert_eq!(sanitize_file_name("report 2024.pdf"), "report_2024.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\плата.pdf"), "_____.pdf");
        assert_eq!(sanitize_file_name(".."), "_");
    }
}
