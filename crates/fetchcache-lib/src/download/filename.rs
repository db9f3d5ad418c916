use itertools::Itertools;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use std::sync::LazyLock;
use url::Url;

const MAX_FILENAME_LEN: usize = 255;

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

static DISPOSITION_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"([^"]+)"|([^;\s]+))"#)
        .expect("content-disposition pattern is valid")
});

/// Filename advertised by a `Content-Disposition` header, if any.
pub fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let captures = DISPOSITION_FILENAME.captures(value)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

/// Last non-empty path segment of the URL. The query string is never part of
/// the result.
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Reduce an untrusted filename to one that is safe to join onto the storage
/// directory.
///
/// The result only contains ASCII letters, digits, `_`, `.` and `-`, never
/// starts or ends with `.` or `_` and holds no path separator. Returns `None`
/// when nothing survives.
pub fn sanitize_filename(candidate: &str) -> Option<String> {
    let spaced: String = candidate
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let filtered: String = spaced
        .split_whitespace()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let mut name = trim_edges(&filtered).to_string();
    if name.len() > MAX_FILENAME_LEN {
        name.truncate(MAX_FILENAME_LEN);
        name = trim_edges(&name).to_string();
    }
    if name.is_empty() {
        return None;
    }

    let stem = name.split('.').next().unwrap_or_default();
    if WINDOWS_DEVICE_NAMES
        .iter()
        .any(|device| device.eq_ignore_ascii_case(stem))
    {
        name.insert(0, '_');
        name.truncate(MAX_FILENAME_LEN);
    }

    Some(name)
}

fn trim_edges(name: &str) -> &str {
    name.trim_matches(|c| c == '.' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_disposition(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_sanitize_plain_name_is_unchanged() {
        assert_eq!(sanitize_filename("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(
            sanitize_filename("archive-2024_01.tar.gz").as_deref(),
            Some("archive-2024_01.tar.gz")
        );
    }

    #[test]
    fn test_sanitize_parent_directory_traversal() {
        let name = sanitize_filename("../../etc/passwd").unwrap();

        assert_eq!(name, "etc_passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn test_sanitize_backslash_traversal() {
        let name = sanitize_filename("..\\..\\windows\\win.ini").unwrap();

        assert_eq!(name, "windows_win.ini");
        assert!(!name.contains('\\'));
    }

    #[test]
    fn test_sanitize_whitespace_and_symbols() {
        assert_eq!(
            sanitize_filename("my  report (final)!.pdf").as_deref(),
            Some("my_report_final.pdf")
        );
    }

    #[test]
    fn test_sanitize_drops_non_ascii() {
        assert_eq!(sanitize_filename("résumé.txt").as_deref(), Some("rsum.txt"));
    }

    #[test]
    fn test_sanitize_never_leaves_leading_dot() {
        assert_eq!(sanitize_filename(".bashrc").as_deref(), Some("bashrc"));
        assert_eq!(sanitize_filename("._hidden_").as_deref(), Some("hidden"));
    }

    #[test]
    fn test_sanitize_rejects_names_with_nothing_left() {
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("../.."), None);
        assert_eq!(sanitize_filename("/"), None);
        assert_eq!(sanitize_filename("日本語"), None);
    }

    #[test]
    fn test_sanitize_windows_device_names() {
        assert_eq!(sanitize_filename("CON").as_deref(), Some("_CON"));
        assert_eq!(sanitize_filename("nul.txt").as_deref(), Some("_nul.txt"));
        assert_eq!(sanitize_filename("console.txt").as_deref(), Some("console.txt"));
    }

    #[test]
    fn test_sanitize_truncates_long_names() {
        let long = format!("{}.bin", "a".repeat(400));
        let name = sanitize_filename(&long).unwrap();

        assert_eq!(name.len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_filename_from_quoted_disposition() {
        let headers = headers_with_disposition(r#"attachment; filename="report.pdf""#);

        assert_eq!(filename_from_headers(&headers).as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_filename_from_unquoted_disposition() {
        let headers = headers_with_disposition("attachment; filename=data.csv; size=10");

        assert_eq!(filename_from_headers(&headers).as_deref(), Some("data.csv"));
    }

    #[test]
    fn test_filename_ignores_extended_parameter() {
        let headers = headers_with_disposition(
            r#"attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf; filename="resume.pdf""#,
        );

        assert_eq!(filename_from_headers(&headers).as_deref(), Some("resume.pdf"));
    }

    #[test]
    fn test_filename_from_headers_without_disposition() {
        assert_eq!(filename_from_headers(&HeaderMap::new()), None);
        assert_eq!(
            filename_from_headers(&headers_with_disposition("inline")),
            None
        );
    }

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://example.com/files/report.pdf?token=abc").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("report.pdf"));

        let trailing = Url::parse("https://example.com/files/").unwrap();
        assert_eq!(filename_from_url(&trailing).as_deref(), Some("files"));

        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_from_url(&root), None);
    }
}
