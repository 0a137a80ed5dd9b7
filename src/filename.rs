//! Filename derivation for retrieved documents
//!
//! Pure, deterministic functions: for a fixed (docid, title) pair the same
//! filename always comes out, and cleaning an already-cleaned title is a
//! no-op. The only nondeterministic path is the last-resort fallback when
//! neither a docid nor a title exists, which must instead guarantee
//! uniqueness.

use rand::Rng;

/// Maximum length of the cleaned title, before the extension
const MAX_TITLE_LEN: usize = 100;

/// Characters that are unsafe in filenames on at least one target platform
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Clean a document title for use in a filename.
///
/// Each unsafe character becomes an underscore; every run of whitespace
/// collapses to a single underscore; the result is truncated to 100
/// characters. No case folding. Idempotent.
pub fn clean_title(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len());
    let mut in_whitespace = false;
    for ch in title.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                cleaned.push('_');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            if UNSAFE_CHARS.contains(&ch) {
                cleaned.push('_');
            } else {
                cleaned.push(ch);
            }
        }
    }
    cleaned.chars().take(MAX_TITLE_LEN).collect()
}

/// Strip a trailing document extension from a title.
///
/// Listing rows sometimes carry the source filename as the title; a trailing
/// `.pdf` is redundant and legacy `.djvu` scans are renamed to `.pdf` on
/// retrieval, so both are removed before cleaning.
fn strip_document_extension(title: &str) -> &str {
    let lower = title.to_ascii_lowercase();
    if let Some(stripped_len) = lower
        .strip_suffix(".pdf")
        .or_else(|| lower.strip_suffix(".djvu"))
        .map(str::len)
    {
        &title[..stripped_len]
    } else {
        title
    }
}

/// Derive the storage filename for a document.
///
/// - docid and a non-empty title: `{docid}_{cleaned title}.pdf`
/// - docid only: `document_{docid}.pdf`
/// - neither (should not occur; the negotiator drops rows without a docid):
///   `document_{timestamp}_{random-suffix}.pdf` to guarantee uniqueness
pub fn derive_filename(docid: Option<&str>, title: Option<&str>) -> String {
    let title = title.map(strip_document_extension).map(clean_title);
    match (docid, title.as_deref()) {
        (Some(docid), Some(title)) if !title.is_empty() => {
            format!("{}_{}.pdf", docid, title)
        }
        (Some(docid), _) => format!("document_{}.pdf", docid),
        (None, _) => {
            let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
            let suffix: u32 = rand::thread_rng().gen_range(0x1000..=0xFFFF);
            format!("document_{}_{:04x}.pdf", timestamp, suffix)
        }
    }
}

/// Sanitize an arbitrary identifier for use as a path component.
///
/// Application ids like `24/01234/FUL` contain path separators; they get the
/// same cleaning as titles so one application maps to one directory.
pub fn sanitize_component(raw: &str) -> String {
    clean_title(raw)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_title_replaces_unsafe_characters() {
        assert_eq!(clean_title(r#"Site<Plan>:"v2""#), "Site_Plan___v2_");
        assert_eq!(clean_title(r"a/b\c|d?e*f"), "a_b_c_d_e_f");
    }

    #[test]
    fn clean_title_collapses_whitespace_runs() {
        assert_eq!(clean_title("Site   Plan\t\tRev  A"), "Site_Plan_Rev_A");
        assert_eq!(clean_title("  leading and trailing  "), "leading_and_trailing");
    }

    #[test]
    fn clean_title_is_idempotent() {
        let samples = [
            "Site Plan Rev A",
            r#"Decision <Notice> 2024/0042"#,
            "already_clean_title",
            "   spaced   out   ",
        ];
        for sample in samples {
            let once = clean_title(sample);
            let twice = clean_title(&once);
            assert_eq!(once, twice, "cleaning must be idempotent for {:?}", sample);
        }
    }

    #[test]
    fn clean_title_preserves_case() {
        assert_eq!(clean_title("Design And Access STATEMENT"), "Design_And_Access_STATEMENT");
    }

    #[test]
    fn clean_title_truncates_to_100_chars() {
        let long = "x".repeat(250);
        assert_eq!(clean_title(&long).chars().count(), 100);
    }

    #[test]
    fn derive_filename_with_docid_and_title() {
        assert_eq!(
            derive_filename(Some("100234"), Some("Site Plan")),
            "100234_Site_Plan.pdf"
        );
    }

    #[test]
    fn derive_filename_is_deterministic() {
        let a = derive_filename(Some("42"), Some("Heritage Statement"));
        let b = derive_filename(Some("42"), Some("Heritage Statement"));
        assert_eq!(a, b);
    }

    #[test]
    fn derive_filename_strips_pdf_extension_from_title() {
        assert_eq!(
            derive_filename(Some("7"), Some("decision notice.pdf")),
            "7_decision_notice.pdf"
        );
    }

    #[test]
    fn derive_filename_normalizes_djvu_to_pdf() {
        assert_eq!(
            derive_filename(Some("8"), Some("archive scan.DJVU")),
            "8_archive_scan.pdf"
        );
    }

    #[test]
    fn derive_filename_without_title_uses_document_prefix() {
        assert_eq!(derive_filename(Some("55"), None), "document_55.pdf");
        assert_eq!(derive_filename(Some("55"), Some("   ")), "document_55.pdf");
    }

    #[test]
    fn derive_filename_fallback_is_unique_enough() {
        let a = derive_filename(None, None);
        assert!(a.starts_with("document_"));
        assert!(a.ends_with(".pdf"));
        // Timestamp plus random suffix; two calls in the same second should
        // still differ nearly always
        let names: std::collections::HashSet<String> =
            (0..16).map(|_| derive_filename(None, None)).collect();
        assert!(names.len() > 1);
    }

    #[test]
    fn derived_filename_length_is_bounded() {
        let long_title = "word ".repeat(100);
        let name = derive_filename(Some("123456"), Some(&long_title));
        // docid + '_' + 100-char title + ".pdf"
        assert!(name.chars().count() <= 6 + 1 + 100 + 4);
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn sanitize_component_flattens_application_ids() {
        assert_eq!(sanitize_component("24/01234/FUL"), "24_01234_FUL");
    }
}
