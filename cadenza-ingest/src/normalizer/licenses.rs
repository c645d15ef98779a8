//! Static license table
//!
//! Maps free-form license text or copyright strings from import sources
//! onto a known set of licenses. Unmatched text yields `None`, never an
//! error, so unknown licensing degrades to "unspecified" instead of
//! failing an import.

/// One known license
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct License {
    /// Canonical identifier stored on tracks
    pub code: &'static str,
    /// Canonical URL
    pub url: &'static str,
}

/// Known licenses, Creative Commons family
pub const LICENSES: &[License] = &[
    License { code: "cc0-1.0", url: "https://creativecommons.org/publicdomain/zero/1.0/" },
    License { code: "cc-by-1.0", url: "https://creativecommons.org/licenses/by/1.0/" },
    License { code: "cc-by-2.0", url: "https://creativecommons.org/licenses/by/2.0/" },
    License { code: "cc-by-2.5", url: "https://creativecommons.org/licenses/by/2.5/" },
    License { code: "cc-by-3.0", url: "https://creativecommons.org/licenses/by/3.0/" },
    License { code: "cc-by-4.0", url: "https://creativecommons.org/licenses/by/4.0/" },
    License { code: "cc-by-sa-1.0", url: "https://creativecommons.org/licenses/by-sa/1.0/" },
    License { code: "cc-by-sa-2.0", url: "https://creativecommons.org/licenses/by-sa/2.0/" },
    License { code: "cc-by-sa-2.5", url: "https://creativecommons.org/licenses/by-sa/2.5/" },
    License { code: "cc-by-sa-3.0", url: "https://creativecommons.org/licenses/by-sa/3.0/" },
    License { code: "cc-by-sa-4.0", url: "https://creativecommons.org/licenses/by-sa/4.0/" },
    License { code: "cc-by-nc-1.0", url: "https://creativecommons.org/licenses/by-nc/1.0/" },
    License { code: "cc-by-nc-2.0", url: "https://creativecommons.org/licenses/by-nc/2.0/" },
    License { code: "cc-by-nc-2.5", url: "https://creativecommons.org/licenses/by-nc/2.5/" },
    License { code: "cc-by-nc-3.0", url: "https://creativecommons.org/licenses/by-nc/3.0/" },
    License { code: "cc-by-nc-4.0", url: "https://creativecommons.org/licenses/by-nc/4.0/" },
    License { code: "cc-by-nc-sa-1.0", url: "https://creativecommons.org/licenses/by-nc-sa/1.0/" },
    License { code: "cc-by-nc-sa-2.0", url: "https://creativecommons.org/licenses/by-nc-sa/2.0/" },
    License { code: "cc-by-nc-sa-2.5", url: "https://creativecommons.org/licenses/by-nc-sa/2.5/" },
    License { code: "cc-by-nc-sa-3.0", url: "https://creativecommons.org/licenses/by-nc-sa/3.0/" },
    License { code: "cc-by-nc-sa-4.0", url: "https://creativecommons.org/licenses/by-nc-sa/4.0/" },
    License { code: "cc-by-nc-nd-1.0", url: "https://creativecommons.org/licenses/by-nc-nd/1.0/" },
    License { code: "cc-by-nc-nd-2.0", url: "https://creativecommons.org/licenses/by-nc-nd/2.0/" },
    License { code: "cc-by-nc-nd-2.5", url: "https://creativecommons.org/licenses/by-nc-nd/2.5/" },
    License { code: "cc-by-nc-nd-3.0", url: "https://creativecommons.org/licenses/by-nc-nd/3.0/" },
    License { code: "cc-by-nc-nd-4.0", url: "https://creativecommons.org/licenses/by-nc-nd/4.0/" },
    License { code: "cc-by-nd-1.0", url: "https://creativecommons.org/licenses/by-nd/1.0/" },
    License { code: "cc-by-nd-2.0", url: "https://creativecommons.org/licenses/by-nd/2.0/" },
    License { code: "cc-by-nd-2.5", url: "https://creativecommons.org/licenses/by-nd/2.5/" },
    License { code: "cc-by-nd-3.0", url: "https://creativecommons.org/licenses/by-nd/3.0/" },
    License { code: "cc-by-nd-4.0", url: "https://creativecommons.org/licenses/by-nd/4.0/" },
];

/// Strip scheme and trailing slash so http/https and slash variants of
/// the same URL compare equal
fn normalize_url(url: &str) -> &str {
    let url = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");
    url.trim_end_matches('/')
}

/// Look up a license by code
pub fn by_code(code: &str) -> Option<&'static License> {
    let code = code.trim().to_lowercase();
    LICENSES.iter().find(|l| l.code == code)
}

/// Look up a license by URL (scheme- and slash-insensitive)
pub fn by_url(url: &str) -> Option<&'static License> {
    let normalized = normalize_url(url).to_lowercase();
    LICENSES
        .iter()
        .find(|l| normalize_url(l.url) == normalized)
}

/// Match free-form license text, falling back to the copyright string.
///
/// The license field may hold a URL or a bare code; the copyright string
/// is searched for an embedded license URL. Anything unrecognized is
/// `None`.
pub fn match_license(license: Option<&str>, copyright: Option<&str>) -> Option<&'static License> {
    if let Some(text) = license.map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(found) = by_url(text).or_else(|| by_code(text)) {
            return Some(found);
        }
    }

    let copyright = copyright.map(str::trim).filter(|t| !t.is_empty())?;
    let lowered = copyright.to_lowercase();
    let start = lowered.find("creativecommons.org/")?;
    let candidate: &str = lowered[start..]
        .split(|c: char| c.is_whitespace() || c == ')' || c == ',')
        .next()?;
    by_url(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_by_canonical_url() {
        let license = match_license(
            Some("https://creativecommons.org/licenses/by-sa/4.0/"),
            None,
        );
        assert_eq!(license.map(|l| l.code), Some("cc-by-sa-4.0"));
    }

    #[test]
    fn test_match_tolerates_scheme_and_slash_variants() {
        let license = match_license(Some("http://creativecommons.org/licenses/by/3.0"), None);
        assert_eq!(license.map(|l| l.code), Some("cc-by-3.0"));
    }

    #[test]
    fn test_match_by_code() {
        let license = match_license(Some("cc-by-nc-4.0"), None);
        assert_eq!(license.map(|l| l.code), Some("cc-by-nc-4.0"));
    }

    #[test]
    fn test_fallback_to_copyright_string() {
        let license = match_license(
            None,
            Some("Someone, 2019 (https://creativecommons.org/licenses/by-nc-sa/4.0/)"),
        );
        assert_eq!(license.map(|l| l.code), Some("cc-by-nc-sa-4.0"));
    }

    #[test]
    fn test_unmatched_text_is_none_not_error() {
        assert!(match_license(Some("All rights reserved"), None).is_none());
        assert!(match_license(None, Some("(c) 2020 Some Label")).is_none());
        assert!(match_license(None, None).is_none());
    }

    #[test]
    fn test_license_field_takes_precedence_over_copyright() {
        let license = match_license(
            Some("cc0-1.0"),
            Some("https://creativecommons.org/licenses/by/4.0/"),
        );
        assert_eq!(license.map(|l| l.code), Some("cc0-1.0"));
    }
}
