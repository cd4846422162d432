//! Anti-automation challenge page detection.
//!
//! Each marker fingerprints one vendor's challenge page; none is generic
//! wording a real listing could contain. A block that slips past these
//! checks surfaces later as a record with every field unavailable.

/// Vendor whose challenge page was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Cloudflare,
    DataDome,
    PerimeterX,
    Imperva,
    Generic,
    Empty,
}

const CLOUDFLARE_MARKERS: &[&str] = &[
    "/cdn-cgi/challenge-platform/",
    "cf-chl-",
    "attention required! | cloudflare",
];
const DATADOME_MARKERS: &[&str] = &["captcha-delivery.com", "datadome-captcha"];
const PERIMETERX_MARKERS: &[&str] = &["px-captcha", "_pxcaptcha"];
const IMPERVA_MARKERS: &[&str] = &["_incapsula_resource"];
const GENERIC_TITLE_MARKERS: &[&str] = &[
    "<title>just a moment...</title>",
    "<title>access denied</title>",
    "<title>pardon our interruption</title>",
];

/// Identifies which challenge page, if any, `content` is.
#[must_use]
pub fn challenge_kind(content: &str) -> Option<ChallengeKind> {
    if content.trim().is_empty() {
        return Some(ChallengeKind::Empty);
    }

    let lowered = content.to_ascii_lowercase();
    let has_any = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    if has_any(CLOUDFLARE_MARKERS) {
        Some(ChallengeKind::Cloudflare)
    } else if has_any(DATADOME_MARKERS) {
        Some(ChallengeKind::DataDome)
    } else if has_any(PERIMETERX_MARKERS) {
        Some(ChallengeKind::PerimeterX)
    } else if has_any(IMPERVA_MARKERS) {
        Some(ChallengeKind::Imperva)
    } else if has_any(GENERIC_TITLE_MARKERS) {
        Some(ChallengeKind::Generic)
    } else {
        None
    }
}

/// Returns `true` if `content` is an anti-automation challenge instead of the
/// requested page.
#[must_use]
pub fn is_blocked(content: &str) -> bool {
    challenge_kind(content).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_datadome_interstitial() {
        let html = r#"<html><head><title>etsy.com</title></head><body>
            <script src="https://ct.captcha-delivery.com/c.js"></script></body></html>"#;
        assert_eq!(challenge_kind(html), Some(ChallengeKind::DataDome));
        assert!(is_blocked(html));
    }

    #[test]
    fn detects_cloudflare_challenge() {
        let html = r#"<html><head><title>Just a moment...</title></head>
            <body><form action="/cdn-cgi/challenge-platform/h/b/orchestrate"></form></body></html>"#;
        assert_eq!(challenge_kind(html), Some(ChallengeKind::Cloudflare));
    }

    #[test]
    fn detects_generic_title_case_insensitively() {
        let html = "<html><head><TITLE>Access Denied</TITLE></head><body></body></html>";
        assert_eq!(challenge_kind(html), Some(ChallengeKind::Generic));
    }

    #[test]
    fn empty_body_counts_as_blocked() {
        assert_eq!(challenge_kind("  \n"), Some(ChallengeKind::Empty));
    }

    #[test]
    fn ordinary_listing_is_not_blocked() {
        let html = r#"<html><head><title>Handmade Mug - Etsy</title></head>
            <body><h1>Handmade Mug</h1><p>Please verify the size before ordering.
            Access denied to nobody; just a moment of your time.</p></body></html>"#;
        assert!(!is_blocked(html));
    }
}
