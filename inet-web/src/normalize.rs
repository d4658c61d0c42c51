//! Scheme normalization for scraped and user-supplied URLs.

/// Scheme prepended to URLs that carry none.
pub const DEFAULT_SCHEME: &str = "http://";

/// Ensure `url` carries an explicit scheme, prepending `http://` otherwise.
///
/// Never fails: malformed input (including the empty string) just gets the
/// prefix. Applying it twice is the same as applying it once.
///
/// ```
/// use inet_web::normalize_url;
///
/// assert_eq!(normalize_url("example.com/about"), "http://example.com/about");
/// assert_eq!(normalize_url("https://example.com"), "https://example.com");
/// ```
pub fn normalize_url(url: &str) -> String {
    if has_scheme(url) {
        url.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{url}")
    }
}

/// `scheme ":"` prefix per RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ).
pub fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_default_scheme() {
        assert_eq!(normalize_url("example.com"), "http://example.com");
        assert_eq!(normalize_url("www.acme.co.uk/about-us"), "http://www.acme.co.uk/about-us");
    }

    #[test]
    fn existing_schemes_are_preserved() {
        for url in [
            "http://example.com",
            "https://example.com/about",
            "HTTPS://EXAMPLE.COM",
            "mailto:info@example.com",
        ] {
            assert_eq!(normalize_url(url), url);
        }
    }

    #[test]
    fn idempotent_over_awkward_inputs() {
        for url in [
            "",
            "/about",
            "//cdn.example.com/x",
            "?page=about",
            "1http://nope",
            ":colon-first",
            "exa mple .com",
            "about us",
            "https://twitter.com/acme",
        ] {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once, "input {url:?}");
            assert!(has_scheme(&once), "input {url:?}");
        }
    }

    #[test]
    fn relative_paths_are_prefixed_not_resolved() {
        assert_eq!(normalize_url("/about"), "http:///about");
        assert_eq!(normalize_url(""), "http://");
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("git+ssh://host/repo"));
        assert!(!has_scheme("1abc:foo"));
        assert!(!has_scheme("example.com/path"));
        assert!(!has_scheme(":x"));
    }
}
