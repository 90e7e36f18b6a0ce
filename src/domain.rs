//! Domain input cleanup: what the user types into the search box becomes a
//! bare lowercase host usable as a cache key and provider parameter.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FetchError;

static RE_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9+.\-]*://").expect("scheme regex"));

// RFC 1123 labels, at least one dot, alphabetic-ish TLD (punycode allowed).
static RE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+(?:[a-z]{2,63}|xn--[a-z0-9\-]{1,59})$")
        .expect("host regex")
});

/// `"  HTTPS://www.Google.com/search?q=x "` -> `"google.com"`.
///
/// Trims, lowercases, strips scheme, userinfo, port, path, query, fragment,
/// a trailing dot and a leading `www.`. Anything that is not a plausible
/// host name afterwards is rejected locally with `InvalidDomain`.
pub fn normalize_domain(input: &str) -> Result<String, FetchError> {
    let invalid = || FetchError::InvalidDomain(input.to_string());

    let lowered = input.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return Err(invalid());
    }

    let rest = RE_SCHEME.replace(&lowered, "");
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = host_port.split(':').next().unwrap_or_default();
    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.len() > 253 || !RE_HOST.is_match(host) {
        return Err(invalid());
    }
    Ok(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_path_and_www() {
        assert_eq!(
            normalize_domain("  HTTPS://www.Google.com/search?q=x ").unwrap(),
            "google.com"
        );
        assert_eq!(
            normalize_domain("https://www.facebook.com").unwrap(),
            "facebook.com"
        );
        assert_eq!(normalize_domain("example.co.uk.").unwrap(), "example.co.uk");
        assert_eq!(
            normalize_domain("http://user:pw@shop.example.com:8080/a#b").unwrap(),
            "shop.example.com"
        );
    }

    #[test]
    fn keeps_test_tld_and_subdomains() {
        assert_eq!(
            normalize_domain("unknown-domain.test").unwrap(),
            "unknown-domain.test"
        );
        assert_eq!(normalize_domain("a.b.c.io").unwrap(), "a.b.c.io");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        for bad in ["", "   ", "https://", "localhost", "exa mple.com", "-bad.com", "foo..com"] {
            assert!(
                matches!(normalize_domain(bad), Err(FetchError::InvalidDomain(_))),
                "expected InvalidDomain for {bad:?}"
            );
        }
    }
}
