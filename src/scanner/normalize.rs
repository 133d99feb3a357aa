use url::Url;

const ONION_SUFFIX: &str = ".onion";

/// Canonicalize a user-supplied address into a scheme-qualified onion URL.
///
/// Empty input stays empty. Anything that does not parse as a URL is
/// returned as-is so the fetch reports the real problem. Hosts with an
/// explicit port are left alone; otherwise trailing dots are stripped and
/// `.onion` is appended when missing.
#[must_use]
pub fn normalize_url(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }

    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("http://{input}")
    };

    if Url::parse(&with_scheme).is_err() {
        return with_scheme;
    }

    let Some((scheme, rest)) = with_scheme.split_once("://") else {
        return with_scheme;
    };

    // The authority ends at the first path, query or fragment delimiter.
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (userinfo, host) = match authority.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, authority),
    };

    if host.contains(':') {
        return with_scheme;
    }

    let mut host = host.trim_end_matches('.').to_string();
    if !host.ends_with(ONION_SUFFIX) {
        host.push_str(ONION_SUFFIX);
    }

    match userinfo {
        Some(user) => format!("{scheme}://{user}@{host}{tail}"),
        None => format!("{scheme}://{host}{tail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_gets_scheme_and_suffix() {
        assert_eq!(normalize_url("example"), "http://example.onion");
    }

    #[test]
    fn test_already_normalized_is_unchanged() {
        assert_eq!(normalize_url("http://x.onion"), "http://x.onion");
        assert_eq!(
            normalize_url("https://abc.onion/forum/index.php?t=1"),
            "https://abc.onion/forum/index.php?t=1"
        );
    }

    #[test]
    fn test_trailing_dots_are_stripped() {
        assert_eq!(normalize_url("site.."), "http://site.onion");
        assert_eq!(normalize_url("site.onion."), "http://site.onion");
    }

    #[test]
    fn test_explicit_port_is_left_alone() {
        assert_eq!(normalize_url("host:1234"), "http://host:1234");
        assert_eq!(
            normalize_url("http://127.0.0.1:8080/thread/1"),
            "http://127.0.0.1:8080/thread/1"
        );
    }

    #[test]
    fn test_whitespace_and_empty() {
        assert_eq!(normalize_url("   "), "");
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("  example  "), "http://example.onion");
    }

    #[test]
    fn test_path_is_preserved() {
        assert_eq!(
            normalize_url("dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad/d/all"),
            "http://dreadytofatroptsdj6io7l3xptbet6onoyno2yv7jicoxknyazubrad.onion/d/all"
        );
    }

    #[test]
    fn test_unparseable_is_returned_unchanged() {
        assert_eq!(normalize_url("http://exa mple"), "http://exa mple");
    }
}
