use super::*;

#[test]
fn parse_strips_scheme_port_path_and_case() {
    let host = Hostname::parse("https://user:pw@Example.COM:8443/a/b?q=1#frag").unwrap();
    assert_eq!(host.as_str(), "example.com");
}

#[test]
fn scheme_separator_inside_query_is_ignored() {
    assert_eq!(Hostname::parse("a.com/x?u=http://b.com").unwrap().as_str(), "a.com");
    assert_eq!(Hostname::parse("a.com?next=https://b.com").unwrap().as_str(), "a.com");
    assert_eq!(Hostname::parse("https://a.com/?next=http://b.com").unwrap().as_str(), "a.com");
    assert_eq!(Hostname::parse("a.com#http://b.com").unwrap().as_str(), "a.com");
}

#[test]
fn parse_accepts_bare_hosts() {
    assert_eq!(Hostname::parse("News.Example.org").unwrap().as_str(), "news.example.org");
    assert_eq!(Hostname::parse("localhost:3000").unwrap().as_str(), "localhost");
    assert_eq!(Hostname::parse("  example.com.  ").unwrap().as_str(), "example.com");
}

#[test]
fn parse_keeps_ipv6_brackets() {
    assert_eq!(Hostname::parse("http://[::1]:8080/").unwrap().as_str(), "[::1]");
    assert_eq!(
        Hostname::parse("[::1"),
        Err(HostnameError::UnclosedBracket("[::1".into()))
    );
}

#[test]
fn parse_rejects_empty_and_invalid() {
    assert_eq!(Hostname::parse(""), Err(HostnameError::Empty));
    assert_eq!(Hostname::parse("https:///path"), Err(HostnameError::Empty));
    assert!(matches!(
        Hostname::parse("exa mple.com"),
        Err(HostnameError::InvalidCharacter { ch: ' ', .. })
    ));
}

#[test]
fn equivalent_inputs_share_a_key() {
    let a = Hostname::parse("https://EXAMPLE.com/path").unwrap();
    let b = Hostname::parse("example.com:80").unwrap();
    assert_eq!(a, b);
}

#[test]
fn hostname_serde_is_a_plain_string() {
    let host = Hostname::parse("example.com").unwrap();
    assert_eq!(serde_json::to_string(&host).unwrap(), "\"example.com\"");

    let parsed: Hostname = serde_json::from_str("\"Example.COM\"").unwrap();
    assert_eq!(parsed.as_str(), "example.com");
    assert!(serde_json::from_str::<Hostname>("\"\"").is_err());
}

#[test]
fn classify_privileged_pages() {
    assert!(PageAddress::classify("chrome://extensions").is_privileged());
    assert!(PageAddress::classify("CHROME-EXTENSION://abc/popup.html").is_privileged());
    assert!(PageAddress::classify("about:blank").is_privileged());
    assert!(PageAddress::classify("").is_privileged());
}

#[test]
fn classify_content_pages() {
    let page = PageAddress::classify("https://docs.example.com/guide");
    assert_eq!(page.hostname().map(Hostname::as_str), Some("docs.example.com"));
    assert!(!page.is_privileged());
}

#[test]
fn classify_hostless_pages_as_content_without_hostname() {
    assert_eq!(PageAddress::classify("file:///home/me/index.html"), PageAddress::Content { hostname: None });
    assert_eq!(PageAddress::classify("data:text/html,hi"), PageAddress::Content { hostname: None });
}

#[test]
fn invalid_hostname_has_stable_error_code() {
    use crate::frame::ErrorCode;
    assert_eq!(HostnameError::Empty.error_code(), "E_INVALID_HOSTNAME");
    assert!(!HostnameError::Empty.retryable());
}
