use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Whether this cookie would be sent with a request to `host` + `path`.
    pub fn matches(&self, host: &str, path: &str, https: bool) -> bool {
        if self.secure && !https {
            return false;
        }
        let domain = self.domain.trim_start_matches('.');
        let host_ok = host.eq_ignore_ascii_case(domain)
            || (host.len() > domain.len()
                && host.to_ascii_lowercase().ends_with(&domain.to_ascii_lowercase())
                && host.as_bytes()[host.len() - domain.len() - 1] == b'.');
        host_ok && path_matches(&self.path, path)
    }
}

/// RFC 6265 path-match: the cookie path is the request path or a prefix of it
/// that ends on a segment boundary.
fn path_matches(cookie_path: &str, request_path: &str) -> bool {
    let cookie_path = if cookie_path.is_empty() { "/" } else { cookie_path };
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/')))
}

/// Backend-issued identifier for a top-level window or tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub String);

impl WindowHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyboard modifiers held during a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// XPath when the selector starts with `/`, CSS otherwise.
    #[default]
    Auto,
    Css,
    Xpath,
}

impl Strategy {
    pub fn resolve(self, selector: &str) -> Strategy {
        match self {
            Strategy::Auto if selector.trim_start().starts_with('/') => Strategy::Xpath,
            Strategy::Auto => Strategy::Css,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Upper bound on the number of results; `None` is unbounded.
    pub limit: Option<usize>,
    pub strategy: Strategy,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn css(mut self) -> Self {
        self.strategy = Strategy::Css;
        self
    }

    pub fn xpath(mut self) -> Self {
        self.strategy = Strategy::Xpath;
        self
    }
}

/// What a backend knows about the identity of its browsing session, used to
/// build an [`HttpClient`](crate::core::HttpClient) that shares it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub cookies: Vec<Cookie>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_strategy_treats_leading_slash_as_xpath() {
        assert_eq!(Strategy::Auto.resolve("//div[@id='a']"), Strategy::Xpath);
        assert_eq!(Strategy::Auto.resolve("/html/body"), Strategy::Xpath);
        assert_eq!(Strategy::Auto.resolve("div > a"), Strategy::Css);
        assert_eq!(Strategy::Css.resolve("//div"), Strategy::Css);
    }

    #[test]
    fn cookie_domain_matching() {
        let cookie = Cookie::new("sid", "1", ".example.com");
        assert!(cookie.matches("example.com", "/", false));
        assert!(cookie.matches("www.example.com", "/a", false));
        assert!(!cookie.matches("badexample.com", "/", false));

        let mut secure = Cookie::new("sid", "1", "example.com");
        secure.secure = true;
        secure.path = "/app".to_string();
        assert!(!secure.matches("example.com", "/app", false));
        assert!(secure.matches("example.com", "/app/x", true));
        assert!(!secure.matches("example.com", "/other", true));
        assert!(!secure.matches("example.com", "/apple", true));
    }

    #[test]
    fn cookie_path_prefixes_end_on_a_segment() {
        let mut cookie = Cookie::new("pref", "1", "example.com");
        cookie.path = "/docs/".to_string();
        assert!(cookie.matches("example.com", "/docs/intro", false));
        assert!(!cookie.matches("example.com", "/docs", false));

        cookie.path = String::new();
        assert!(cookie.matches("example.com", "/anything", false));
    }
}
