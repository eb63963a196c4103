use crate::errors::{PincerError, Result};
use crate::types::{Cookie, SessionIdentity};
use chrono::Utc;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// HTTP client carrying the identity of a browsing session: its user agent,
/// proxy and cookies.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    jar: Arc<Jar>,
    cookies: Vec<Cookie>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A resource fetched through the session's [`HttpClient`].
#[derive(Debug, Clone)]
pub struct Download {
    pub url: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Download {
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        tokio::fs::write(path, &self.data)
            .await
            .map_err(|e| PincerError::Backend(Box::new(e)))
    }
}

impl From<HttpResponse> for Download {
    fn from(response: HttpResponse) -> Self {
        Self {
            url: response.url,
            content_type: response.content_type,
            data: response.body,
        }
    }
}

impl HttpClient {
    pub fn from_identity(identity: SessionIdentity) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        for cookie in &identity.cookies {
            seed(&jar, cookie);
        }

        let mut builder = Client::builder().cookie_provider(jar.clone());
        if let Some(user_agent) = &identity.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(proxy) = &identity.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        Ok(Self {
            client: builder.build()?,
            jar,
            cookies: identity.cookies,
        })
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// `Cookie` header the client would send to `url`, if any cookie applies.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let header = self.jar.cookies(url)?;
        header.to_str().ok().map(str::to_string)
    }

    /// A request builder; session cookies are added when it is sent.
    pub fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let parsed = Url::parse(url)
            .map_err(|e| PincerError::InvalidTarget(format!("invalid url '{url}': {e}")))?;
        Ok(self.client.request(method, parsed))
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(self.request(Method::GET, url)?).await
    }

    pub async fn post_form<T: Serialize + ?Sized>(&self, url: &str, form: &T) -> Result<HttpResponse> {
        self.send(self.request(Method::POST, url)?.form(form)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpResponse> {
        let response = request.send().await?;
        let url = response.url().to_string();
        let status = response.status();
        debug!(%url, %status, "http response");
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            url,
            status,
            content_type,
            body,
        })
    }
}

/// Stores `cookie` in `jar` as if its own site had set it. A leading dot on
/// the domain marks a domain cookie; anything else is host-only.
fn seed(jar: &Jar, cookie: &Cookie) {
    if cookie.expires.is_some_and(|at| at <= Utc::now()) {
        return;
    }
    let host = cookie.domain.trim_start_matches('.');
    let path = if cookie.path.starts_with('/') { cookie.path.as_str() } else { "/" };
    let scheme = if cookie.secure { "https" } else { "http" };
    let origin = match Url::parse(&format!("{scheme}://{host}{path}")) {
        Ok(origin) => origin,
        Err(e) => {
            warn!(name = %cookie.name, domain = %cookie.domain, error = %e, "skipping cookie");
            return;
        }
    };

    let mut line = format!("{}={}; Path={path}", cookie.name, cookie.value);
    if cookie.domain.starts_with('.') {
        line.push_str(&format!("; Domain={host}"));
    }
    if let Some(expires) = cookie.expires {
        line.push_str(&expires.format("; Expires=%a, %d %b %Y %H:%M:%S GMT").to_string());
    }
    if cookie.secure {
        line.push_str("; Secure");
    }
    if cookie.http_only {
        line.push_str("; HttpOnly");
    }
    jar.add_cookie_str(&line, &origin);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_only_includes_matching_cookies() {
        let mut secure = Cookie::new("token", "s3cr3t", "example.com");
        secure.secure = true;
        let client = HttpClient::from_identity(SessionIdentity {
            user_agent: Some("test-agent".to_string()),
            proxy: None,
            cookies: vec![
                Cookie::new("sid", "abc", ".example.com"),
                secure,
                Cookie::new("other", "x", "elsewhere.org"),
            ],
        })
        .unwrap();

        let plain = Url::parse("http://www.example.com/page").unwrap();
        assert_eq!(client.cookie_header(&plain).as_deref(), Some("sid=abc"));

        let tls = Url::parse("https://example.com/").unwrap();
        let mut sent: Vec<String> = client
            .cookie_header(&tls)
            .unwrap()
            .split("; ")
            .map(str::to_string)
            .collect();
        sent.sort();
        assert_eq!(sent, vec!["sid=abc", "token=s3cr3t"]);

        let unrelated = Url::parse("https://nowhere.net/").unwrap();
        assert_eq!(client.cookie_header(&unrelated), None);
    }

    #[test]
    fn cookie_paths_match_whole_segments() {
        let mut scoped = Cookie::new("pref", "1", "example.com");
        scoped.path = "/app".to_string();
        let client = HttpClient::from_identity(SessionIdentity {
            cookies: vec![scoped],
            ..Default::default()
        })
        .unwrap();

        let header = |url: &str| client.cookie_header(&Url::parse(url).unwrap());
        assert_eq!(header("http://example.com/app").as_deref(), Some("pref=1"));
        assert_eq!(header("http://example.com/app/settings").as_deref(), Some("pref=1"));
        assert_eq!(header("http://example.com/apple"), None);
        assert_eq!(header("http://sub.example.com/app"), None);
    }

    #[test]
    fn expired_cookies_are_not_sent() {
        let mut stale = Cookie::new("old", "1", "example.com");
        stale.expires = Some(Utc::now() - chrono::Duration::hours(1));
        let client = HttpClient::from_identity(SessionIdentity {
            cookies: vec![stale],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.cookie_header(&Url::parse("http://example.com/").unwrap()), None);
    }
}
