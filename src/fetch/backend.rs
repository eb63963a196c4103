use super::document::StaticPage;
use super::FetchError;
use crate::core::backend::{Backend, BackendCapabilities};
use crate::core::config::FetchConfig;
use crate::types::{Cookie, Modifier, SessionIdentity, WindowHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ego_tree::NodeId;
use parking_lot::Mutex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Method, Proxy, RequestBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const MAIN_WINDOW: &str = "main";

/// Element handle understood by [`FetchBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchNode {
    Document,
    Node { generation: u64, id: NodeId },
}

#[derive(Debug, Default)]
struct History {
    pages: Vec<StaticPage>,
    cursor: usize,
    generation: u64,
}

impl History {
    fn current(&self) -> Option<&StaticPage> {
        self.pages.get(self.cursor)
    }

    fn current_mut(&mut self) -> Option<&mut StaticPage> {
        self.pages.get_mut(self.cursor)
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Loads a new page, dropping any forward entries.
    fn push(&mut self, url: Url, source: String) {
        let generation = self.next_generation();
        if !self.pages.is_empty() {
            self.pages.truncate(self.cursor + 1);
        }
        self.pages.push(StaticPage::new(url, source, generation));
        self.cursor = self.pages.len() - 1;
    }

    fn replace_current(&mut self, url: Url, source: String) {
        let generation = self.next_generation();
        let page = StaticPage::new(url, source, generation);
        match self.current_mut() {
            Some(current) => *current = page,
            None => self.pages.push(page),
        }
    }

    fn traverse(&mut self, delta: isize) -> Result<(), FetchError> {
        let target = self
            .cursor
            .checked_add_signed(delta)
            .filter(|index| *index < self.pages.len())
            .ok_or_else(|| {
                FetchError::InvalidTarget(format!("no history entry {delta:+} from the current page"))
            })?;
        let generation = self.next_generation();
        self.pages[target] = self.pages[target].reloaded(generation);
        self.cursor = target;
        Ok(())
    }
}

/// Backend over documents fetched with reqwest and parsed with scraper.
/// No scripting, no pointer input, one window.
pub struct FetchBackend {
    client: Client,
    config: FetchConfig,
    history: Mutex<History>,
    /// Cookies set by responses, with their attributes. The reqwest jar does
    /// the sending; this is what the session reports.
    cookies: Mutex<Vec<Cookie>>,
    closed: AtomicBool,
}

impl FetchBackend {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .cookie_provider(jar)
            .timeout(Duration::from_millis(config.request_timeout_ms));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            config,
            history: Mutex::new(History::default()),
            cookies: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// A backend already showing `html` as if it had been fetched from `url`.
    pub fn from_html(url: &str, html: impl Into<String>) -> Result<Self, FetchError> {
        let url = Url::parse(url)
            .map_err(|e| FetchError::InvalidTarget(format!("invalid url '{url}': {e}")))?;
        let backend = Self::new(FetchConfig::default())?;
        backend.history.lock().push(url, html.into());
        Ok(backend)
    }

    fn ensure_open(&self) -> Result<(), FetchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FetchError::Closed);
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&StaticPage) -> Result<T, FetchError>) -> Result<T, FetchError> {
        self.ensure_open()?;
        let history = self.history.lock();
        f(history.current().ok_or(FetchError::NoDocument)?)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut StaticPage) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        self.ensure_open()?;
        let mut history = self.history.lock();
        f(history.current_mut().ok_or(FetchError::NoDocument)?)
    }

    fn target(page: &StaticPage, element: &FetchNode) -> Result<Option<NodeId>, FetchError> {
        match *element {
            FetchNode::Document => Ok(None),
            FetchNode::Node { generation, .. } if generation != page.generation() => Err(
                FetchError::Stale("element belongs to a previous document".to_string()),
            ),
            FetchNode::Node { id, .. } if !page.is_attached(id) => Err(FetchError::Stale(
                "element was replaced by a text edit".to_string(),
            )),
            FetchNode::Node { id, .. } => Ok(Some(id)),
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> Result<(Url, String), FetchError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        self.record_cookies(&url, response.cookies());
        if !status.is_success() {
            warn!(%url, %status, "non-success response");
        }
        let body = response.text().await?;
        debug!(%url, %status, bytes = body.len(), "document fetched");
        Ok((url, body))
    }

    fn record_cookies<'a>(&self, url: &Url, set: impl Iterator<Item = reqwest::cookie::Cookie<'a>>) {
        let host = url.host_str().unwrap_or_default();
        let now = Utc::now();
        let mut stored = self.cookies.lock();
        for cookie in set {
            let domain = match cookie.domain() {
                Some(domain) => format!(".{}", domain.trim_start_matches('.')),
                None => host.to_string(),
            };
            let path = cookie
                .path()
                .filter(|path| path.starts_with('/'))
                .map(str::to_string)
                .unwrap_or_else(|| default_cookie_path(url));
            let expires = match cookie.max_age() {
                Some(age) => chrono::Duration::from_std(age).ok().map(|age| now + age),
                None => cookie.expires().map(DateTime::<Utc>::from),
            };

            stored.retain(|kept| {
                !(kept.name == cookie.name() && kept.domain == domain && kept.path == path)
            });
            if expires.is_some_and(|at| at <= now) {
                continue;
            }
            debug!(name = cookie.name(), %domain, %path, "cookie stored");
            stored.push(Cookie {
                name: cookie.name().to_string(),
                value: cookie.value().to_string(),
                domain,
                path,
                expires,
                secure: cookie.secure(),
                http_only: cookie.http_only(),
            });
        }
    }
}

/// Directory of the request path, the path a cookie gets when its response
/// names none.
fn default_cookie_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(end) => path[..end].to_string(),
    }
}

#[async_trait]
impl Backend for FetchBackend {
    type Element = FetchNode;
    type Error = FetchError;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::static_fetch()
    }

    async fn document_root(&self) -> Result<Vec<FetchNode>, FetchError> {
        self.ensure_open()?;
        let loaded = self.history.lock().current().is_some();
        Ok(if loaded { vec![FetchNode::Document] } else { Vec::new() })
    }

    async fn document_url(&self) -> Result<Option<String>, FetchError> {
        self.ensure_open()?;
        Ok(self
            .history
            .lock()
            .current()
            .map(|page| page.url().to_string()))
    }

    async fn document_title(&self) -> Result<String, FetchError> {
        self.read(|page| Ok(page.title()))
    }

    async fn search_by_css(
        &self,
        scope: &FetchNode,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<FetchNode>, FetchError> {
        self.read(|page| {
            let found = page.search(Self::target(page, scope)?, selector, limit)?;
            let generation = page.generation();
            Ok(found
                .into_iter()
                .map(|id| FetchNode::Node { generation, id })
                .collect())
        })
    }

    async fn search_by_xpath(
        &self,
        _scope: &FetchNode,
        _selector: &str,
        _limit: Option<usize>,
    ) -> Result<Vec<FetchNode>, FetchError> {
        Err(FetchError::Unsupported("xpath selectors"))
    }

    async fn extract_tag(&self, element: &FetchNode) -> Result<String, FetchError> {
        self.read(|page| page.tag(Self::target(page, element)?))
    }

    async fn extract_text(&self, element: &FetchNode) -> Result<String, FetchError> {
        self.read(|page| page.text(Self::target(page, element)?))
    }

    async fn extract_html(&self, element: &FetchNode) -> Result<String, FetchError> {
        self.read(|page| page.html(Self::target(page, element)?))
    }

    async fn extract_attribute(
        &self,
        element: &FetchNode,
        name: &str,
    ) -> Result<Option<String>, FetchError> {
        self.read(|page| page.attribute(Self::target(page, element)?, name))
    }

    async fn set_attribute(
        &self,
        element: &FetchNode,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), FetchError> {
        self.write(|page| {
            let target = Self::target(page, element)?;
            page.set_attribute(target, name, value)
        })
    }

    async fn set_text(&self, element: &FetchNode, value: &str) -> Result<(), FetchError> {
        self.write(|page| {
            let target = Self::target(page, element)?;
            page.set_text(target, value)
        })
    }

    /// Static documents have no layout; every live element counts as actionable.
    async fn is_actionable(&self, element: &FetchNode) -> Result<bool, FetchError> {
        self.read(|page| Self::target(page, element).map(|_| true))
    }

    async fn is_attached(&self, element: &FetchNode) -> Result<bool, FetchError> {
        self.read(|page| Ok(Self::target(page, element).is_ok()))
    }

    async fn click(&self, _element: &FetchNode, _modifiers: &[Modifier]) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("pointer input"))
    }

    async fn double_click(&self, _element: &FetchNode) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("pointer input"))
    }

    async fn right_click(&self, _element: &FetchNode) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("pointer input"))
    }

    async fn hover(&self, _element: &FetchNode) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("pointer input"))
    }

    async fn drag_and_drop(&self, _element: &FetchNode, _target: &FetchNode) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("pointer input"))
    }

    async fn submit(&self, element: &FetchNode) -> Result<(), FetchError> {
        let submission = self.read(|page| page.form_submission(Self::target(page, element)?))?;
        debug!(method = %submission.method, action = %submission.action, "submitting form");

        let request = if submission.method == Method::POST {
            self.client.post(submission.action).form(&submission.fields)
        } else {
            let mut action = submission.action;
            action.query_pairs_mut().clear().extend_pairs(&submission.fields);
            self.client.get(action)
        };
        let (url, source) = self.fetch(request).await?;
        self.history.lock().push(url, source);
        Ok(())
    }

    async fn navigate_to(&self, url: &str) -> Result<(), FetchError> {
        self.ensure_open()?;
        let (url, source) = self.fetch(self.client.get(url)).await?;
        info!(%url, "document loaded");
        self.history.lock().push(url, source);
        Ok(())
    }

    async fn navigate_back(&self, steps: usize) -> Result<(), FetchError> {
        self.ensure_open()?;
        if steps == 0 {
            return Ok(());
        }
        self.history.lock().traverse(-(steps as isize))
    }

    async fn navigate_forward(&self, steps: usize) -> Result<(), FetchError> {
        self.ensure_open()?;
        if steps == 0 {
            return Ok(());
        }
        self.history.lock().traverse(steps as isize)
    }

    async fn refresh(&self) -> Result<(), FetchError> {
        let url = self.read(|page| Ok(page.url().clone()))?;
        let (url, source) = self.fetch(self.client.get(url)).await?;
        self.history.lock().replace_current(url, source);
        Ok(())
    }

    async fn close(&self) -> Result<(), FetchError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            *self.history.lock() = History::default();
            info!("document session closed");
        }
        Ok(())
    }

    async fn list_window_handles(&self) -> Result<Vec<WindowHandle>, FetchError> {
        self.ensure_open()?;
        Ok(vec![WindowHandle::new(MAIN_WINDOW)])
    }

    async fn current_window_handle(&self) -> Result<WindowHandle, FetchError> {
        self.ensure_open()?;
        Ok(WindowHandle::new(MAIN_WINDOW))
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), FetchError> {
        self.ensure_open()?;
        if handle.as_str() == MAIN_WINDOW {
            Ok(())
        } else {
            Err(FetchError::NoSuchWindow(handle.to_string()))
        }
    }

    async fn switch_to_frame(&self, _element: &FetchNode) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("frames"))
    }

    async fn switch_to_top_frame(&self) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("frames"))
    }

    async fn switch_to_parent_frame(&self) -> Result<(), FetchError> {
        Err(FetchError::Unsupported("frames"))
    }

    /// Unexpired cookies that apply to the current document's URL.
    async fn fetch_cookies(&self) -> Result<Vec<Cookie>, FetchError> {
        self.ensure_open()?;
        let Some(url) = self.history.lock().current().map(|page| page.url().clone()) else {
            return Ok(Vec::new());
        };
        let host = url.host_str().unwrap_or_default();
        let https = url.scheme() == "https";
        let now = Utc::now();
        Ok(self
            .cookies
            .lock()
            .iter()
            .filter(|cookie| cookie.expires.map_or(true, |at| at > now))
            .filter(|cookie| cookie.matches(host, url.path(), https))
            .cloned()
            .collect())
    }

    async fn session_identity(&self) -> Result<SessionIdentity, FetchError> {
        Ok(SessionIdentity {
            user_agent: self.config.user_agent.clone(),
            proxy: self.config.proxy.clone(),
            cookies: self.fetch_cookies().await?,
        })
    }
}
