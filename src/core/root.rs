use crate::core::backend::Backend;
use crate::core::config::Config;
use crate::core::context::SearchContext;
use crate::core::cookies::CookieJar;
use crate::core::http::{Download, HttpClient};
use crate::core::navigation::{resolve_target_url, FrameTarget, Target, WindowSelector};
use crate::errors::{Normalize, PincerError, Result};
use crate::types::{SearchOptions, WindowHandle};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// The document-scoped context. Owns the backend and adds everything that
/// only makes sense for the whole session: navigation, windows, frames,
/// cookies and raw HTTP access.
///
/// Dereferences to the [`SearchContext`] bound to the document root.
pub struct RootContext<B: Backend> {
    document: SearchContext<B>,
    cookies: OnceLock<CookieJar<B>>,
    closed: AtomicBool,
}

impl<B: Backend> Deref for RootContext<B> {
    type Target = SearchContext<B>;

    fn deref(&self) -> &Self::Target {
        &self.document
    }
}

impl<B: Backend> RootContext<B> {
    pub async fn new(backend: B, config: Config) -> Result<Self> {
        let backend = Arc::new(backend);
        let elements = backend.document_root().await.normalized()?;
        Ok(Self {
            document: SearchContext::root(backend, Arc::new(config), elements),
            cookies: OnceLock::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// The search context bound to the document root.
    pub fn document(&self) -> &SearchContext<B> {
        &self.document
    }

    pub fn default_timeout(&self) -> std::time::Duration {
        self.config().wait_timeout()
    }

    pub fn default_interval(&self) -> std::time::Duration {
        self.config().wait_interval()
    }

    pub fn advanced_mode(&self) -> bool {
        self.config().advanced_mode
    }

    pub async fn url(&self) -> Result<Option<String>> {
        self.backend().document_url().await.normalized()
    }

    /// Resolves `partial` against the current document URL.
    pub async fn resolve_url(&self, partial: &str) -> Result<String> {
        let current = self.url().await?;
        resolve_target_url(partial, current.as_deref())
    }

    pub async fn title(&self) -> Result<String> {
        self.backend().document_title().await.normalized()
    }

    pub async fn goto(&self, target: impl Into<Target>) -> Result<&Self> {
        match target.into() {
            Target::Url(url) => self.goto_url(&url).await?,
            Target::Frame(frame) => self.goto_frame_target(frame).await?,
            Target::Window(which) => {
                self.window(which).await?;
            }
        }
        self.document.sync_root().await?;
        Ok(self)
    }

    async fn goto_url(&self, raw: &str) -> Result<()> {
        let current = self.url().await?;
        let url = resolve_target_url(raw, current.as_deref())?;
        info!(%url, "navigating");
        self.backend().navigate_to(&url).await.normalized()
    }

    async fn goto_frame_target(&self, frame: FrameTarget) -> Result<()> {
        if !self.backend().capabilities().frames {
            return Err(PincerError::unsupported("frames"));
        }
        match frame {
            FrameTarget::Top => {
                debug!("switching to top frame");
                self.backend().switch_to_top_frame().await.normalized()
            }
            FrameTarget::Parent => {
                debug!("switching to parent frame");
                self.backend().switch_to_parent_frame().await.normalized()
            }
            FrameTarget::Selector(selector) => {
                let frame = self
                    .search_with(&selector, SearchOptions::new().limit(1))
                    .await?;
                frame.goto_frame().await?;
                Ok(())
            }
        }
    }

    pub async fn back(&self, steps: usize) -> Result<&Self> {
        debug!(steps, "navigating back");
        self.backend().navigate_back(steps).await.normalized()?;
        self.document.sync_root().await?;
        Ok(self)
    }

    pub async fn forward(&self, steps: usize) -> Result<&Self> {
        debug!(steps, "navigating forward");
        self.backend().navigate_forward(steps).await.normalized()?;
        self.document.sync_root().await?;
        Ok(self)
    }

    pub async fn refresh(&self) -> Result<&Self> {
        debug!("refreshing document");
        self.backend().refresh().await.normalized()?;
        self.document.sync_root().await?;
        Ok(self)
    }

    /// Releases the backend session. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("session already closed");
            return Ok(());
        }
        info!("closing session");
        let closed = self.backend().close().await.normalized();
        self.document.clear_root();
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn windows(&self) -> Result<Vec<WindowHandle>> {
        self.backend().list_window_handles().await.normalized()
    }

    /// Switches to the selected window and returns its handle. Neighbours are
    /// computed from a single snapshot of the backend's window list; there is
    /// no wrap-around.
    pub async fn window(&self, which: WindowSelector) -> Result<WindowHandle> {
        let (handles, current) = self.backend().window_snapshot().await.normalized()?;
        let position = handles.iter().position(|handle| *handle == current);

        let neighbour = |offset: isize| -> Result<WindowHandle> {
            let position = position.ok_or_else(|| {
                PincerError::InvalidTarget(format!("current window {current} is not listed"))
            })?;
            position
                .checked_add_signed(offset)
                .and_then(|index| handles.get(index))
                .cloned()
                .ok_or_else(|| PincerError::InvalidTarget(format!("no window at {which:?} of {current}")))
        };

        let target = match which {
            WindowSelector::Current => current.clone(),
            WindowSelector::Next => neighbour(1)?,
            WindowSelector::Previous => neighbour(-1)?,
            WindowSelector::First => handles
                .first()
                .cloned()
                .ok_or_else(|| PincerError::InvalidTarget("no windows are open".to_string()))?,
            WindowSelector::Last => handles
                .last()
                .cloned()
                .ok_or_else(|| PincerError::InvalidTarget("no windows are open".to_string()))?,
            WindowSelector::Index(index) => handles.get(index).cloned().ok_or_else(|| {
                PincerError::InvalidTarget(format!(
                    "window index {index} out of range ({} open)",
                    handles.len()
                ))
            })?,
        };

        if target != current {
            debug!(from = %current, to = %target, "switching window");
            self.backend().switch_to_window(&target).await.normalized()?;
            self.document.sync_root().await?;
        }
        Ok(target)
    }

    /// The session's cookie jar, built on first use.
    pub fn cookies(&self) -> &CookieJar<B> {
        self.cookies
            .get_or_init(|| CookieJar::new(self.document.backend_arc().clone()))
    }

    /// An HTTP client sharing the session's user agent, proxy and cookies.
    pub async fn http_client(&self) -> Result<HttpClient> {
        if !self.backend().capabilities().http_client {
            return Err(PincerError::unsupported("http client derivation"));
        }
        let identity = self.backend().session_identity().await.normalized()?;
        HttpClient::from_identity(identity)
    }

    /// Fetches `url` (resolved against the current document) through the
    /// session's HTTP client.
    pub async fn download(&self, url: &str) -> Result<Download> {
        let url = self.resolve_url(url).await?;
        let client = self.http_client().await?;
        info!(%url, "downloading");
        Ok(client.get(&url).await?.into())
    }
}
