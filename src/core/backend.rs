use crate::errors::BackendFailure;
use crate::types::{Cookie, Modifier, SessionIdentity, WindowHandle};
use async_trait::async_trait;
use std::fmt::Debug;

/// Backend capabilities that can be queried before issuing gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Live script execution and live DOM properties.
    pub scripting: bool,
    /// Simulated pointer input: click, hover, drag.
    pub pointer_input: bool,
    pub multiple_windows: bool,
    pub frames: bool,
    pub xpath: bool,
    /// Can describe its session well enough to build an HTTP client.
    pub http_client: bool,
}

impl BackendCapabilities {
    pub fn interactive() -> Self {
        Self {
            scripting: true,
            pointer_input: true,
            multiple_windows: true,
            frames: true,
            xpath: true,
            http_client: true,
        }
    }

    pub fn static_fetch() -> Self {
        Self {
            scripting: false,
            pointer_input: false,
            multiple_windows: false,
            frames: false,
            xpath: false,
            http_client: true,
        }
    }
}

/// The capability interface every execution backend satisfies.
///
/// Implementations let their own failures propagate unmodified; the core
/// normalizes them through [`BackendFailure::kind`].
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Opaque reference to a located node. Only the backend interprets it.
    type Element: Clone + Debug + Send + Sync + 'static;
    type Error: BackendFailure;

    fn capabilities(&self) -> BackendCapabilities;

    fn supports_scripting(&self) -> bool {
        self.capabilities().scripting
    }

    /// Root node(s) of the active document. Empty when nothing is loaded.
    async fn document_root(&self) -> Result<Vec<Self::Element>, Self::Error>;

    async fn document_url(&self) -> Result<Option<String>, Self::Error>;

    async fn document_title(&self) -> Result<String, Self::Error>;

    async fn search_by_css(
        &self,
        scope: &Self::Element,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Self::Element>, Self::Error>;

    async fn search_by_xpath(
        &self,
        scope: &Self::Element,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Self::Element>, Self::Error>;

    async fn extract_tag(&self, element: &Self::Element) -> Result<String, Self::Error>;

    async fn extract_text(&self, element: &Self::Element) -> Result<String, Self::Error>;

    async fn extract_html(&self, element: &Self::Element) -> Result<String, Self::Error>;

    async fn extract_attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, Self::Error>;

    /// Sets an attribute, or removes it when `value` is `None`.
    async fn set_attribute(
        &self,
        element: &Self::Element,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), Self::Error>;

    async fn set_text(&self, element: &Self::Element, value: &str) -> Result<(), Self::Error>;

    async fn is_actionable(&self, element: &Self::Element) -> Result<bool, Self::Error>;

    /// Whether the handle still refers to a node in the live document.
    async fn is_attached(&self, element: &Self::Element) -> Result<bool, Self::Error>;

    async fn click(&self, element: &Self::Element, modifiers: &[Modifier])
        -> Result<(), Self::Error>;

    async fn double_click(&self, element: &Self::Element) -> Result<(), Self::Error>;

    async fn right_click(&self, element: &Self::Element) -> Result<(), Self::Error>;

    async fn hover(&self, element: &Self::Element) -> Result<(), Self::Error>;

    async fn drag_and_drop(
        &self,
        element: &Self::Element,
        target: &Self::Element,
    ) -> Result<(), Self::Error>;

    async fn submit(&self, element: &Self::Element) -> Result<(), Self::Error>;

    async fn navigate_to(&self, url: &str) -> Result<(), Self::Error>;

    async fn navigate_back(&self, steps: usize) -> Result<(), Self::Error>;

    async fn navigate_forward(&self, steps: usize) -> Result<(), Self::Error>;

    async fn refresh(&self) -> Result<(), Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    async fn list_window_handles(&self) -> Result<Vec<WindowHandle>, Self::Error>;

    async fn current_window_handle(&self) -> Result<WindowHandle, Self::Error>;

    /// Handle list and current handle read together.
    async fn window_snapshot(&self) -> Result<(Vec<WindowHandle>, WindowHandle), Self::Error> {
        let handles = self.list_window_handles().await?;
        let current = self.current_window_handle().await?;
        Ok((handles, current))
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), Self::Error>;

    async fn switch_to_frame(&self, element: &Self::Element) -> Result<(), Self::Error>;

    async fn switch_to_top_frame(&self) -> Result<(), Self::Error>;

    async fn switch_to_parent_frame(&self) -> Result<(), Self::Error>;

    async fn fetch_cookies(&self) -> Result<Vec<Cookie>, Self::Error>;

    async fn session_identity(&self) -> Result<SessionIdentity, Self::Error>;
}
