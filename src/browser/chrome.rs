use super::scripts::{self, NodeRef};
use super::{protocol, ChromeError};
use crate::core::backend::{Backend, BackendCapabilities};
use crate::core::config::BrowserConfig;
use crate::types::{Cookie, Modifier, SessionIdentity, WindowHandle};
use async_trait::async_trait;
use chrono::DateTime;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Element handle understood by [`ChromeBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChromeNode {
    /// The active document, or the active frame's document.
    Document,
    Node(NodeRef),
}

impl ChromeNode {
    fn handle(&self) -> Value {
        match self {
            ChromeNode::Document => Value::Null,
            ChromeNode::Node(node) => json!(node),
        }
    }
}

struct ActiveTab {
    tab: Arc<Tab>,
    /// Frames entered from the top document, outermost first.
    frames: Vec<NodeRef>,
}

pub struct ChromeBackend {
    browser: Browser,
    config: BrowserConfig,
    active: Mutex<ActiveTab>,
    closed: AtomicBool,
}

impl ChromeBackend {
    pub async fn launch(config: BrowserConfig) -> Result<Self, ChromeError> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={ua}"));
        let proxy_arg = config
            .proxy
            .as_ref()
            .map(|proxy| format!("--proxy-server={proxy}"));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }
        if let Some(ref proxy_arg) = proxy_arg {
            args.push(OsStr::new(proxy_arg));
        }
        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }
        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| ChromeError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| ChromeError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ChromeError::LaunchFailed(e.to_string()))?;

        info!(headless = config.headless, "chrome launched");
        Ok(Self {
            browser,
            config,
            active: Mutex::new(ActiveTab {
                tab,
                frames: Vec::new(),
            }),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), ChromeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChromeError::Closed);
        }
        Ok(())
    }

    fn tab(&self) -> Result<Arc<Tab>, ChromeError> {
        self.ensure_open()?;
        Ok(self.active.lock().tab.clone())
    }

    fn tabs(&self) -> Result<Vec<Arc<Tab>>, ChromeError> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|_| ChromeError::Protocol("tab list lock poisoned".to_string()))?;
        Ok(tabs.clone())
    }

    fn reset_frames(&self) {
        self.active.lock().frames.clear();
    }

    /// Runs one registry script in the active tab and decodes its value.
    fn call<T: DeserializeOwned>(&self, op: &str, args: Value) -> Result<T, ChromeError> {
        self.ensure_open()?;
        let (tab, frames) = {
            let active = self.active.lock();
            (active.tab.clone(), active.frames.clone())
        };
        let token = Uuid::new_v4().to_string();
        let script = scripts::build(op, &token, &frames, &args);
        let result = tab.evaluate(&script, false).map_err(protocol)?;
        let value = scripts::parse_envelope(result.value)?;
        Ok(serde_json::from_value(value)?)
    }

    fn call_unit(&self, op: &str, args: Value) -> Result<(), ChromeError> {
        self.call::<Value>(op, args).map(|_| ())
    }

    fn search(
        &self,
        op: &str,
        scope: &ChromeNode,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChromeNode>, ChromeError> {
        let refs: Vec<NodeRef> = self.call(
            op,
            json!({ "scope": scope.handle(), "selector": selector, "limit": limit }),
        )?;
        trace!(selector, found = refs.len(), "chrome search");
        Ok(refs.into_iter().map(ChromeNode::Node).collect())
    }

    fn traverse_history(&self, delta: i64) -> Result<(), ChromeError> {
        let tab = self.tab()?;
        self.call_unit(scripts::HISTORY, json!({ "delta": delta }))?;
        tab.wait_until_navigated().map_err(protocol)?;
        self.reset_frames();
        Ok(())
    }

    fn handle_of(tab: &Tab) -> WindowHandle {
        WindowHandle::new(tab.get_target_id().to_string())
    }
}

#[async_trait]
impl Backend for ChromeBackend {
    type Element = ChromeNode;
    type Error = ChromeError;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::interactive()
    }

    async fn document_root(&self) -> Result<Vec<ChromeNode>, ChromeError> {
        self.ensure_open()?;
        Ok(vec![ChromeNode::Document])
    }

    async fn document_url(&self) -> Result<Option<String>, ChromeError> {
        let url = self.tab()?.get_url();
        Ok((!url.is_empty()).then_some(url))
    }

    async fn document_title(&self) -> Result<String, ChromeError> {
        self.tab()?.get_title().map_err(protocol)
    }

    async fn search_by_css(
        &self,
        scope: &ChromeNode,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChromeNode>, ChromeError> {
        self.search(scripts::SEARCH_CSS, scope, selector, limit)
    }

    async fn search_by_xpath(
        &self,
        scope: &ChromeNode,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChromeNode>, ChromeError> {
        self.search(scripts::SEARCH_XPATH, scope, selector, limit)
    }

    async fn extract_tag(&self, element: &ChromeNode) -> Result<String, ChromeError> {
        self.call(scripts::TAG, json!({ "el": element.handle() }))
    }

    async fn extract_text(&self, element: &ChromeNode) -> Result<String, ChromeError> {
        self.call(scripts::TEXT, json!({ "el": element.handle() }))
    }

    async fn extract_html(&self, element: &ChromeNode) -> Result<String, ChromeError> {
        self.call(scripts::HTML, json!({ "el": element.handle() }))
    }

    async fn extract_attribute(
        &self,
        element: &ChromeNode,
        name: &str,
    ) -> Result<Option<String>, ChromeError> {
        self.call(
            scripts::ATTRIBUTE,
            json!({ "el": element.handle(), "name": name }),
        )
    }

    async fn set_attribute(
        &self,
        element: &ChromeNode,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ChromeError> {
        self.call_unit(
            scripts::SET_ATTRIBUTE,
            json!({ "el": element.handle(), "name": name, "value": value }),
        )
    }

    async fn set_text(&self, element: &ChromeNode, value: &str) -> Result<(), ChromeError> {
        self.call_unit(
            scripts::SET_TEXT,
            json!({ "el": element.handle(), "value": value }),
        )
    }

    async fn is_actionable(&self, element: &ChromeNode) -> Result<bool, ChromeError> {
        self.call(scripts::ACTIONABLE, json!({ "el": element.handle() }))
    }

    async fn is_attached(&self, element: &ChromeNode) -> Result<bool, ChromeError> {
        self.call(scripts::ATTACHED, json!({ "el": element.handle() }))
    }

    async fn click(&self, element: &ChromeNode, modifiers: &[Modifier]) -> Result<(), ChromeError> {
        self.call_unit(
            scripts::CLICK,
            json!({ "el": element.handle(), "modifiers": modifiers }),
        )
    }

    async fn double_click(&self, element: &ChromeNode) -> Result<(), ChromeError> {
        self.call_unit(scripts::DOUBLE_CLICK, json!({ "el": element.handle() }))
    }

    async fn right_click(&self, element: &ChromeNode) -> Result<(), ChromeError> {
        self.call_unit(scripts::RIGHT_CLICK, json!({ "el": element.handle() }))
    }

    async fn hover(&self, element: &ChromeNode) -> Result<(), ChromeError> {
        self.call_unit(scripts::HOVER, json!({ "el": element.handle() }))
    }

    async fn drag_and_drop(
        &self,
        element: &ChromeNode,
        target: &ChromeNode,
    ) -> Result<(), ChromeError> {
        self.call_unit(
            scripts::DRAG_AND_DROP,
            json!({ "el": element.handle(), "target": target.handle() }),
        )
    }

    async fn submit(&self, element: &ChromeNode) -> Result<(), ChromeError> {
        self.call_unit(scripts::SUBMIT, json!({ "el": element.handle() }))
    }

    async fn navigate_to(&self, url: &str) -> Result<(), ChromeError> {
        let tab = self.tab()?;
        tab.navigate_to(url).map_err(protocol)?;
        tab.wait_until_navigated().map_err(protocol)?;
        self.reset_frames();
        debug!(url, "chrome navigated");
        Ok(())
    }

    async fn navigate_back(&self, steps: usize) -> Result<(), ChromeError> {
        if steps == 0 {
            return Ok(());
        }
        self.traverse_history(-(steps as i64))
    }

    async fn navigate_forward(&self, steps: usize) -> Result<(), ChromeError> {
        if steps == 0 {
            return Ok(());
        }
        self.traverse_history(steps as i64)
    }

    async fn refresh(&self) -> Result<(), ChromeError> {
        let tab = self.tab()?;
        tab.reload(false, None).map_err(protocol)?;
        tab.wait_until_navigated().map_err(protocol)?;
        self.reset_frames();
        Ok(())
    }

    async fn close(&self) -> Result<(), ChromeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for tab in self.tabs()? {
            if let Err(e) = tab.close(true) {
                warn!(error = %e, "failed to close tab");
            }
        }
        info!("chrome session closed");
        Ok(())
    }

    async fn list_window_handles(&self) -> Result<Vec<WindowHandle>, ChromeError> {
        self.ensure_open()?;
        Ok(self.tabs()?.iter().map(|tab| Self::handle_of(tab)).collect())
    }

    async fn current_window_handle(&self) -> Result<WindowHandle, ChromeError> {
        Ok(Self::handle_of(&*self.tab()?))
    }

    async fn window_snapshot(&self) -> Result<(Vec<WindowHandle>, WindowHandle), ChromeError> {
        self.ensure_open()?;
        let current = Self::handle_of(&self.active.lock().tab);
        let handles = self.tabs()?.iter().map(|tab| Self::handle_of(tab)).collect();
        Ok((handles, current))
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), ChromeError> {
        self.ensure_open()?;
        let tab = self
            .tabs()?
            .into_iter()
            .find(|tab| Self::handle_of(tab) == *handle)
            .ok_or_else(|| ChromeError::NoSuchWindow(handle.to_string()))?;
        tab.activate().map_err(protocol)?;
        *self.active.lock() = ActiveTab {
            tab,
            frames: Vec::new(),
        };
        debug!(window = %handle, "switched window");
        Ok(())
    }

    async fn switch_to_frame(&self, element: &ChromeNode) -> Result<(), ChromeError> {
        let frame: NodeRef = self.call(scripts::FRAME, json!({ "el": element.handle() }))?;
        self.active.lock().frames.push(frame);
        Ok(())
    }

    async fn switch_to_top_frame(&self) -> Result<(), ChromeError> {
        self.ensure_open()?;
        self.reset_frames();
        Ok(())
    }

    async fn switch_to_parent_frame(&self) -> Result<(), ChromeError> {
        self.ensure_open()?;
        self.active.lock().frames.pop();
        Ok(())
    }

    async fn fetch_cookies(&self) -> Result<Vec<Cookie>, ChromeError> {
        let cookies = self.tab()?.get_cookies().map_err(protocol)?;
        Ok(cookies
            .into_iter()
            .map(|cookie| Cookie {
                expires: if cookie.session || cookie.expires <= 0.0 {
                    None
                } else {
                    DateTime::from_timestamp(cookie.expires as i64, 0)
                },
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain,
                path: cookie.path,
                secure: cookie.secure,
                http_only: cookie.http_only,
            })
            .collect())
    }

    async fn session_identity(&self) -> Result<SessionIdentity, ChromeError> {
        let user_agent: String = self.call(scripts::USER_AGENT, Value::Null)?;
        Ok(SessionIdentity {
            user_agent: Some(user_agent),
            proxy: self.config.proxy.clone(),
            cookies: self.fetch_cookies().await?,
        })
    }
}
