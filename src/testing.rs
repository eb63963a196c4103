//! An in-memory backend whose DOM changes on a timetable, for exercising the
//! search, wait and navigation layers without a browser.
//!
//! Times are measured with `tokio::time::Instant` from when the current page
//! was loaded, so tests running with a paused clock control exactly when
//! nodes appear, disappear or become visible.

use crate::core::backend::{Backend, BackendCapabilities};
use crate::errors::{BackendFailure, FailureKind};
use crate::types::{Cookie, Modifier, SessionIdentity, WindowHandle};
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum ScriptedError {
    #[error("Element is stale: {0}")]
    Stale(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Backend terminated: {0}")]
    Terminated(String),
}

impl BackendFailure for ScriptedError {
    fn kind(&self) -> FailureKind {
        match self {
            ScriptedError::Stale(_) => FailureKind::Stale,
            ScriptedError::InvalidSelector(_) | ScriptedError::InvalidTarget(_) => {
                FailureKind::InvalidTarget
            }
            ScriptedError::Terminated(_) => FailureKind::Other,
        }
    }
}

/// Handle issued by [`ScriptedBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedHandle {
    Document,
    Node { generation: u64, index: usize },
}

#[derive(Debug, Clone)]
pub struct ScriptedNode {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub parent: Option<usize>,
    pub appears_after: Duration,
    pub removed_after: Option<Duration>,
    /// `None` means visible as soon as present.
    pub visible_after: Option<Duration>,
    pub hidden: bool,
}

impl ScriptedNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            text: String::new(),
            attributes: BTreeMap::new(),
            parent: None,
            appears_after: Duration::ZERO,
            removed_after: None,
            visible_after: None,
            hidden: false,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Nests this node under the node at `index` in the page's node list.
    pub fn child_of(mut self, index: usize) -> Self {
        self.parent = Some(index);
        self
    }

    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    pub fn removed_after(mut self, delay: Duration) -> Self {
        self.removed_after = Some(delay);
        self
    }

    pub fn visible_after(mut self, delay: Duration) -> Self {
        self.visible_after = Some(delay);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if !self.classes.is_empty() => Some(self.classes.join(" ")),
            _ => self.attributes.get(name).cloned(),
        }
    }
}

/// One compound selector: `tag`, `#id`, `.class` or combinations like
/// `li.item#first`. `*` matches any tag.
#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(raw: &str) -> Option<Self> {
        let valid = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        let marker = |c: char| c == '#' || c == '.';
        let mut compound = Compound::default();
        let mut rest = raw;
        let head_len = rest.find(marker).unwrap_or(rest.len());
        let head = &rest[..head_len];
        if head != "*" && !head.is_empty() {
            if !head.chars().all(valid) {
                return None;
            }
            compound.tag = Some(head.to_ascii_lowercase());
        }
        rest = &rest[head_len..];
        while let Some(kind) = rest.chars().next() {
            let body = &rest[1..];
            let len = body.find(marker).unwrap_or(body.len());
            let name = &body[..len];
            if name.is_empty() || !name.chars().all(valid) {
                return None;
            }
            match kind {
                '#' => compound.id = Some(name.to_string()),
                _ => compound.classes.push(name.to_string()),
            }
            rest = &body[len..];
        }
        (head_len > 0 || compound != Compound::default()).then_some(compound)
    }

    fn matches(&self, node: &ScriptedNode) -> bool {
        self.tag.as_ref().map_or(true, |tag| *tag == node.tag)
            && self.id.as_ref().map_or(true, |id| node.id.as_ref() == Some(id))
            && self.classes.iter().all(|class| node.classes.contains(class))
    }
}

struct Page {
    url: Option<String>,
    title: String,
    nodes: Vec<ScriptedNode>,
    loaded_at: Instant,
}

struct ScriptedState {
    page: Page,
    generation: u64,
    pages: HashMap<String, (String, Vec<ScriptedNode>)>,
    navigations: Vec<String>,
    history: Vec<String>,
    cursor: usize,
    windows: Vec<WindowHandle>,
    current_window: usize,
    frames: Vec<usize>,
    cookies: Vec<Cookie>,
    events: Vec<String>,
    calls: usize,
    close_calls: usize,
    terminated: Option<String>,
}

impl ScriptedState {
    fn elapsed(&self) -> Duration {
        self.page.loaded_at.elapsed()
    }

    fn is_present(&self, index: usize) -> bool {
        let elapsed = self.elapsed();
        let Some(node) = self.page.nodes.get(index) else {
            return false;
        };
        elapsed >= node.appears_after
            && node.removed_after.map_or(true, |removed| elapsed < removed)
            && node.parent.map_or(true, |parent| self.is_present(parent))
    }

    fn is_visible(&self, index: usize) -> bool {
        let elapsed = self.elapsed();
        let node = &self.page.nodes[index];
        self.is_present(index)
            && !node.hidden
            && node.visible_after.map_or(true, |visible| elapsed >= visible)
            && node.parent.map_or(true, |parent| self.is_visible(parent))
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut current = self.page.nodes[index].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.page.nodes[parent].parent;
        }
        false
    }

    /// Node index behind `handle`; `None` for the document.
    fn resolve(&self, handle: &ScriptedHandle) -> Result<Option<usize>, ScriptedError> {
        match *handle {
            ScriptedHandle::Document => Ok(None),
            ScriptedHandle::Node { generation, .. } if generation != self.generation => Err(
                ScriptedError::Stale("element belongs to a previous page".to_string()),
            ),
            ScriptedHandle::Node { index, .. } if !self.is_present(index) => Err(
                ScriptedError::Stale(format!("node {index} was removed from the page")),
            ),
            ScriptedHandle::Node { index, .. } => Ok(Some(index)),
        }
    }

    fn node(&self, handle: &ScriptedHandle) -> Result<&ScriptedNode, ScriptedError> {
        match self.resolve(handle)? {
            Some(index) => Ok(&self.page.nodes[index]),
            None => Err(ScriptedError::InvalidTarget(
                "the document is not an element".to_string(),
            )),
        }
    }

    fn node_mut(&mut self, handle: &ScriptedHandle) -> Result<&mut ScriptedNode, ScriptedError> {
        match self.resolve(handle)? {
            Some(index) => Ok(&mut self.page.nodes[index]),
            None => Err(ScriptedError::InvalidTarget(
                "the document is not an element".to_string(),
            )),
        }
    }

    fn candidates(&self, scope: Option<usize>) -> Vec<usize> {
        (0..self.page.nodes.len())
            .filter(|index| self.is_present(*index))
            .filter(|index| scope.map_or(true, |scope| self.is_descendant(*index, scope)))
            .collect()
    }

    fn matches_chain(&self, index: usize, chain: &[Compound]) -> bool {
        let Some((last, ancestors)) = chain.split_last() else {
            return false;
        };
        if !last.matches(&self.page.nodes[index]) {
            return false;
        }
        let mut remaining = ancestors;
        let mut current = self.page.nodes[index].parent;
        while let (Some((wanted, rest)), Some(parent)) = (remaining.split_last(), current) {
            if wanted.matches(&self.page.nodes[parent]) {
                remaining = rest;
            }
            current = self.page.nodes[parent].parent;
        }
        remaining.is_empty()
    }

    fn load(&mut self, url: &str) {
        let (title, nodes) = self.pages.get(url).cloned().unwrap_or_default();
        self.generation += 1;
        self.frames.clear();
        self.page = Page {
            url: Some(url.to_string()),
            title,
            nodes,
            loaded_at: Instant::now(),
        };
    }

    fn record(&mut self, event: String) {
        self.events.push(event);
    }

    fn label(&self, handle: &ScriptedHandle) -> String {
        match self.resolve(handle) {
            Ok(Some(index)) => {
                let node = &self.page.nodes[index];
                match &node.id {
                    Some(id) => format!("{}#{id}", node.tag),
                    None => format!("{}[{index}]", node.tag),
                }
            }
            _ => "document".to_string(),
        }
    }
}

/// Backend over a scripted, time-dependent node list.
pub struct ScriptedBackend {
    state: Mutex<ScriptedState>,
    capabilities: BackendCapabilities,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// An empty page with no URL, one window and interactive capabilities.
    /// Must be created inside a tokio runtime.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                page: Page {
                    url: None,
                    title: String::new(),
                    nodes: Vec::new(),
                    loaded_at: Instant::now(),
                },
                generation: 1,
                pages: HashMap::new(),
                navigations: Vec::new(),
                history: Vec::new(),
                cursor: 0,
                windows: vec![WindowHandle::new("window-0")],
                current_window: 0,
                frames: Vec::new(),
                cookies: Vec::new(),
                events: Vec::new(),
                calls: 0,
                close_calls: 0,
                terminated: None,
            }),
            capabilities: BackendCapabilities::interactive(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Shows `nodes` as the current page at `url`, loaded now.
    pub fn with_page(self, url: &str, nodes: Vec<ScriptedNode>) -> Self {
        {
            let mut state = self.state.lock();
            state.pages.insert(url.to_string(), (String::new(), nodes));
            state.load(url);
            state.history = vec![url.to_string()];
            state.cursor = 0;
        }
        self
    }

    /// Shows `nodes` on the current page without changing its URL.
    pub fn with_nodes(self, nodes: Vec<ScriptedNode>) -> Self {
        self.state.lock().page.nodes = nodes;
        self
    }

    /// Registers what navigating to `url` will load.
    pub fn with_route(self, url: &str, title: &str, nodes: Vec<ScriptedNode>) -> Self {
        self.state
            .lock()
            .pages
            .insert(url.to_string(), (title.to_string(), nodes));
        self
    }

    pub fn with_windows(self, count: usize, current: usize) -> Self {
        {
            let mut state = self.state.lock();
            state.windows = (0..count)
                .map(|index| WindowHandle::new(format!("window-{index}")))
                .collect();
            state.current_window = current;
        }
        self
    }

    pub fn with_cookies(self, cookies: Vec<Cookie>) -> Self {
        self.state.lock().cookies = cookies;
        self
    }

    /// Adds a node to the current page and returns its index.
    pub fn insert(&self, node: ScriptedNode) -> usize {
        let mut state = self.state.lock();
        state.page.nodes.push(node);
        state.page.nodes.len() - 1
    }

    /// Detaches the node at `index` (and its subtree) immediately.
    pub fn remove(&self, index: usize) {
        let mut state = self.state.lock();
        let elapsed = state.elapsed();
        if let Some(node) = state.page.nodes.get_mut(index) {
            node.removed_after = Some(elapsed);
        }
    }

    /// Every subsequent call fails with [`ScriptedError::Terminated`].
    pub fn terminate(&self, reason: &str) {
        self.state.lock().terminated = Some(reason.to_string());
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn backend_calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    pub fn frame_depth(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn current_window_index(&self) -> usize {
        self.state.lock().current_window
    }

    fn enter(&self) -> Result<MutexGuard<'_, ScriptedState>, ScriptedError> {
        let mut state = self.state.lock();
        state.calls += 1;
        if let Some(reason) = &state.terminated {
            return Err(ScriptedError::Terminated(reason.clone()));
        }
        Ok(state)
    }

    fn traverse(&self, delta: isize) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        let target = state
            .cursor
            .checked_add_signed(delta)
            .filter(|index| *index < state.history.len())
            .ok_or_else(|| ScriptedError::InvalidTarget(format!("no history entry {delta:+}")))?;
        state.cursor = target;
        let url = state.history[target].clone();
        state.load(&url);
        Ok(())
    }
}

fn search_css(state: &ScriptedState, scope: Option<usize>, selector: &str) -> Result<Vec<usize>, ScriptedError> {
    let chain = selector
        .split_whitespace()
        .map(Compound::parse)
        .collect::<Option<Vec<_>>>()
        .filter(|chain| !chain.is_empty())
        .ok_or_else(|| ScriptedError::InvalidSelector(selector.to_string()))?;
    Ok(state
        .candidates(scope)
        .into_iter()
        .filter(|index| state.matches_chain(*index, &chain))
        .collect())
}

/// Only `//tag` and `//*` are understood.
fn search_xpath(state: &ScriptedState, scope: Option<usize>, selector: &str) -> Result<Vec<usize>, ScriptedError> {
    let tag = selector
        .trim()
        .strip_prefix("//")
        .filter(|tag| *tag == "*" || (!tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric())))
        .ok_or_else(|| ScriptedError::InvalidSelector(selector.to_string()))?;
    Ok(state
        .candidates(scope)
        .into_iter()
        .filter(|index| tag == "*" || state.page.nodes[*index].tag == tag)
        .collect())
}

fn limited(found: Vec<usize>, limit: Option<usize>, generation: u64) -> Vec<ScriptedHandle> {
    found
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|index| ScriptedHandle::Node { generation, index })
        .collect()
}

#[async_trait]
impl Backend for ScriptedBackend {
    type Element = ScriptedHandle;
    type Error = ScriptedError;

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    async fn document_root(&self) -> Result<Vec<ScriptedHandle>, ScriptedError> {
        let _state = self.enter()?;
        Ok(vec![ScriptedHandle::Document])
    }

    async fn document_url(&self) -> Result<Option<String>, ScriptedError> {
        Ok(self.enter()?.page.url.clone())
    }

    async fn document_title(&self) -> Result<String, ScriptedError> {
        Ok(self.enter()?.page.title.clone())
    }

    async fn search_by_css(
        &self,
        scope: &ScriptedHandle,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScriptedHandle>, ScriptedError> {
        let state = self.enter()?;
        let found = search_css(&state, state.resolve(scope)?, selector)?;
        Ok(limited(found, limit, state.generation))
    }

    async fn search_by_xpath(
        &self,
        scope: &ScriptedHandle,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScriptedHandle>, ScriptedError> {
        let state = self.enter()?;
        let found = search_xpath(&state, state.resolve(scope)?, selector)?;
        Ok(limited(found, limit, state.generation))
    }

    async fn extract_tag(&self, element: &ScriptedHandle) -> Result<String, ScriptedError> {
        let state = self.enter()?;
        match state.resolve(element)? {
            Some(index) => Ok(state.page.nodes[index].tag.clone()),
            None => Ok("html".to_string()),
        }
    }

    async fn extract_text(&self, element: &ScriptedHandle) -> Result<String, ScriptedError> {
        let state = self.enter()?;
        let scope = state.resolve(element)?;
        let mut parts: Vec<&str> = Vec::new();
        if let Some(index) = scope {
            parts.push(&state.page.nodes[index].text);
        }
        for index in state.candidates(scope) {
            parts.push(&state.page.nodes[index].text);
        }
        Ok(parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn extract_html(&self, element: &ScriptedHandle) -> Result<String, ScriptedError> {
        let state = self.enter()?;
        let node = state.node(element)?;
        let attributes: String = ["id", "class"]
            .into_iter()
            .filter_map(|name| node.attribute(name).map(|value| (name.to_string(), value)))
            .chain(node.attributes.clone())
            .map(|(name, value)| format!(" {name}=\"{value}\""))
            .collect();
        Ok(format!("<{0}{attributes}>{1}</{0}>", node.tag, node.text))
    }

    async fn extract_attribute(
        &self,
        element: &ScriptedHandle,
        name: &str,
    ) -> Result<Option<String>, ScriptedError> {
        Ok(self.enter()?.node(element)?.attribute(name))
    }

    async fn set_attribute(
        &self,
        element: &ScriptedHandle,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        let node = state.node_mut(element)?;
        match (name, value) {
            ("id", value) => node.id = value.map(str::to_string),
            ("class", value) => {
                node.classes = value
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect()
            }
            (_, Some(value)) => {
                node.attributes.insert(name.to_string(), value.to_string());
            }
            (_, None) => {
                node.attributes.remove(name);
            }
        }
        Ok(())
    }

    async fn set_text(&self, element: &ScriptedHandle, value: &str) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.node_mut(element)?.text = value.to_string();
        let label = state.label(element);
        state.record(format!("type {label} {value}"));
        Ok(())
    }

    async fn is_actionable(&self, element: &ScriptedHandle) -> Result<bool, ScriptedError> {
        let state = self.enter()?;
        Ok(match state.resolve(element)? {
            Some(index) => state.is_visible(index),
            None => true,
        })
    }

    async fn is_attached(&self, element: &ScriptedHandle) -> Result<bool, ScriptedError> {
        Ok(self.enter()?.resolve(element).is_ok())
    }

    async fn click(
        &self,
        element: &ScriptedHandle,
        modifiers: &[Modifier],
    ) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.node(element)?;
        let label = state.label(element);
        if modifiers.is_empty() {
            state.record(format!("click {label}"));
        } else {
            state.record(format!("click {label} {modifiers:?}"));
        }
        Ok(())
    }

    async fn double_click(&self, element: &ScriptedHandle) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.node(element)?;
        let label = state.label(element);
        state.record(format!("double_click {label}"));
        Ok(())
    }

    async fn right_click(&self, element: &ScriptedHandle) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.node(element)?;
        let label = state.label(element);
        state.record(format!("right_click {label}"));
        Ok(())
    }

    async fn hover(&self, element: &ScriptedHandle) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.node(element)?;
        let label = state.label(element);
        state.record(format!("hover {label}"));
        Ok(())
    }

    async fn drag_and_drop(
        &self,
        element: &ScriptedHandle,
        target: &ScriptedHandle,
    ) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.node(element)?;
        state.node(target)?;
        let (from, to) = (state.label(element), state.label(target));
        state.record(format!("drag {from} {to}"));
        Ok(())
    }

    async fn submit(&self, element: &ScriptedHandle) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.resolve(element)?;
        let label = state.label(element);
        state.record(format!("submit {label}"));
        Ok(())
    }

    async fn navigate_to(&self, url: &str) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.navigations.push(url.to_string());
        if !state.history.is_empty() {
            let keep = state.cursor + 1;
            state.history.truncate(keep);
        }
        state.history.push(url.to_string());
        state.cursor = state.history.len() - 1;
        state.load(url);
        Ok(())
    }

    async fn navigate_back(&self, steps: usize) -> Result<(), ScriptedError> {
        self.traverse(-(steps as isize))
    }

    async fn navigate_forward(&self, steps: usize) -> Result<(), ScriptedError> {
        self.traverse(steps as isize)
    }

    async fn refresh(&self) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        state.generation += 1;
        state.frames.clear();
        state.page.loaded_at = Instant::now();
        Ok(())
    }

    async fn close(&self) -> Result<(), ScriptedError> {
        self.enter()?.close_calls += 1;
        Ok(())
    }

    async fn list_window_handles(&self) -> Result<Vec<WindowHandle>, ScriptedError> {
        Ok(self.enter()?.windows.clone())
    }

    async fn current_window_handle(&self) -> Result<WindowHandle, ScriptedError> {
        let state = self.enter()?;
        Ok(state.windows[state.current_window].clone())
    }

    async fn switch_to_window(&self, handle: &WindowHandle) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        let index = state
            .windows
            .iter()
            .position(|window| window == handle)
            .ok_or_else(|| ScriptedError::InvalidTarget(format!("no window {handle}")))?;
        state.current_window = index;
        state.frames.clear();
        Ok(())
    }

    async fn switch_to_frame(&self, element: &ScriptedHandle) -> Result<(), ScriptedError> {
        let mut state = self.enter()?;
        let index = state.resolve(element)?.ok_or_else(|| {
            ScriptedError::InvalidTarget("the document is not a frame".to_string())
        })?;
        if !matches!(state.page.nodes[index].tag.as_str(), "iframe" | "frame") {
            return Err(ScriptedError::InvalidTarget(format!(
                "{} is not a frame",
                state.page.nodes[index].tag
            )));
        }
        state.frames.push(index);
        Ok(())
    }

    async fn switch_to_top_frame(&self) -> Result<(), ScriptedError> {
        self.enter()?.frames.clear();
        Ok(())
    }

    async fn switch_to_parent_frame(&self) -> Result<(), ScriptedError> {
        self.enter()?.frames.pop();
        Ok(())
    }

    async fn fetch_cookies(&self) -> Result<Vec<Cookie>, ScriptedError> {
        Ok(self.enter()?.cookies.clone())
    }

    async fn session_identity(&self) -> Result<SessionIdentity, ScriptedError> {
        let state = self.enter()?;
        Ok(SessionIdentity {
            user_agent: Some("scripted-agent".to_string()),
            proxy: None,
            cookies: state.cookies.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_selectors_parse() {
        assert_eq!(
            Compound::parse("li.item#first"),
            Some(Compound {
                tag: Some("li".to_string()),
                id: Some("first".to_string()),
                classes: vec!["item".to_string()],
            })
        );
        assert_eq!(Compound::parse("*"), Some(Compound::default()));
        assert_eq!(Compound::parse("div[x]"), None);
        assert_eq!(Compound::parse(".a."), None);
    }

    #[tokio::test]
    async fn descendant_chains_match_through_ancestors() {
        let backend = ScriptedBackend::new().with_nodes(vec![
            ScriptedNode::new("ul").id("menu"),
            ScriptedNode::new("li").class("entry").child_of(0),
            ScriptedNode::new("a").text("Home").child_of(1),
            ScriptedNode::new("a").text("Elsewhere"),
        ]);
        let found = backend
            .search_by_css(&ScriptedHandle::Document, "#menu a", None)
            .await
            .unwrap();
        assert_eq!(found, vec![ScriptedHandle::Node { generation: 1, index: 2 }]);

        let all = backend
            .search_by_xpath(&ScriptedHandle::Document, "//a", Some(5))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
