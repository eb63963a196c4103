use crate::core::backend::Backend;
use crate::core::config::Config;
use crate::core::wait::{self, Condition, WaitOptions};
use crate::errors::{Normalize, PincerError, Result};
use crate::types::{Modifier, SearchOptions, Strategy};
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

type Reload<'a, B> = Pin<Box<dyn Future<Output = Result<Option<SearchContext<B>>>> + Send + 'a>>;

/// Zero or more located elements plus the means to narrow, read, act on,
/// and wait for them.
///
/// Contexts are immutable values: every narrowing operation returns a new
/// context that links back to the one it came from.
pub struct SearchContext<B: Backend> {
    backend: Arc<B>,
    config: Arc<Config>,
    elements: Members<B::Element>,
    origin: Origin<B>,
}

/// Element set of a context. The document context tracks whatever the
/// backend currently reports as its root; every other context is fixed at
/// resolution time.
#[derive(Debug, Clone)]
enum Members<E> {
    Fixed(Vec<E>),
    Live(Arc<RwLock<Vec<E>>>),
}

impl<E: Clone> Members<E> {
    fn snapshot(&self) -> Vec<E> {
        match self {
            Members::Fixed(elements) => elements.clone(),
            Members::Live(root) => root.read().clone(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Members::Fixed(elements) => elements.len(),
            Members::Live(root) => root.read().len(),
        }
    }
}

/// How a context was produced, which is also how it is re-resolved.
pub(crate) enum Origin<B: Backend> {
    Root,
    Search {
        parent: Arc<SearchContext<B>>,
        selector: String,
        options: SearchOptions,
    },
    Pick {
        parent: Arc<SearchContext<B>>,
        pick: Pick,
    },
    Derived {
        parent: Arc<SearchContext<B>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    First,
    Last,
    At(usize),
}

impl Pick {
    fn apply<T: Clone>(self, items: &[T]) -> Vec<T> {
        let picked = match self {
            Pick::First => items.first(),
            Pick::Last => items.last(),
            Pick::At(index) => items.get(index),
        };
        picked.cloned().into_iter().collect()
    }
}

impl<B: Backend> Clone for Origin<B> {
    fn clone(&self) -> Self {
        match self {
            Origin::Root => Origin::Root,
            Origin::Search {
                parent,
                selector,
                options,
            } => Origin::Search {
                parent: parent.clone(),
                selector: selector.clone(),
                options: *options,
            },
            Origin::Pick { parent, pick } => Origin::Pick {
                parent: parent.clone(),
                pick: *pick,
            },
            Origin::Derived { parent } => Origin::Derived {
                parent: parent.clone(),
            },
        }
    }
}

impl<B: Backend> Clone for SearchContext<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
            elements: self.elements.clone(),
            origin: self.origin.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for SearchContext<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchContext")
            .field("query", &self.describe())
            .field("elements", &self.elements.snapshot())
            .finish()
    }
}

impl<B: Backend> SearchContext<B> {
    pub(crate) fn root(backend: Arc<B>, config: Arc<Config>, elements: Vec<B::Element>) -> Self {
        Self {
            backend,
            config,
            elements: Members::Live(Arc::new(RwLock::new(elements))),
            origin: Origin::Root,
        }
    }

    fn child(&self, elements: Vec<B::Element>, origin: Origin<B>) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
            elements: Members::Fixed(elements),
            origin,
        }
    }

    fn shared(&self) -> Arc<Self> {
        Arc::new(self.clone())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_arc(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The element handles held by this context, in document order.
    pub fn handles(&self) -> Vec<B::Element> {
        self.elements.snapshot()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_root(&self) -> bool {
        matches!(self.origin, Origin::Root)
    }

    pub fn parent(&self) -> Option<&SearchContext<B>> {
        match &self.origin {
            Origin::Root => None,
            Origin::Search { parent, .. }
            | Origin::Pick { parent, .. }
            | Origin::Derived { parent } => Some(parent),
        }
    }

    /// Human-readable description of the query chain that produced this context.
    pub fn describe(&self) -> String {
        match &self.origin {
            Origin::Root => "document".to_string(),
            Origin::Search {
                parent, selector, ..
            } if parent.is_root() => format!("'{selector}'"),
            Origin::Search {
                parent, selector, ..
            } => format!("{} >> '{selector}'", parent.describe()),
            Origin::Pick { parent, pick } => format!("{pick:?} of {}", parent.describe()),
            Origin::Derived { parent } => format!("subset of {}", parent.describe()),
        }
    }

    /// Elements to operate on. The root context re-reads the backend's
    /// current document and records it for later narrowing.
    async fn scope(&self) -> Result<Vec<B::Element>> {
        match &self.elements {
            Members::Live(root) => {
                let current = self.backend.document_root().await.normalized()?;
                *root.write() = current.clone();
                Ok(current)
            }
            Members::Fixed(elements) => Ok(elements.clone()),
        }
    }

    /// Brings the document context in line with the backend after the
    /// backend switched documents.
    pub(crate) async fn sync_root(&self) -> Result<()> {
        self.scope().await.map(|_| ())
    }

    pub(crate) fn clear_root(&self) {
        if let Members::Live(root) = &self.elements {
            root.write().clear();
        }
    }

    async fn first_handle(&self) -> Result<B::Element> {
        self.scope()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PincerError::NoSuchElement(format!("nothing matched {}", self.describe())))
    }

    pub async fn search(&self, selector: &str) -> Result<Self> {
        self.search_with(selector, SearchOptions::default()).await
    }

    /// Resolves `selector` under every element of this context and
    /// concatenates the results in encounter order. No match is an empty
    /// context, not an error.
    pub async fn search_with(&self, selector: &str, options: SearchOptions) -> Result<Self> {
        let origin = Origin::Search {
            parent: self.shared(),
            selector: selector.to_string(),
            options,
        };
        let scope = self.scope().await?;
        if scope.is_empty() {
            return Ok(self.child(Vec::new(), origin));
        }

        let strategy = options.strategy.resolve(selector);
        if strategy == Strategy::Xpath && !self.backend.capabilities().xpath {
            return Err(PincerError::unsupported("xpath selectors"));
        }

        let mut found = Vec::new();
        for element in &scope {
            let remaining = options.limit.map(|limit| limit.saturating_sub(found.len()));
            if remaining == Some(0) {
                break;
            }
            let batch = match strategy {
                Strategy::Xpath => self.backend.search_by_xpath(element, selector, remaining).await,
                _ => self.backend.search_by_css(element, selector, remaining).await,
            }
            .normalized()?;
            found.extend(batch);
        }
        if let Some(limit) = options.limit {
            found.truncate(limit);
        }

        trace!(selector, matches = found.len(), "search resolved");
        Ok(self.child(found, origin))
    }

    fn pick(&self, pick: Pick) -> Self {
        let elements = pick.apply(&self.elements.snapshot());
        self.child(
            elements,
            Origin::Pick {
                parent: self.shared(),
                pick,
            },
        )
    }

    pub fn first(&self) -> Self {
        self.pick(Pick::First)
    }

    pub fn last(&self) -> Self {
        self.pick(Pick::Last)
    }

    pub fn at(&self, index: usize) -> Self {
        self.pick(Pick::At(index))
    }

    /// One single-element context per held element, in order.
    pub fn each(&self) -> Vec<Self> {
        let parent = self.shared();
        self.elements
            .snapshot()
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                self.child(
                    vec![element],
                    Origin::Pick {
                        parent: parent.clone(),
                        pick: Pick::At(index),
                    },
                )
            })
            .collect()
    }

    /// Keeps the elements for which `predicate` holds. The predicate receives
    /// each element as a single-element context.
    pub async fn filter<F, Fut>(&self, mut predicate: F) -> Result<Self>
    where
        F: FnMut(SearchContext<B>) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let mut kept = Vec::new();
        for single in self.each() {
            if predicate(single.clone()).await? {
                kept.extend(single.handles());
            }
        }
        Ok(self.child(
            kept,
            Origin::Derived {
                parent: self.shared(),
            },
        ))
    }

    /// Re-runs the chain that produced this context against the live
    /// document. `None` when the context cannot be re-resolved: filtered
    /// subsets, and picks taken from them.
    ///
    /// A search under a subset that cannot be re-resolved runs again from the
    /// subset's elements that are still attached.
    pub fn reload(&self) -> Reload<'_, B> {
        Box::pin(async move {
            match &self.origin {
                Origin::Root => {
                    self.sync_root().await?;
                    Ok(Some(self.clone()))
                }
                Origin::Search {
                    parent,
                    selector,
                    options,
                } => {
                    let base = match parent.reload().await? {
                        Some(base) => base,
                        None => parent.retain_attached().await?,
                    };
                    base.search_with(selector, *options).await.map(Some)
                }
                Origin::Pick { parent, pick } => {
                    Ok(parent.reload().await?.map(|base| base.pick(*pick)))
                }
                Origin::Derived { .. } => Ok(None),
            }
        })
    }

    /// A copy holding only the elements whose handles are still live.
    pub async fn retain_attached(&self) -> Result<Self> {
        let mut live = Vec::new();
        for element in self.scope().await? {
            if self.backend.is_attached(&element).await.normalized()? {
                live.push(element);
            }
        }
        Ok(Self {
            elements: Members::Fixed(live),
            ..self.clone()
        })
    }

    pub async fn tag(&self) -> Result<String> {
        let element = self.first_handle().await?;
        self.backend.extract_tag(&element).await.normalized()
    }

    pub async fn text(&self) -> Result<String> {
        let element = self.first_handle().await?;
        self.backend.extract_text(&element).await.normalized()
    }

    /// Text of every element, in order.
    pub async fn texts(&self) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for element in self.scope().await? {
            texts.push(self.backend.extract_text(&element).await.normalized()?);
        }
        Ok(texts)
    }

    pub async fn html(&self) -> Result<String> {
        let element = self.first_handle().await?;
        self.backend.extract_html(&element).await.normalized()
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        let element = self.first_handle().await?;
        self.backend.extract_attribute(&element, name).await.normalized()
    }

    pub async fn set_attribute(&self, name: &str, value: &str) -> Result<&Self> {
        for element in self.scope().await? {
            self.backend
                .set_attribute(&element, name, Some(value))
                .await
                .normalized()?;
        }
        Ok(self)
    }

    pub async fn remove_attribute(&self, name: &str) -> Result<&Self> {
        for element in self.scope().await? {
            self.backend
                .set_attribute(&element, name, None)
                .await
                .normalized()?;
        }
        Ok(self)
    }

    pub async fn set_text(&self, value: &str) -> Result<&Self> {
        for element in self.scope().await? {
            self.ready_for_input(&element).await?;
            self.backend.set_text(&element, value).await.normalized()?;
        }
        Ok(self)
    }

    pub async fn click(&self) -> Result<&Self> {
        self.click_with(&[]).await
    }

    pub async fn click_with(&self, modifiers: &[Modifier]) -> Result<&Self> {
        for element in self.pointer_targets("click").await? {
            self.ready_for_input(&element).await?;
            self.backend.click(&element, modifiers).await.normalized()?;
        }
        Ok(self)
    }

    pub async fn double_click(&self) -> Result<&Self> {
        for element in self.pointer_targets("double click").await? {
            self.ready_for_input(&element).await?;
            self.backend.double_click(&element).await.normalized()?;
        }
        Ok(self)
    }

    pub async fn right_click(&self) -> Result<&Self> {
        for element in self.pointer_targets("right click").await? {
            self.ready_for_input(&element).await?;
            self.backend.right_click(&element).await.normalized()?;
        }
        Ok(self)
    }

    pub async fn hover(&self) -> Result<&Self> {
        for element in self.pointer_targets("hover").await? {
            self.ready_for_input(&element).await?;
            self.backend.hover(&element).await.normalized()?;
        }
        Ok(self)
    }

    /// Drags every element onto the first element of `target`.
    pub async fn drag_to(&self, target: &SearchContext<B>) -> Result<&Self> {
        let elements = self.pointer_targets("drag and drop").await?;
        if elements.is_empty() {
            return Ok(self);
        }
        let drop_on = target.first_handle().await?;
        for element in elements {
            self.ready_for_input(&element).await?;
            self.backend
                .drag_and_drop(&element, &drop_on)
                .await
                .normalized()?;
        }
        Ok(self)
    }

    pub async fn submit(&self) -> Result<&Self> {
        for element in self.scope().await? {
            self.backend.submit(&element).await.normalized()?;
        }
        Ok(self)
    }

    /// Makes the frame element held by this context the backend's active frame.
    pub async fn goto_frame(&self) -> Result<&Self> {
        if !self.backend.capabilities().frames {
            return Err(PincerError::unsupported("frames"));
        }
        let frame = self.first_handle().await?;
        debug!(frame = %self.describe(), "switching to frame");
        self.backend.switch_to_frame(&frame).await.normalized()?;
        Ok(self)
    }

    pub async fn wait(&self, condition: Condition) -> Result<Self> {
        self.wait_with(condition, WaitOptions::default()).await
    }

    /// Polls `condition` until it holds and returns the context as it was
    /// resolved by the successful evaluation.
    pub async fn wait_with(&self, condition: Condition, options: WaitOptions) -> Result<Self> {
        let (timeout, interval) = options.resolve(&self.config);
        let condition = &condition;
        wait::poll(condition.name(), timeout, interval, move || condition.evaluate(self)).await
    }

    /// Polls a caller-supplied predicate over the freshly resolved context.
    pub async fn wait_until<F, Fut>(&self, name: &str, options: WaitOptions, predicate: F) -> Result<Self>
    where
        F: Fn(SearchContext<B>) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let (timeout, interval) = options.resolve(&self.config);
        let predicate = &predicate;
        wait::poll(name, timeout, interval, move || async move {
            let Some((current, _)) = wait::refreshed(self).await? else {
                return Ok(None);
            };
            Ok(predicate(current.clone()).await?.then_some(current))
        })
        .await
    }

    async fn pointer_targets(&self, action: &str) -> Result<Vec<B::Element>> {
        let elements = self.scope().await?;
        if !elements.is_empty() && !self.backend.capabilities().pointer_input {
            return Err(PincerError::unsupported(action));
        }
        Ok(elements)
    }

    /// Blocks until `element` is actionable on backends that can tell.
    async fn ready_for_input(&self, element: &B::Element) -> Result<()> {
        if self.config.advanced_mode || !self.backend.supports_scripting() {
            return Ok(());
        }
        let backend = &self.backend;
        wait::poll(
            "actionable",
            self.config.wait_timeout(),
            self.config.wait_interval(),
            move || async move { Ok(backend.is_actionable(element).await.normalized()?.then_some(())) },
        )
        .await
    }
}
