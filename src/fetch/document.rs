//! A fetched HTML page plus the edits made to it since it was loaded.
//!
//! The page is parsed once when it is loaded and the tree is never mutated,
//! so node ids stay valid for the lifetime of the page. Edits live in an
//! overlay keyed by node id and are applied when the page is read back.
//! Selectors match against the document as fetched.

use super::FetchError;
use ego_tree::NodeId;
use reqwest::Method;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{BTreeMap, HashMap};
use url::Url;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, Default)]
struct NodeEdit {
    /// `None` removes the attribute.
    attributes: BTreeMap<String, Option<String>>,
    /// Replaces every child of the node.
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StaticPage {
    url: Url,
    html: Html,
    generation: u64,
    edits: HashMap<NodeId, NodeEdit>,
}

/// What submitting a form would send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub method: Method,
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

impl StaticPage {
    pub fn new(url: Url, source: String, generation: u64) -> Self {
        Self {
            url,
            html: Html::parse_document(&source),
            generation,
            edits: HashMap::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The same page as a fresh document: new generation, no edits.
    pub fn reloaded(&self, generation: u64) -> Self {
        Self {
            url: self.url.clone(),
            html: self.html.clone(),
            generation,
            edits: HashMap::new(),
        }
    }

    fn element<'a>(&self, html: &'a Html, target: Option<NodeId>) -> Result<ElementRef<'a>, FetchError> {
        match target {
            None => Ok(html.root_element()),
            Some(id) => html
                .tree
                .get(id)
                .and_then(ElementRef::wrap)
                .ok_or_else(|| FetchError::Stale(format!("node {id:?} is not an element of this page"))),
        }
    }

    /// Whether `id` is a node of this page that has not been replaced by a
    /// text edit on one of its ancestors.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let html = &self.html;
        html.tree.get(id).is_some_and(|node| {
            !node
                .ancestors()
                .any(|ancestor| self.text_edit(ancestor.id()).is_some())
        })
    }

    fn text_edit(&self, id: NodeId) -> Option<&str> {
        self.edits.get(&id).and_then(|edit| edit.text.as_deref())
    }

    pub fn search(
        &self,
        scope: Option<NodeId>,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<NodeId>, FetchError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| FetchError::InvalidSelector(format!("'{selector}': {e:?}")))?;
        let html = &self.html;
        let candidates: Box<dyn Iterator<Item = ElementRef<'_>> + '_> = match scope {
            None => Box::new(html.select(&parsed)),
            Some(id) => {
                let scope = self.element(html, Some(id))?;
                Box::new(scope.select(&parsed).filter(move |found| found.id() != id))
            }
        };
        let found = candidates
            .filter(|found| {
                !found
                    .ancestors()
                    .any(|ancestor| self.text_edit(ancestor.id()).is_some())
            })
            .map(|found| found.id());
        Ok(match limit {
            Some(limit) => found.take(limit).collect(),
            None => found.collect(),
        })
    }

    pub fn title(&self) -> String {
        let Ok(selector) = Selector::parse("title") else {
            return String::new();
        };
        let html = &self.html;
        let title = html.select(&selector).next().map(|title| self.text_of(*title));
        title.map(|title| title.trim().to_string()).unwrap_or_default()
    }

    pub fn tag(&self, target: Option<NodeId>) -> Result<String, FetchError> {
        let html = &self.html;
        Ok(self.element(html, target)?.value().name().to_string())
    }

    pub fn text(&self, target: Option<NodeId>) -> Result<String, FetchError> {
        let html = &self.html;
        let element = self.element(html, target)?;
        Ok(self.text_of(*element))
    }

    pub fn html(&self, target: Option<NodeId>) -> Result<String, FetchError> {
        let html = &self.html;
        if self.edits.is_empty() {
            return match target {
                None => Ok(html.html()),
                Some(_) => Ok(self.element(html, target)?.html()),
            };
        }
        let mut out = String::new();
        match target {
            None => self.render(html.tree.root(), &mut out),
            Some(_) => self.render(*self.element(html, target)?, &mut out),
        }
        Ok(out)
    }

    pub fn attribute(&self, target: Option<NodeId>, name: &str) -> Result<Option<String>, FetchError> {
        let html = &self.html;
        let element = self.element(html, target)?;
        if let Some(edited) = self
            .edits
            .get(&element.id())
            .and_then(|edit| edit.attributes.get(name))
        {
            return Ok(edited.clone());
        }
        Ok(element.value().attr(name).map(str::to_string))
    }

    pub fn set_attribute(
        &mut self,
        target: Option<NodeId>,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), FetchError> {
        let id = self.element(&self.html, target)?.id();
        self.edits
            .entry(id)
            .or_default()
            .attributes
            .insert(name.to_string(), value.map(str::to_string));
        Ok(())
    }

    /// Replaces the text of the element. Inputs keep their text in `value`.
    pub fn set_text(&mut self, target: Option<NodeId>, value: &str) -> Result<(), FetchError> {
        let (id, is_input) = {
            let html = &self.html;
            let element = self.element(html, target)?;
            (element.id(), element.value().name() == "input")
        };
        let edit = self.edits.entry(id).or_default();
        if is_input {
            edit.attributes.insert("value".to_string(), Some(value.to_string()));
        } else {
            edit.text = Some(value.to_string());
        }
        Ok(())
    }

    /// Fields and target of the form that `target` is, or belongs to.
    pub fn form_submission(&self, target: Option<NodeId>) -> Result<FormSubmission, FetchError> {
        let html = &self.html;
        let element = self.element(html, target)?;
        let form = std::iter::once(*element)
            .chain(element.ancestors())
            .filter_map(ElementRef::wrap)
            .find(|candidate| candidate.value().name() == "form")
            .ok_or_else(|| FetchError::InvalidTarget("element is not inside a form".to_string()))?;

        let form_attr = |name: &str| self.effective_attr(form, name);
        let action = match form_attr("action").filter(|action| !action.trim().is_empty()) {
            Some(action) => self
                .url
                .join(action.trim())
                .map_err(|e| FetchError::InvalidTarget(format!("invalid form action '{action}': {e}")))?,
            None => self.url.clone(),
        };
        let method = match form_attr("method") {
            Some(method) if method.eq_ignore_ascii_case("post") => Method::POST,
            _ => Method::GET,
        };

        let mut fields = Vec::new();
        for field in form.descendants().filter_map(ElementRef::wrap) {
            let Some(name) = self.effective_attr(field, "name") else {
                continue;
            };
            if self.effective_attr(field, "disabled").is_some() {
                continue;
            }
            let value = match field.value().name() {
                "input" => {
                    let kind = self
                        .effective_attr(field, "type")
                        .unwrap_or_else(|| "text".to_string())
                        .to_ascii_lowercase();
                    match kind.as_str() {
                        "submit" | "button" | "image" | "reset" | "file" => continue,
                        "checkbox" | "radio" => {
                            if self.effective_attr(field, "checked").is_none() {
                                continue;
                            }
                            self.effective_attr(field, "value").unwrap_or_else(|| "on".to_string())
                        }
                        _ => self.effective_attr(field, "value").unwrap_or_default(),
                    }
                }
                "textarea" => self.text_of(*field),
                "select" => {
                    let options: Vec<ElementRef<'_>> = field
                        .descendants()
                        .filter_map(ElementRef::wrap)
                        .filter(|option| option.value().name() == "option")
                        .collect();
                    let Some(chosen) = options
                        .iter()
                        .find(|option| self.effective_attr(**option, "selected").is_some())
                        .or_else(|| options.first())
                    else {
                        continue;
                    };
                    self.effective_attr(*chosen, "value")
                        .unwrap_or_else(|| self.text_of(**chosen).trim().to_string())
                }
                _ => continue,
            };
            fields.push((name, value));
        }

        Ok(FormSubmission {
            method,
            action,
            fields,
        })
    }

    fn effective_attr(&self, element: ElementRef<'_>, name: &str) -> Option<String> {
        match self
            .edits
            .get(&element.id())
            .and_then(|edit| edit.attributes.get(name))
        {
            Some(edited) => edited.clone(),
            None => element.value().attr(name).map(str::to_string),
        }
    }

    fn text_of(&self, node: ego_tree::NodeRef<'_, Node>) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
        if let Some(text) = self.text_edit(node.id()) {
            out.push_str(text);
            return;
        }
        for child in node.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(_) => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    fn render(&self, node: ego_tree::NodeRef<'_, Node>, out: &mut String) {
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.render(child, out);
                }
            }
            Node::Doctype(doctype) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype.name());
                out.push('>');
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Text(text) => {
                let raw = node
                    .parent()
                    .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                    .is_some_and(|name| matches!(name, "script" | "style"));
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            Node::Element(element) => {
                let name = element.name();
                out.push('<');
                out.push_str(name);

                let mut attributes: Vec<(String, String)> = element
                    .attrs()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect();
                if let Some(edit) = self.edits.get(&node.id()) {
                    for (key, value) in &edit.attributes {
                        let existing = attributes.iter().position(|(k, _)| k == key);
                        match (existing, value) {
                            (Some(index), Some(value)) => attributes[index].1 = value.clone(),
                            (None, Some(value)) => attributes.push((key.clone(), value.clone())),
                            (Some(index), None) => {
                                attributes.remove(index);
                            }
                            (None, None) => {}
                        }
                    }
                }
                for (key, value) in &attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    return;
                }
                match self.text_edit(node.id()) {
                    Some(text) => escape_into(text, false, out),
                    None => {
                        for child in node.children() {
                            self.render(child, out);
                        }
                    }
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            _ => {}
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}
