use crate::errors::{PincerError, Result};
use std::str::FromStr;
use url::Url;

/// Where [`RootContext::goto`](crate::core::RootContext::goto) should take the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Frame(FrameTarget),
    Window(WindowSelector),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameTarget {
    Top,
    Parent,
    /// First element matching the selector.
    Selector(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSelector {
    Current,
    Next,
    Previous,
    First,
    Last,
    Index(usize),
}

/// Structured navigation request. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GotoOptions {
    pub url: Option<String>,
    pub frame: Option<FrameTarget>,
    pub window: Option<WindowSelector>,
}

impl GotoOptions {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn frame(frame: FrameTarget) -> Self {
        Self {
            frame: Some(frame),
            ..Self::default()
        }
    }
}

impl TryFrom<GotoOptions> for Target {
    type Error = PincerError;

    fn try_from(options: GotoOptions) -> Result<Self> {
        match (options.url, options.frame, options.window) {
            (Some(url), None, None) => Ok(Target::Url(url)),
            (None, Some(frame), None) => Ok(Target::Frame(frame)),
            (None, None, Some(window)) => Ok(Target::Window(window)),
            (None, None, None) => Err(PincerError::InvalidTarget(
                "goto needs a url, frame or window target".to_string(),
            )),
            _ => Err(PincerError::InvalidTarget(
                "goto accepts exactly one of url, frame or window".to_string(),
            )),
        }
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Target::Url(url.to_string())
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Target::Url(url)
    }
}

impl From<FrameTarget> for Target {
    fn from(frame: FrameTarget) -> Self {
        Target::Frame(frame)
    }
}

impl From<WindowSelector> for Target {
    fn from(window: WindowSelector) -> Self {
        Target::Window(window)
    }
}

impl FromStr for FrameTarget {
    type Err = PincerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            ":top" => Ok(FrameTarget::Top),
            ":parent" => Ok(FrameTarget::Parent),
            "" => Err(PincerError::InvalidTarget("empty frame selector".to_string())),
            other if other.starts_with(':') => {
                Err(PincerError::InvalidTarget(format!("invalid frame option '{other}'")))
            }
            selector => Ok(FrameTarget::Selector(selector.to_string())),
        }
    }
}

impl FromStr for WindowSelector {
    type Err = PincerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim_start_matches(':') {
            "self" | "current" => Ok(WindowSelector::Current),
            "next" => Ok(WindowSelector::Next),
            "previous" => Ok(WindowSelector::Previous),
            "first" => Ok(WindowSelector::First),
            "last" => Ok(WindowSelector::Last),
            other => other
                .parse::<usize>()
                .map(WindowSelector::Index)
                .map_err(|_| PincerError::InvalidTarget(format!("invalid window option '{value}'"))),
        }
    }
}

fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return raw.starts_with("about:") || raw.starts_with("data:");
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_relative_reference(raw: &str) -> bool {
    raw.starts_with('/') || raw.starts_with('.') || raw.starts_with('?') || raw.starts_with('#')
}

/// Turns a caller-supplied navigation URL into the absolute URL to load.
///
/// Absolute URLs pass through. Paths, queries and fragments are joined onto
/// `current`; with no usable current document they are rejected. Anything
/// else is taken as a host and gets `http://`.
pub fn resolve_target_url(raw: &str, current: Option<&str>) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PincerError::InvalidTarget("empty url".to_string()));
    }

    let invalid = |e: url::ParseError| PincerError::InvalidTarget(format!("invalid url '{raw}': {e}"));

    if has_scheme(raw) {
        return Url::parse(raw).map(String::from).map_err(invalid);
    }

    if is_relative_reference(raw) {
        let base = current
            .and_then(|url| Url::parse(url).ok())
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                PincerError::InvalidTarget(format!(
                    "absolute url required for '{raw}': no document is loaded"
                ))
            })?;
        return base.join(raw).map(String::from).map_err(invalid);
    }

    Url::parse(&format!("http://{raw}")).map(String::from).map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_http() {
        assert_eq!(
            resolve_target_url("example.com/x", None).unwrap(),
            "http://example.com/x"
        );
        assert_eq!(
            resolve_target_url("localhost:8080/a", Some("https://other.org/")).unwrap(),
            "http://localhost:8080/a"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            resolve_target_url("https://example.com/a?b=1", None).unwrap(),
            "https://example.com/a?b=1"
        );
        assert_eq!(resolve_target_url("about:blank", None).unwrap(), "about:blank");
    }

    #[test]
    fn relative_urls_join_current_document() {
        assert_eq!(
            resolve_target_url("/x", Some("http://host/a/b")).unwrap(),
            "http://host/x"
        );
        assert_eq!(
            resolve_target_url("./c", Some("http://host/a/b")).unwrap(),
            "http://host/a/c"
        );
        assert_eq!(
            resolve_target_url("?page=2", Some("http://host/a/b")).unwrap(),
            "http://host/a/b?page=2"
        );
    }

    #[test]
    fn relative_urls_need_a_document() {
        assert!(matches!(
            resolve_target_url("/x", None),
            Err(PincerError::InvalidTarget(_))
        ));
        assert!(matches!(
            resolve_target_url("/x", Some("about:blank")),
            Err(PincerError::InvalidTarget(_))
        ));
    }

    #[test]
    fn goto_options_need_exactly_one_target() {
        assert_eq!(
            Target::try_from(GotoOptions::url("a.com")).unwrap(),
            Target::Url("a.com".to_string())
        );
        let both = GotoOptions {
            url: Some("a.com".to_string()),
            frame: Some(FrameTarget::Top),
            window: None,
        };
        assert!(matches!(Target::try_from(both), Err(PincerError::InvalidTarget(_))));
        assert!(matches!(
            Target::try_from(GotoOptions::default()),
            Err(PincerError::InvalidTarget(_))
        ));
    }

    #[test]
    fn frame_and_window_options_parse() {
        assert_eq!(":top".parse::<FrameTarget>().unwrap(), FrameTarget::Top);
        assert_eq!(
            "iframe#main".parse::<FrameTarget>().unwrap(),
            FrameTarget::Selector("iframe#main".to_string())
        );
        assert!(":sideways".parse::<FrameTarget>().is_err());
        assert_eq!(":next".parse::<WindowSelector>().unwrap(), WindowSelector::Next);
        assert_eq!("2".parse::<WindowSelector>().unwrap(), WindowSelector::Index(2));
        assert!(":elsewhere".parse::<WindowSelector>().is_err());
    }
}
