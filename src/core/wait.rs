//! Fixed-interval polling of conditions over a [`SearchContext`].
//!
//! The poll loop is the only retry loop in the crate. Falsity of the
//! condition is retried; any error raised while evaluating it aborts the
//! wait immediately.

use crate::core::backend::Backend;
use crate::core::config::Config;
use crate::core::context::SearchContext;
use crate::errors::{Normalize, PincerError, Result};
use regex::Regex;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Option<Duration>,
    pub interval: Option<Duration>,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub(crate) fn resolve(&self, config: &Config) -> (Duration, Duration) {
        (
            self.timeout.unwrap_or_else(|| config.wait_timeout()),
            self.interval.unwrap_or_else(|| config.wait_interval()),
        )
    }
}

/// Evaluates `check` until it yields a value or `timeout` elapses.
///
/// The first evaluation happens before any sleep. Elapsed time is measured on
/// the monotonic clock.
pub async fn poll<T, F, Fut>(condition: &str, timeout: Duration, interval: Duration, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    debug!(condition, ?timeout, ?interval, "waiting for condition");

    loop {
        attempts += 1;
        if let Some(value) = check().await? {
            debug!(condition, attempts, elapsed = ?started.elapsed(), "condition met");
            return Ok(value);
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            warn!(condition, attempts, ?elapsed, "condition timed out");
            return Err(PincerError::ConditionTimeout {
                condition: condition.to_string(),
                elapsed,
            });
        }

        trace!(condition, attempts, "condition not met yet");
        sleep(interval).await;
    }
}

#[derive(Debug, Clone)]
pub enum TextMatch {
    Exact(String),
    Contains(String),
    Pattern(Regex),
}

impl TextMatch {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextMatch::Exact(expected) => text.trim() == expected.trim(),
            TextMatch::Contains(fragment) => text.contains(fragment.as_str()),
            TextMatch::Pattern(pattern) => pattern.is_match(text),
        }
    }
}

/// Named predicates understood by [`SearchContext::wait`].
#[derive(Debug, Clone)]
pub enum Condition {
    /// At least one element matches and every matched element is live.
    Present,
    /// Every matched element is visible. Same check as `Actionable`.
    Visible,
    Actionable,
    /// Nothing matches any more, or every held element was detached.
    Gone,
    /// The first matched element's text satisfies the matcher.
    Text(TextMatch),
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Present => "present",
            Condition::Visible => "visible",
            Condition::Actionable => "actionable",
            Condition::Gone => "gone",
            Condition::Text(_) => "text",
        }
    }

    pub fn text(expected: impl Into<String>) -> Self {
        Condition::Text(TextMatch::Exact(expected.into()))
    }

    pub fn text_containing(fragment: impl Into<String>) -> Self {
        Condition::Text(TextMatch::Contains(fragment.into()))
    }

    pub fn text_matching(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(|regex| Condition::Text(TextMatch::Pattern(regex)))
            .map_err(|e| PincerError::InvalidTarget(format!("invalid text pattern: {e}")))
    }

    pub(crate) async fn evaluate<B: Backend>(
        &self,
        ctx: &SearchContext<B>,
    ) -> Result<Option<SearchContext<B>>> {
        let refreshed = refreshed(ctx).await?;

        match self {
            Condition::Present => Ok(refreshed.and_then(|(current, reloaded)| {
                let all_live = reloaded || current.len() == ctx.len();
                (!current.is_empty() && all_live).then_some(current)
            })),
            Condition::Visible | Condition::Actionable => {
                let Some((current, _)) = refreshed else {
                    return Ok(None);
                };
                if current.is_empty() {
                    return Ok(None);
                }
                for element in &current.handles() {
                    match current.backend().is_actionable(element).await.normalized() {
                        Ok(true) => {}
                        Ok(false) => return Ok(None),
                        Err(e) if e.is_stale() => return Ok(None),
                        Err(e) => return Err(e),
                    }
                }
                Ok(Some(current))
            }
            Condition::Gone => match refreshed {
                Some((current, _)) => Ok(current.is_empty().then_some(current)),
                None => Ok(Some(ctx.clone())),
            },
            Condition::Text(matcher) => {
                let Some((current, _)) = refreshed else {
                    return Ok(None);
                };
                if current.is_empty() {
                    return Ok(None);
                }
                match current.text().await {
                    Ok(text) if matcher.matches(&text) => Ok(Some(current)),
                    Ok(_) => Ok(None),
                    Err(e) if e.is_stale() => Ok(None),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

impl FromStr for Condition {
    type Err = PincerError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim_start_matches(':') {
            "present" => Ok(Condition::Present),
            "visible" => Ok(Condition::Visible),
            "actionable" => Ok(Condition::Actionable),
            "gone" => Ok(Condition::Gone),
            "text" => Err(PincerError::InvalidTarget(
                "the text condition needs an expected value".to_string(),
            )),
            other => Err(PincerError::InvalidTarget(format!("unknown wait condition '{other}'"))),
        }
    }
}

/// Current view of `ctx`: re-resolved when its query chain allows it,
/// otherwise narrowed to the handles that are still attached. The flag tells
/// which path was taken. `None` means the view went stale while resolving.
pub(crate) async fn refreshed<B: Backend>(
    ctx: &SearchContext<B>,
) -> Result<Option<(SearchContext<B>, bool)>> {
    let attempt = match ctx.reload().await {
        Ok(Some(current)) => Ok((current, true)),
        Ok(None) => ctx.retain_attached().await.map(|current| (current, false)),
        Err(e) => Err(e),
    };
    match attempt {
        Ok(view) => Ok(Some(view)),
        Err(e) if e.is_stale() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn satisfied_condition_returns_without_sleeping() {
        let started = Instant::now();
        let value = poll("ready", Duration::from_secs(5), Duration::from_secs(1), || async {
            Ok(Some(7))
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_name_and_elapsed() {
        let attempts = Cell::new(0);
        let err = poll::<(), _, _>(
            "never",
            Duration::from_millis(500),
            Duration::from_millis(100),
            || {
                attempts.set(attempts.get() + 1);
                async { Ok(None) }
            },
        )
        .await
        .unwrap_err();

        match err {
            PincerError::ConditionTimeout { condition, elapsed } => {
                assert_eq!(condition, "never");
                assert!(elapsed >= Duration::from_millis(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(attempts.get(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_errors_are_not_retried() {
        let attempts = Cell::new(0);
        let err = poll::<(), _, _>("broken", Duration::from_secs(5), Duration::from_millis(10), || {
            attempts.set(attempts.get() + 1);
            async { Err(PincerError::InvalidTarget("boom".to_string())) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PincerError::InvalidTarget(_)));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn condition_names_parse_with_or_without_colon() {
        assert!(matches!(":present".parse::<Condition>(), Ok(Condition::Present)));
        assert!(matches!("gone".parse::<Condition>(), Ok(Condition::Gone)));
        assert!(matches!("shiny".parse::<Condition>(), Err(PincerError::InvalidTarget(_))));
    }

    #[test]
    fn text_matchers() {
        assert!(TextMatch::Exact("Done".into()).matches("  Done\n"));
        assert!(TextMatch::Contains("on".into()).matches("Done"));
        assert!(Condition::text_matching("^\\d+ items$").is_ok());
        assert!(Condition::text_matching("(").is_err());
    }
}
