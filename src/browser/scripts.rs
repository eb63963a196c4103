//! In-page JavaScript used by the Chrome backend.
//!
//! Every operation is a single `evaluate` call. Nodes handed to Rust are
//! kept in a registry on the top-level window and referred to by
//! `{ t: token, i: index }`. A new document gets a new registry with a new
//! token, so handles from a previous document are detected as stale.
//! Results come back as a JSON envelope string.

use super::ChromeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registry reference to a node in the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(rename = "t")]
    pub token: String,
    #[serde(rename = "i")]
    pub index: u64,
}

const PRELUDE: &str = r#"
const P = window.__pincer || (window.__pincer = { token: TOKEN, nodes: [], ids: new Map() });
const fail = (kind, message) => { throw { pincer: true, kind, message }; };
const reg = (n) => {
  let i = P.ids.get(n);
  if (i === undefined) { i = P.nodes.length; P.nodes.push(n); P.ids.set(n, i); }
  return { t: P.token, i };
};
const live = (h) => {
  if (h.t !== P.token) fail('stale', 'element belongs to a previous document');
  const n = P.nodes[h.i];
  if (!n || !n.isConnected) fail('stale', 'element is no longer attached to the document');
  return n;
};
const doc = () => {
  if (FRAMES.length === 0) return document;
  const frame = live(FRAMES[FRAMES.length - 1]);
  if (!frame.contentDocument) fail('frame', 'frame content is not accessible');
  return frame.contentDocument;
};
const node = (h) => (h === null ? doc() : live(h));
const el = (h) => { const n = node(h); return n.nodeType === 9 ? n.documentElement : n; };
const view = (e) => e.ownerDocument.defaultView;
const mouse = (e, type, init) => e.dispatchEvent(new MouseEvent(type, Object.assign(
  { bubbles: true, cancelable: true, composed: true, view: view(e) }, init)));
const PROPS = ['selected', 'disabled', 'checked', 'value', 'required'];
"#;

const EPILOGUE: &str = r#"
try {
  const value = run(ARGS);
  return JSON.stringify({ ok: true, value: value === undefined ? null : value });
} catch (e) {
  if (e && e.pincer) return JSON.stringify({ ok: false, kind: e.kind, message: e.message });
  const kind = e && e.name === 'SyntaxError' ? 'selector' : 'script';
  return JSON.stringify({ ok: false, kind, message: String((e && e.message) || e) });
}
"#;

pub const SEARCH_CSS: &str = r#"(a) => {
  const found = Array.from(node(a.scope).querySelectorAll(a.selector));
  return (a.limit === null ? found : found.slice(0, a.limit)).map(reg);
}"#;

pub const SEARCH_XPATH: &str = r#"(a) => {
  const scope = node(a.scope);
  const owner = scope.nodeType === 9 ? scope : scope.ownerDocument;
  const snapshot = owner.evaluate(a.selector, scope, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  const out = [];
  for (let k = 0; k < snapshot.snapshotLength && (a.limit === null || out.length < a.limit); k++) {
    const n = snapshot.snapshotItem(k);
    if (n.nodeType === 1) out.push(reg(n));
  }
  return out;
}"#;

pub const TAG: &str = "(a) => el(a.el).tagName.toLowerCase()";

pub const TEXT: &str = r#"(a) => {
  const e = el(a.el);
  return typeof e.innerText === 'string' ? e.innerText : (e.textContent || '');
}"#;

pub const HTML: &str = "(a) => el(a.el).outerHTML";

pub const ATTRIBUTE: &str = r#"(a) => {
  const e = el(a.el);
  if (PROPS.includes(a.name)) {
    const v = e[a.name];
    return v === undefined || v === null || v === false ? null : String(v);
  }
  return e.getAttribute(a.name);
}"#;

pub const SET_ATTRIBUTE: &str = r#"(a) => {
  const e = el(a.el);
  if (PROPS.includes(a.name)) {
    e[a.name] = a.name === 'value' ? (a.value === null ? '' : a.value) : (a.value !== null && a.value !== 'false');
  } else if (a.value === null) {
    e.removeAttribute(a.name);
  } else {
    e.setAttribute(a.name, a.value);
  }
}"#;

pub const SET_TEXT: &str = r#"(a) => {
  const e = el(a.el);
  if (typeof e.focus === 'function') e.focus();
  if ('value' in e) e.value = a.value; else e.textContent = a.value;
  e.dispatchEvent(new Event('input', { bubbles: true }));
  e.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub const ACTIONABLE: &str = r#"(a) => {
  const e = el(a.el);
  const style = view(e).getComputedStyle(e);
  if (style.display === 'none' || style.visibility === 'hidden' || style.visibility === 'collapse') return false;
  const rect = e.getBoundingClientRect();
  return rect.width > 0 && rect.height > 0;
}"#;

pub const ATTACHED: &str = r#"(a) => {
  if (a.el === null) return true;
  if (a.el.t !== P.token) return false;
  const n = P.nodes[a.el.i];
  return !!n && n.isConnected;
}"#;

pub const CLICK: &str = r#"(a) => {
  const e = el(a.el);
  e.scrollIntoView({ block: 'center', inline: 'center' });
  const m = a.modifiers;
  if (m.length === 0 && typeof e.click === 'function') { e.click(); return; }
  const keys = {
    shiftKey: m.includes('shift'), ctrlKey: m.includes('control'),
    altKey: m.includes('alt'), metaKey: m.includes('meta'),
  };
  mouse(e, 'mousedown', keys);
  mouse(e, 'mouseup', keys);
  mouse(e, 'click', keys);
}"#;

pub const DOUBLE_CLICK: &str = r#"(a) => {
  const e = el(a.el);
  e.scrollIntoView({ block: 'center', inline: 'center' });
  for (const detail of [1, 2]) {
    mouse(e, 'mousedown', { detail });
    mouse(e, 'mouseup', { detail });
    mouse(e, 'click', { detail });
  }
  mouse(e, 'dblclick', { detail: 2 });
}"#;

pub const RIGHT_CLICK: &str = r#"(a) => {
  const e = el(a.el);
  e.scrollIntoView({ block: 'center', inline: 'center' });
  mouse(e, 'mousedown', { button: 2, buttons: 2 });
  mouse(e, 'mouseup', { button: 2 });
  mouse(e, 'contextmenu', { button: 2 });
}"#;

pub const HOVER: &str = r#"(a) => {
  const e = el(a.el);
  e.scrollIntoView({ block: 'center', inline: 'center' });
  mouse(e, 'mouseover', {});
  mouse(e, 'mouseenter', { bubbles: false });
  mouse(e, 'mousemove', {});
}"#;

pub const DRAG_AND_DROP: &str = r#"(a) => {
  const src = el(a.el);
  const dst = el(a.target);
  const dataTransfer = new DataTransfer();
  const drag = (target, type) => target.dispatchEvent(new DragEvent(type,
    { bubbles: true, cancelable: true, composed: true, view: view(target), dataTransfer }));
  drag(src, 'dragstart');
  drag(dst, 'dragenter');
  drag(dst, 'dragover');
  drag(dst, 'drop');
  drag(src, 'dragend');
}"#;

pub const SUBMIT: &str = r#"(a) => {
  const e = el(a.el);
  const form = e.tagName === 'FORM' ? e : (e.form || e.closest('form'));
  if (!form) fail('form', 'element is not inside a form');
  if (typeof form.requestSubmit === 'function') form.requestSubmit(); else form.submit();
}"#;

pub const FRAME: &str = r#"(a) => {
  const e = el(a.el);
  if (e.tagName !== 'IFRAME' && e.tagName !== 'FRAME') fail('frame', 'element is not a frame');
  if (!e.contentDocument) fail('frame', 'frame content is not accessible');
  return reg(e);
}"#;

pub const HISTORY: &str = "(a) => { history.go(a.delta); }";

pub const USER_AGENT: &str = "() => navigator.userAgent";

/// Wraps `op` with the registry prelude and the result envelope.
pub fn build(op: &str, token: &str, frames: &[NodeRef], args: &Value) -> String {
    let header = format!(
        "const TOKEN = {};\nconst FRAMES = {};\nconst ARGS = {};\n",
        Value::String(token.to_string()),
        serde_json::to_string(frames).unwrap_or_else(|_| "[]".to_string()),
        args,
    );
    [
        "(() => {\n",
        &header,
        PRELUDE,
        "const run = ",
        op,
        ";\n",
        EPILOGUE,
        "})()",
    ]
    .concat()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Unwraps the envelope returned by a script built with [`build`].
pub fn parse_envelope(raw: Option<Value>) -> Result<Value, ChromeError> {
    let json = match raw {
        Some(Value::String(json)) => json,
        other => {
            return Err(ChromeError::MalformedResponse(format!(
                "expected a JSON string, got {other:?}"
            )))
        }
    };
    let envelope: Envelope = serde_json::from_str(&json)?;
    if envelope.ok {
        return Ok(envelope.value);
    }

    let message = envelope.message.unwrap_or_default();
    Err(match envelope.kind.as_deref() {
        Some("stale") => ChromeError::Stale(message),
        Some("selector") => ChromeError::InvalidSelector(message),
        Some("frame") => ChromeError::Frame(message),
        Some("form") => ChromeError::Form(message),
        _ => ChromeError::JavaScript(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_embeds_arguments_as_literals() {
        let frames = vec![NodeRef {
            token: "abc".to_string(),
            index: 3,
        }];
        let script = build(TAG, "tok-1", &frames, &json!({ "el": null }));
        assert!(script.starts_with("(() => {"));
        assert!(script.ends_with("})()"));
        assert!(script.contains(r#"const TOKEN = "tok-1";"#));
        assert!(script.contains(r#"const FRAMES = [{"t":"abc","i":3}];"#));
        assert!(script.contains(r#"const ARGS = {"el":null};"#));
        assert!(script.contains("const run = (a) => el(a.el).tagName.toLowerCase();"));
    }

    #[test]
    fn successful_envelope_yields_value() {
        let raw = Some(Value::String(r#"{"ok":true,"value":[{"t":"x","i":0}]}"#.to_string()));
        let value = parse_envelope(raw).unwrap();
        let refs: Vec<NodeRef> = serde_json::from_value(value).unwrap();
        assert_eq!(
            refs,
            vec![NodeRef {
                token: "x".to_string(),
                index: 0
            }]
        );
    }

    #[test]
    fn failure_kinds_are_preserved() {
        let stale = Some(Value::String(
            r#"{"ok":false,"kind":"stale","message":"gone"}"#.to_string(),
        ));
        assert!(matches!(parse_envelope(stale), Err(ChromeError::Stale(m)) if m == "gone"));

        let selector = Some(Value::String(
            r#"{"ok":false,"kind":"selector","message":"bad"}"#.to_string(),
        ));
        assert!(matches!(parse_envelope(selector), Err(ChromeError::InvalidSelector(_))));

        let other = Some(Value::String(
            r#"{"ok":false,"kind":"script","message":"x is undefined"}"#.to_string(),
        ));
        assert!(matches!(parse_envelope(other), Err(ChromeError::JavaScript(_))));
    }

    #[test]
    fn non_string_results_are_malformed() {
        assert!(matches!(parse_envelope(None), Err(ChromeError::MalformedResponse(_))));
        assert!(matches!(
            parse_envelope(Some(json!(42))),
            Err(ChromeError::MalformedResponse(_))
        ));
    }
}
