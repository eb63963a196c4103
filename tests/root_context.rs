use browser_pincer::testing::{ScriptedBackend, ScriptedNode};
use browser_pincer::{
    BackendCapabilities, Config, Cookie, FrameTarget, GotoOptions, PincerError, RootContext,
    Target, WindowHandle, WindowSelector,
};

async fn open(backend: ScriptedBackend) -> RootContext<ScriptedBackend> {
    RootContext::new(backend, Config::default()).await.unwrap()
}

#[tokio::test]
async fn bare_hosts_get_http_scheme() {
    let root = open(ScriptedBackend::new()).await;
    root.goto("example.com/x").await.unwrap();
    assert_eq!(root.backend().navigations(), vec!["http://example.com/x"]);
    assert_eq!(root.url().await.unwrap().as_deref(), Some("http://example.com/x"));
}

#[tokio::test]
async fn relative_urls_resolve_against_current_document() {
    let root = open(ScriptedBackend::new().with_page("http://host/a/b", vec![])).await;
    root.goto("/x").await.unwrap();
    root.goto("y?z=1").await.unwrap();
    assert_eq!(
        root.backend().navigations(),
        vec!["http://host/x", "http://y/?z=1"]
    );
    assert_eq!(root.resolve_url("./c").await.unwrap(), "http://host/c");
}

#[tokio::test]
async fn relative_urls_without_a_document_are_rejected() {
    let root = open(ScriptedBackend::new()).await;
    assert!(matches!(root.goto("/x").await, Err(PincerError::InvalidTarget(_))));
    assert!(root.backend().navigations().is_empty());
}

#[tokio::test]
async fn goto_options_need_exactly_one_target() {
    let root = open(ScriptedBackend::new()).await;
    let both = GotoOptions {
        url: Some("example.com".to_string()),
        frame: Some(FrameTarget::Top),
        window: None,
    };
    assert!(matches!(Target::try_from(both), Err(PincerError::InvalidTarget(_))));

    let target = Target::try_from(GotoOptions::url("example.com")).unwrap();
    root.goto(target).await.unwrap();
    assert_eq!(root.backend().navigations(), vec!["http://example.com/"]);
}

#[tokio::test]
async fn history_navigation() {
    let backend = ScriptedBackend::new()
        .with_route("http://site.test/one", "One", vec![])
        .with_route("http://site.test/two", "Two", vec![]);
    let root = open(backend).await;
    root.goto("http://site.test/one").await.unwrap();
    root.goto("/two").await.unwrap();
    assert_eq!(root.title().await.unwrap(), "Two");

    root.back(1).await.unwrap();
    assert_eq!(root.title().await.unwrap(), "One");
    root.forward(1).await.unwrap();
    assert_eq!(root.title().await.unwrap(), "Two");
    assert!(matches!(root.forward(1).await, Err(PincerError::InvalidTarget(_))));

    root.refresh().await.unwrap();
    assert_eq!(root.url().await.unwrap().as_deref(), Some("http://site.test/two"));
}

#[tokio::test]
async fn refresh_invalidates_held_elements() {
    let backend = ScriptedBackend::new()
        .with_page("http://site.test/", vec![ScriptedNode::new("p").text("hello")]);
    let root = open(backend).await;
    let paragraph = root.search("p").await.unwrap();

    root.refresh().await.unwrap();
    assert!(matches!(paragraph.text().await, Err(PincerError::StaleElement(_))));
    assert_eq!(
        paragraph.reload().await.unwrap().unwrap().text().await.unwrap(),
        "hello"
    );
}

#[tokio::test]
async fn close_is_idempotent() {
    let root = open(ScriptedBackend::new()).await;
    assert!(!root.is_closed());
    assert_eq!(root.len(), 1);
    root.close().await.unwrap();
    root.close().await.unwrap();
    assert!(root.is_closed());
    assert!(root.is_empty());
    assert!(root.first().is_empty());
    assert_eq!(root.backend().close_calls(), 1);
}

#[tokio::test]
async fn windows_move_without_wrapping() {
    let root = open(ScriptedBackend::new().with_windows(3, 1)).await;
    assert_eq!(root.windows().await.unwrap().len(), 3);

    let next = root.window(WindowSelector::Next).await.unwrap();
    assert_eq!(next, WindowHandle::new("window-2"));
    assert_eq!(root.backend().current_window_index(), 2);

    assert!(matches!(
        root.goto(WindowSelector::Next).await,
        Err(PincerError::InvalidTarget(_))
    ));
    assert_eq!(root.backend().current_window_index(), 2);

    root.goto(WindowSelector::First).await.unwrap();
    assert_eq!(root.backend().current_window_index(), 0);
    assert!(matches!(
        root.window(WindowSelector::Previous).await,
        Err(PincerError::InvalidTarget(_))
    ));
    assert!(matches!(
        root.window(WindowSelector::Index(9)).await,
        Err(PincerError::InvalidTarget(_))
    ));
    assert_eq!(
        root.window(WindowSelector::Last).await.unwrap(),
        WindowHandle::new("window-2")
    );
}

#[tokio::test]
async fn frames_switch_and_return() {
    let backend = ScriptedBackend::new().with_page(
        "http://site.test/",
        vec![
            ScriptedNode::new("iframe").id("outer"),
            ScriptedNode::new("div").id("plain"),
        ],
    );
    let root = open(backend).await;

    root.goto(FrameTarget::Selector("#outer".to_string()))
        .await
        .unwrap();
    assert_eq!(root.backend().frame_depth(), 1);
    root.goto(":parent".parse::<FrameTarget>().unwrap()).await.unwrap();
    assert_eq!(root.backend().frame_depth(), 0);

    root.search("#outer").await.unwrap().goto_frame().await.unwrap();
    root.goto(FrameTarget::Top).await.unwrap();
    assert_eq!(root.backend().frame_depth(), 0);

    assert!(matches!(
        root.goto(FrameTarget::Selector("#plain".to_string())).await,
        Err(PincerError::InvalidTarget(_))
    ));
    assert!(matches!(
        root.goto(FrameTarget::Selector("#nothing".to_string())).await,
        Err(PincerError::NoSuchElement(_))
    ));
}

#[tokio::test]
async fn frames_need_the_capability() {
    let backend =
        ScriptedBackend::new().with_capabilities(BackendCapabilities::static_fetch());
    let root = open(backend).await;
    assert!(matches!(
        root.goto(FrameTarget::Top).await,
        Err(PincerError::UnsupportedCapability(_))
    ));
}

#[tokio::test]
async fn cookie_jar_is_built_once_and_reads_live_cookies() {
    let backend = ScriptedBackend::new().with_cookies(vec![
        Cookie::new("sid", "abc", ".site.test"),
        Cookie::new("theme", "dark", "other.test"),
    ]);
    let root = open(backend).await;

    assert!(std::ptr::eq(root.cookies(), root.cookies()));
    assert_eq!(root.cookies().all().await.unwrap().len(), 2);
    assert_eq!(
        root.cookies().get("sid").await.unwrap().map(|c| c.value),
        Some("abc".to_string())
    );
    assert_eq!(root.cookies().for_domain("www.site.test").await.unwrap().len(), 1);
}

#[tokio::test]
async fn http_client_carries_session_identity() {
    let backend = ScriptedBackend::new().with_cookies(vec![Cookie::new("sid", "abc", "site.test")]);
    let root = open(backend).await;
    let client = root.http_client().await.unwrap();
    assert_eq!(client.cookies().len(), 1);

    let url = url::Url::parse("http://site.test/download").unwrap();
    assert_eq!(client.cookie_header(&url).as_deref(), Some("sid=abc"));
}

#[tokio::test]
async fn http_client_needs_the_capability() {
    let mut capabilities = BackendCapabilities::interactive();
    capabilities.http_client = false;
    let root = open(ScriptedBackend::new().with_capabilities(capabilities)).await;
    assert!(matches!(
        root.http_client().await,
        Err(PincerError::UnsupportedCapability(_))
    ));
}
