use browser_pincer::{Config, FetchBackend, FetchConfig, PincerError, RootContext};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

async fn serve(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn open() -> RootContext<FetchBackend> {
    let backend = FetchBackend::new(FetchConfig::default()).unwrap();
    RootContext::new(backend, Config::default()).await.unwrap()
}

#[tokio::test]
async fn first_navigation_fills_the_document_context() {
    let server = MockServer::start().await;
    serve(&server, "/hello", "<title>Greeting</title><p>hello</p>").await;

    let root = open().await;
    assert!(root.is_empty());

    root.goto(format!("{}/hello", server.uri())).await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root.each().len(), 1);
    assert_eq!(root.title().await.unwrap(), "Greeting");
    assert_eq!(
        root.first().search("p").await.unwrap().text().await.unwrap(),
        "hello"
    );

    root.close().await.unwrap();
    assert!(root.is_empty());
}

#[tokio::test]
async fn get_form_submits_edited_fields_as_query() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r#"<form action="/results"><input name="q" value=""><button>Go</button></form>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .and(query_param("q", "boots"))
        .respond_with(html("<h1>Found boots</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let root = open().await;
    root.goto(server.uri()).await.unwrap();
    let query = root.search("input[name=q]").await.unwrap();
    query.set_text("boots").await.unwrap();
    query.submit().await.unwrap();

    assert_eq!(root.search("h1").await.unwrap().text().await.unwrap(), "Found boots");
    assert!(root.url().await.unwrap().unwrap().ends_with("/results?q=boots"));
    assert!(matches!(query.text().await, Err(PincerError::StaleElement(_))));
}

#[tokio::test]
async fn post_form_stores_session_cookie_for_downloads() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/login",
        r#"<form method="post" action="/login">
             <input name="user"><input name="pass" type="password">
           </form>"#,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string_contains("user=ada"))
        .respond_with(
            html("<p id='welcome'>Hi</p>")
                .insert_header("set-cookie", "session=xyz; Path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.csv"))
        .and(header("cookie", "session=xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"a,b\n".to_vec(), "text/csv"))
        .mount(&server)
        .await;

    let root = open().await;
    root.goto(format!("{}/login", server.uri())).await.unwrap();
    root.search("input[name=user]").await.unwrap().set_text("ada").await.unwrap();
    root.search("form").await.unwrap().submit().await.unwrap();
    assert_eq!(root.search("#welcome").await.unwrap().text().await.unwrap(), "Hi");

    let session = root.cookies().get("session").await.unwrap().unwrap();
    assert_eq!(session.value, "xyz");
    assert_eq!(session.path, "/");
    assert!(session.http_only);

    let download = root.download("/report.csv").await.unwrap();
    assert_eq!(download.data, b"a,b\n");
    assert_eq!(download.content_type.as_deref(), Some("text/csv"));
}

#[tokio::test]
async fn cleared_cookies_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/in"))
        .respond_with(html("<p>in</p>").insert_header("set-cookie", "flag=1; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/out"))
        .respond_with(html("<p>out</p>").insert_header("set-cookie", "flag=; Path=/; Max-Age=0"))
        .mount(&server)
        .await;

    let root = open().await;
    root.goto(format!("{}/in", server.uri())).await.unwrap();
    assert_eq!(root.cookies().all().await.unwrap().len(), 1);
    root.goto(format!("{}/out", server.uri())).await.unwrap();
    assert!(root.cookies().all().await.unwrap().is_empty());
}

#[tokio::test]
async fn history_and_refresh_across_loads() {
    let server = MockServer::start().await;
    serve(&server, "/one", "<title>One</title>").await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(html("<title>Two</title><p>first</p>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/two", "<title>Two</title><p>second</p>").await;

    let root = open().await;
    root.goto(format!("{}/one", server.uri())).await.unwrap();
    root.goto("/two").await.unwrap();
    let paragraph = root.search("p").await.unwrap();
    assert_eq!(paragraph.text().await.unwrap(), "first");

    root.back(1).await.unwrap();
    assert_eq!(root.title().await.unwrap(), "One");
    assert!(matches!(paragraph.text().await, Err(PincerError::StaleElement(_))));

    root.forward(1).await.unwrap();
    assert_eq!(root.search("p").await.unwrap().text().await.unwrap(), "first");

    root.refresh().await.unwrap();
    assert_eq!(root.search("p").await.unwrap().text().await.unwrap(), "second");
    assert!(matches!(root.forward(1).await, Err(PincerError::InvalidTarget(_))));
}
