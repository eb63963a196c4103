//! Runs against a real Chrome. Skipped unless `PINCER_CHROME_TEST` is set.

use browser_pincer::{BrowserConfig, ChromeBackend, Condition, Config, PincerError, RootContext};

const PAGE: &str = "data:text/html,<title>Smoke</title>\
<ul><li class='item'>one</li><li class='item'>two</li></ul>\
<input id='name'><div id='late'></div>\
<script>setTimeout(()=>{document.getElementById('late').textContent='ready'},300)</script>";

fn enabled() -> bool {
    std::env::var_os("PINCER_CHROME_TEST").is_some()
}

#[tokio::test]
async fn drives_a_live_page() {
    if !enabled() {
        return;
    }
    let backend = ChromeBackend::launch(BrowserConfig::default()).await.unwrap();
    let root = RootContext::new(backend, Config::default()).await.unwrap();

    root.goto(PAGE).await.unwrap();
    assert_eq!(root.title().await.unwrap(), "Smoke");

    let items = root.search(".item").await.unwrap();
    assert_eq!(items.texts().await.unwrap(), vec!["one", "two"]);
    assert_eq!(root.search("//li").await.unwrap().len(), 2);

    let input = root.search("#name").await.unwrap();
    input.set_text("Ada").await.unwrap();
    assert_eq!(input.attribute("value").await.unwrap().as_deref(), Some("Ada"));

    root.search("#late")
        .await
        .unwrap()
        .wait(Condition::text("ready"))
        .await
        .unwrap();

    root.goto(PAGE).await.unwrap();
    assert!(matches!(items.text().await, Err(PincerError::StaleElement(_))));

    root.close().await.unwrap();
}
