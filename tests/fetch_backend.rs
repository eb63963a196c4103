use browser_pincer::fetch::FetchBackend;
use browser_pincer::{Condition, Config, PincerError, RootContext, WindowSelector};

const CATALOG: &str = r#"<!DOCTYPE html>
<html>
<head><title>Catalog</title></head>
<body>
  <h1>Products</h1>
  <ul id="products">
    <li class="product" data-sku="a1"><span class="name">Anvil</span></li>
    <li class="product" data-sku="b2"><span class="name">Bucket</span></li>
  </ul>
  <form id="search" action="/search">
    <input name="q">
    <button type="submit">Go</button>
  </form>
  <iframe id="ad" src="/ad"></iframe>
</body>
</html>"#;

async fn open() -> RootContext<FetchBackend> {
    let backend = FetchBackend::from_html("http://shop.test/catalog", CATALOG).unwrap();
    RootContext::new(backend, Config::default()).await.unwrap()
}

#[tokio::test]
async fn reads_static_document() {
    let root = open().await;
    assert_eq!(root.title().await.unwrap(), "Catalog");
    assert_eq!(
        root.url().await.unwrap().as_deref(),
        Some("http://shop.test/catalog")
    );

    let products = root.search("#products .product").await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products.search(".name").await.unwrap().texts().await.unwrap(), vec!["Anvil", "Bucket"]);
    assert_eq!(
        products.last().attribute("data-sku").await.unwrap().as_deref(),
        Some("b2")
    );
    assert_eq!(products.first().tag().await.unwrap(), "li");
    assert!(products
        .first()
        .html()
        .await
        .unwrap()
        .contains(r#"<span class="name">Anvil</span>"#));
}

#[tokio::test]
async fn edits_are_visible_to_later_reads() {
    let root = open().await;
    let heading = root.search("h1").await.unwrap();
    heading.set_text("Sale").await.unwrap();
    heading.set_attribute("data-banner", "on").await.unwrap();

    assert_eq!(heading.text().await.unwrap(), "Sale");
    assert_eq!(heading.attribute("data-banner").await.unwrap().as_deref(), Some("on"));

    let list = root.search("#products").await.unwrap();
    let names = list.search(".name").await.unwrap();
    list.set_text("sold out").await.unwrap();
    assert!(matches!(names.text().await, Err(PincerError::StaleElement(_))));
    assert!(list.search(".name").await.unwrap().is_empty());
}

#[tokio::test]
async fn conditions_work_without_scripting() {
    let root = open().await;
    let products = root.search(".product").await.unwrap();
    products.wait(Condition::Visible).await.unwrap();
    root.search(".missing")
        .await
        .unwrap()
        .wait(Condition::Gone)
        .await
        .unwrap();
}

#[tokio::test]
async fn interactive_features_are_unsupported() {
    let root = open().await;
    let products = root.search(".product").await.unwrap();

    assert!(matches!(products.click().await, Err(PincerError::UnsupportedCapability(_))));
    assert!(matches!(
        root.search("//li").await,
        Err(PincerError::UnsupportedCapability(_))
    ));
    assert!(matches!(
        root.search("#ad").await.unwrap().goto_frame().await,
        Err(PincerError::UnsupportedCapability(_))
    ));
    assert_eq!(root.window(WindowSelector::Current).await.unwrap().as_str(), "main");
    assert!(matches!(
        root.window(WindowSelector::Next).await,
        Err(PincerError::InvalidTarget(_))
    ));
}

#[tokio::test]
async fn history_bounds_are_enforced() {
    let root = open().await;
    assert!(matches!(root.back(1).await, Err(PincerError::InvalidTarget(_))));
}

#[tokio::test]
async fn closed_session_rejects_calls() {
    let root = open().await;
    root.close().await.unwrap();
    root.close().await.unwrap();
    assert!(matches!(root.search("li").await, Err(PincerError::Backend(_))));
}
