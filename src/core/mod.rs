pub mod backend;
pub mod config;
pub mod context;
pub mod cookies;
pub mod http;
pub mod navigation;
pub mod root;
pub mod wait;

pub use backend::{Backend, BackendCapabilities};
pub use config::{BrowserConfig, Config, FetchConfig, Viewport};
pub use context::SearchContext;
pub use cookies::CookieJar;
pub use http::{Download, HttpClient, HttpResponse};
pub use navigation::{resolve_target_url, FrameTarget, GotoOptions, Target, WindowSelector};
pub use root::RootContext;
pub use wait::{Condition, TextMatch, WaitOptions};
