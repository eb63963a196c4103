pub mod browser;
pub mod core;
pub mod errors;
pub mod fetch;
pub mod testing;
pub mod types;

pub use crate::core::{
    Backend, BackendCapabilities, BrowserConfig, Condition, Config, FetchConfig, FrameTarget,
    GotoOptions, RootContext, SearchContext, Target, WaitOptions, WindowSelector,
};
pub use browser::ChromeBackend;
pub use errors::{PincerError, Result};
pub use fetch::FetchBackend;
pub use types::*;
