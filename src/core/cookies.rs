use crate::core::backend::Backend;
use crate::errors::{Normalize, Result};
use crate::types::Cookie;
use std::sync::Arc;

/// Read view over the cookies of the backend's session. Every call asks the
/// backend, so the jar always reflects the live session.
pub struct CookieJar<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> CookieJar<B> {
    pub(crate) fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn all(&self) -> Result<Vec<Cookie>> {
        self.backend.fetch_cookies().await.normalized()
    }

    pub async fn get(&self, name: &str) -> Result<Option<Cookie>> {
        Ok(self.all().await?.into_iter().find(|cookie| cookie.name == name))
    }

    pub async fn for_domain(&self, host: &str) -> Result<Vec<Cookie>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|cookie| cookie.matches(host, &cookie.path, true))
            .collect())
    }
}
