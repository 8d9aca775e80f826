use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes HTTP requests. Wrappers such as [`ApiKey`](super::auth::ApiKey)
/// decorate the request and delegate to an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Box<C> {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req).await
    }
}
