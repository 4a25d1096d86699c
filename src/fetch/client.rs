use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes prepared requests; wrappers layer authentication on top.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
