//! HTTP plumbing for the back-office collaborators.

pub mod auth;
mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};
use serde::de::DeserializeOwned;

/// True when `source` is an absolute `http` or `https` URL rather than a local path.
pub fn is_http_url(source: &str) -> bool {
    reqwest::Url::parse(source)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

async fn get<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<reqwest::Response> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("GET {url} returned status {status}: {body}");
    }
    Ok(resp)
}

/// Fetches the body of `url`, failing on non-success statuses.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let resp = get(client, url).await?;
    Ok(resp.bytes().await?.to_vec())
}

/// Fetches `url` and decodes its JSON body.
pub async fn fetch_json<C: HttpClient + ?Sized, T: DeserializeOwned>(
    client: &C,
    url: &str,
) -> Result<T> {
    let resp = get(client, url).await?;
    Ok(resp.json().await?)
}
