//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

async fn decode<R>(url: &str, sent: reqwest::Result<reqwest::Response>) -> Result<R>
where
    R: for<'de> Deserialize<'de>,
{
    let resp =
        sent.with_context(|| format!("failed to connect to surged at {}, is it running?", url))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("surged rejected the request ({}): {}", status, body.trim());
    }

    resp.json::<R>().await.context("failed to parse response")
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    decode(url, reqwest::get(url).await).await
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    decode(url, reqwest::Client::new().post(url).send().await).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    decode(url, reqwest::Client::new().post(url).json(body).send().await).await
}
