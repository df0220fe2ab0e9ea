//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Where the monitor lives and how to log in.
pub struct Monitor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Monitor {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}/api{}", self.host, self.port, path)
    }
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(monitor: &Monitor, path: &str) -> Result<T> {
    let url = monitor.url(path);
    reqwest::Client::new()
        .get(&url)
        .basic_auth(&monitor.user, Some(&monitor.pass))
        .send()
        .await
        .with_context(|| format!("failed to connect to punchd at {}, is the monitor enabled?", url))?
        .error_for_status()
        .context("monitor refused the request")?
        .json::<T>()
        .await
        .context("failed to parse response")
}
