//! HTTP client for communicating with calnotify-server

use anyhow::{Context, Result};
use calnotify_core::Event;
use calnotify_core::window::{EventList, Period};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::process::Command;
use std::time::Duration;

const MAX_RETRIES: u32 = 10;
const RETRY_DELAY_MS: u64 = 200;

/// HTTP client for calnotify-server
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl Client {
    /// Connect to an existing server at `bind`, starting a local one if
    /// nothing answers.
    pub async fn connect(bind: &str) -> Result<Self> {
        let base_url = if bind.starts_with("http://") || bind.starts_with("https://") {
            bind.trim_end_matches('/').to_string()
        } else {
            format!("http://{bind}")
        };

        let client = Self {
            http: reqwest::Client::new(),
            base_url,
        };

        if client.health_check().await.is_ok() {
            return Ok(client);
        }

        start_server()?;

        for _ in 0..MAX_RETRIES {
            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            if client.health_check().await.is_ok() {
                return Ok(client);
            }
        }

        anyhow::bail!("Failed to connect to calnotify-server at {}", client.base_url)
    }

    async fn health_check(&self) -> Result<()> {
        self.http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// POST /events
    pub async fn create_event(&self, event: &Event) -> Result<Event> {
        let resp = self
            .http
            .post(format!("{}/events", self.base_url))
            .json(event)
            .send()
            .await
            .context("Failed to connect to server")?;

        parse(resp).await
    }

    /// GET /events/:id
    pub async fn get_event(&self, id: &str) -> Result<Event> {
        let resp = self
            .http
            .get(format!("{}/events/{}", self.base_url, id))
            .send()
            .await
            .context("Failed to connect to server")?;

        parse(resp).await
    }

    /// PUT /events/:id
    pub async fn update_event(&self, id: &str, event: &Event) -> Result<Event> {
        let resp = self
            .http
            .put(format!("{}/events/{}", self.base_url, id))
            .json(event)
            .send()
            .await
            .context("Failed to connect to server")?;

        parse(resp).await
    }

    /// DELETE /events/:id
    pub async fn remove_event(&self, id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{}/events/{}", self.base_url, id))
            .send()
            .await
            .context("Failed to connect to server")?;

        if !resp.status().is_success() {
            let err: ErrorResponse = resp.json().await?;
            anyhow::bail!("{}", err.error);
        }

        Ok(())
    }

    /// GET /events/{daily,weekly,monthly}?at=...
    pub async fn list_window(&self, period: Period, at: DateTime<FixedOffset>) -> Result<EventList> {
        let resp = self
            .http
            .get(format!("{}/events/{}", self.base_url, period.as_str()))
            .query(&[("at", at.to_rfc3339())])
            .send()
            .await
            .context("Failed to connect to server")?;

        parse(resp).await
    }
}

async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    if !resp.status().is_success() {
        let err: ErrorResponse = resp.json().await?;
        anyhow::bail!("{}", err.error);
    }

    Ok(resp.json().await?)
}

/// Start the calnotify-server process
fn start_server() -> Result<()> {
    Command::new("calnotify-server")
        .spawn()
        .context("Failed to start calnotify-server. Is it installed?")?;
    Ok(())
}
