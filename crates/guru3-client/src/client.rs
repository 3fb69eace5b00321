//! Guru3 HTTP client.

use crate::error::Guru3Error;
use crate::push::PushChannel;
use crate::types::ChangeEvent;
use reqwest::multipart::Form;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const MESSAGES_PATH: &str = "/api/event/1/messages";
const STREAM_PATH: &str = "/status/stream/";

/// Guru3 event API client.
#[derive(Clone)]
pub struct Guru3Client {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl Guru3Client {
    /// Create a new Guru3 client for `base_url` (e.g. `https://guru3.example:443`).
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Result<Self, Guru3Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Build the base URL from its parts.
    pub fn base_url_for(host: &str, port: Option<u16>, tls: bool) -> String {
        let scheme = if tls { "https" } else { "http" };
        match port {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        }
    }

    /// URL of the event queue (GET to fetch, POST to acknowledge).
    pub fn messages_url(&self) -> String {
        format!("{}{}", self.base_url, MESSAGES_PATH)
    }

    /// URL of the status push stream.
    pub fn push_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}{}", ws_base, STREAM_PATH)
    }

    /// Fetch every outstanding event, in queue order.
    #[instrument(skip(self))]
    pub async fn fetch_events(&self) -> Result<Vec<ChangeEvent>, Guru3Error> {
        let response = self
            .client
            .get(self.messages_url())
            .header("ApiKey", self.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Guru3Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let events: Vec<ChangeEvent> = serde_json::from_str(&body)?;
        debug!("Fetched {} events", events.len());
        Ok(events)
    }

    /// Mark events as processed.
    ///
    /// Succeeds only when Guru3 answers 200; anything else means the ids are still queued
    /// on the server side.
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, ids: &[u64]) -> Result<(), Guru3Error> {
        let acklist = serde_json::to_string(ids)?;
        let form = Form::new().text("acklist", acklist);

        let response = self
            .client
            .post(self.messages_url())
            .header("ApiKey", self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Acknowledgement rejected");
            return Err(Guru3Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(?ids, "Acknowledged events");
        Ok(())
    }

    /// Open the status push channel.
    pub async fn connect_push(&self) -> Result<PushChannel, Guru3Error> {
        PushChannel::connect(&self.push_url(), self.api_key.expose_secret()).await
    }
}
