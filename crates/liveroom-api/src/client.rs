// HTTP client for the recorder's REST API.
//
// Base path: /api/
// Room ids are placed into the path as encoded segments, never
// formatted into a string.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ForceRefreshResponse, LiveSummary, LogsResponse, NewLive, RemoveLiveRequest};
use crate::transport::TransportConfig;

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    err_msg: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the `/api/lives…` endpoints.
#[derive(Debug, Clone)]
pub struct LiveClient {
    http: reqwest::Client,
    base_url: Url,
}

impl LiveClient {
    /// Build from a server root (e.g. `http://127.0.0.1:8080`) and transport config.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Ensure the base URL ends with `/api/`.
    ///
    /// Accepts both the server root and an explicit `/api` suffix.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(raw.to_owned()));
        }

        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/api") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/api/"));
        }
        Ok(url)
    }

    /// The normalized `/api/` base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The push endpoint, `/api/sse`.
    pub fn sse_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join("sse")?)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}lives/{id}[/{action}]` with the id percent-encoded.
    fn live_url(&self, id: &str, action: Option<&str>) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("lives").push(id);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        Self::handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, Error> {
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        Self::handle_response(resp).await
    }

    async fn delete<B: Serialize + Sync>(&self, url: Url, body: Option<&B>) -> Result<(), Error> {
        debug!("DELETE {url}");

        let mut req = self.http.delete(url);
        if let Some(body) = body {
            req = req.json(body);
        }
        Self::handle_empty(req.send().await?).await
    }

    async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|e| e.err_msg)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        Error::Api {
            status: status.as_u16(),
            message,
        }
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /api/lives`: every configured room.
    pub async fn list_lives(&self) -> Result<Vec<LiveSummary>, Error> {
        let url = self.base_url.join("lives")?;
        self.get(url).await
    }

    /// `POST /api/lives`: add rooms by URL.
    ///
    /// The recorder answers with the rooms it accepted; a URL it could not
    /// parse or resolve is silently left out of the reply.
    pub async fn add_lives(&self, rooms: &[NewLive]) -> Result<Vec<LiveSummary>, Error> {
        let url = self.base_url.join("lives")?;
        self.post(url, &rooms).await
    }

    /// `DELETE /api/lives/{id}`: drop a room, optionally with its recordings.
    pub async fn remove_live(&self, id: &str, delete_files: bool) -> Result<(), Error> {
        let url = self.live_url(id, None)?;
        let body = delete_files.then_some(RemoveLiveRequest { delete_files });
        self.delete(url, body.as_ref()).await
    }

    /// `GET /api/lives/{id}`: the full detail object.
    ///
    /// Returned as a raw JSON object: the detail is an open record and
    /// callers merge partial event payloads into it key by key.
    pub async fn get_live(&self, id: &str) -> Result<Map<String, Value>, Error> {
        let url = self.live_url(id, None)?;
        self.get(url).await
    }

    /// `GET /api/lives/{id}/logs?lines=N`: the newest `lines` log lines.
    pub async fn get_logs(&self, id: &str, lines: usize) -> Result<LogsResponse, Error> {
        let url = self.live_url(id, Some("logs"))?;
        self.get_with_params(url, &[("lines", lines.to_string())])
            .await
    }

    /// `GET /api/lives/{id}/forceRefresh`: bypass the platform limiter once.
    pub async fn force_refresh(&self, id: &str) -> Result<ForceRefreshResponse, Error> {
        let url = self.live_url(id, Some("forceRefresh"))?;
        self.get(url).await
    }

    /// `GET /api/lives/{id}/start`: begin monitoring a room.
    pub async fn start_listening(&self, id: &str) -> Result<LiveSummary, Error> {
        let url = self.live_url(id, Some("start"))?;
        self.get(url).await
    }

    /// `GET /api/lives/{id}/stop`: stop monitoring a room.
    pub async fn stop_listening(&self, id: &str) -> Result<LiveSummary, Error> {
        let url = self.live_url(id, Some("stop"))?;
        self.get(url).await
    }
}
