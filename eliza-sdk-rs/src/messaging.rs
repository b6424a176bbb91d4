use crate::error::{ElizaError, Result};
use crate::models::{Channel, ChannelMessage, NewChannel, RawChannel, extract_list};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

/// REST client for the agent server's messaging API.
#[derive(Clone)]
pub struct MessagingClient {
    base_url: String,
    client: reqwest::Client,
}

impl MessagingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Channels registered under one messaging server.
    pub async fn list_server_channels(&self, server_id: &str) -> Result<Vec<Channel>> {
        let url = format!(
            "{}/api/messaging/central-servers/{}/channels",
            self.base_url, server_id
        );
        tracing::debug!(%url, "Fetching server channels");
        let body = self.get_json(&url).await?;
        Ok(extract_list(body, "channels")?)
    }

    /// Every channel known to the central messaging bus. Entries that do not
    /// look like a channel are skipped.
    pub async fn list_central_channels(&self) -> Result<Vec<RawChannel>> {
        let url = format!("{}/api/messaging/central-channels", self.base_url);
        let body = self.get_json(&url).await?;
        let raw: Vec<Value> = extract_list(body, "channels")?;
        Ok(raw
            .into_iter()
            .filter_map(|value| {
                RawChannel::parse(value)
                    .inspect_err(|e| tracing::debug!(error = %e, "Skipping unreadable channel"))
                    .ok()
            })
            .collect())
    }

    pub async fn channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>> {
        let url = format!(
            "{}/api/messaging/central-channels/{}/messages?limit={}",
            self.base_url, channel_id, limit
        );
        let body = self.get_json(&url).await?;
        Ok(extract_list(body, "messages")?)
    }

    /// Creates a channel and returns the server's raw response body.
    pub async fn create_channel(&self, channel: &NewChannel) -> Result<Value> {
        let url = format!("{}/api/messaging/central-channels", self.base_url);
        let res = self.client.post(&url).json(channel).send().await?;
        Self::json_or_error(res).await
    }

    pub async fn add_agent_to_channel(&self, channel_id: &str, agent_id: &str) -> Result<()> {
        let url = format!(
            "{}/api/messaging/central-channels/{}/agents",
            self.base_url, channel_id
        );
        let res = self
            .client
            .post(&url)
            .json(&json!({ "agentId": agent_id }))
            .send()
            .await?;
        Self::json_or_error(res).await.map(|_| ())
    }

    /// Forwards an arbitrary request to `{base}/api/{path}` and returns the
    /// upstream status with its JSON body, whatever the status is.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: Option<String>,
    ) -> Result<(StatusCode, Value)> {
        let mut url = format!("{}/api/{}", self.base_url, path.trim_start_matches('/'));
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }

        tracing::info!("[Proxy] {} {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(body) = body {
            req = req.body(body);
        }

        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok((status, value))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let res = self
            .client
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        Self::json_or_error(res).await
    }

    async fn json_or_error(res: reqwest::Response) -> Result<Value> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ElizaError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let text = res.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode as AxumStatus,
        routing::{get, post},
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn lists_channels_from_nested_envelope() {
        let app = Router::new().route(
            "/api/messaging/central-servers/{id}/channels",
            get(|Path(id): Path<String>| async move {
                Json(json!({ "success": true, "data": { "channels": [
                    { "id": format!("{}-a", id), "type": "DM" },
                    { "id": format!("{}-b", id), "type": "GROUP" }
                ]}}))
            }),
        );
        let client = MessagingClient::new(spawn_upstream(app).await);

        let channels = client.list_server_channels("srv").await.unwrap();
        let ids: Vec<_> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["srv-a", "srv-b"]);
    }

    #[tokio::test]
    async fn message_limit_is_sent_as_query() {
        let app = Router::new().route(
            "/api/messaging/central-channels/{id}/messages",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({ "messages": [{ "content": q.get("limit").cloned() }] }))
            }),
        );
        let client = MessagingClient::new(spawn_upstream(app).await);

        let messages = client.channel_messages("c1", 50).await.unwrap();
        assert_eq!(messages[0].content.as_deref(), Some("50"));
    }

    #[tokio::test]
    async fn error_status_becomes_upstream_error() {
        let app = Router::new().route(
            "/api/messaging/central-channels",
            post(|| async { (AxumStatus::BAD_GATEWAY, "agent offline") }),
        );
        let client = MessagingClient::new(spawn_upstream(app).await);

        let err = client.add_agent_to_channel("c1", "a1").await.unwrap_err();
        match err {
            // Route is missing for /agents, so axum answers 404 first.
            ElizaError::Upstream { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other}"),
        }

        let new_channel = NewChannel {
            id: "c1".into(),
            name: "n".into(),
            server_id: "s".into(),
            participant_central_user_ids: vec![],
            channel_type: "DM".into(),
            metadata: Default::default(),
        };
        match client.create_channel(&new_channel).await.unwrap_err() {
            ElizaError::Upstream { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "agent offline");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn forward_relays_status_and_query() {
        let app = Router::new().route(
            "/api/agents/{id}",
            get(|Path(id): Path<String>, Query(q): Query<HashMap<String, String>>| async move {
                (
                    AxumStatus::ACCEPTED,
                    Json(json!({ "id": id, "verbose": q.get("verbose") })),
                )
            }),
        );
        let client = MessagingClient::new(spawn_upstream(app).await);

        let (status, body) = client
            .forward(Method::GET, "agents/a1", Some("verbose=1"), None)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({ "id": "a1", "verbose": "1" }));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = MessagingClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
    }
}
