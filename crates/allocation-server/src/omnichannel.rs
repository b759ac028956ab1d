//! Omnichannel admin API client
//!
//! Serves as both the agent directory and the assignment sink for the engine.

use async_trait::async_trait;
use chat_allocation_core::prelude::{AgentDirectory, AgentSnapshot, AssignmentSink};
use chat_allocation_core::{AllocationError, Result as AllocationResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::OmnichannelConfig;
use crate::error::Result;

const AGENTS_PATH: &str = "/api/v2/admin/agents";
const ASSIGN_AGENT_PATH: &str = "/api/v2/admin/service/assign_agent";

const APP_ID_HEADER: &str = "Qiscus-App-Id";
const SECRET_KEY_HEADER: &str = "Qiscus-Secret-Key";

#[derive(Debug, Deserialize)]
struct AgentsResponse {
    data: AgentsData,
}

#[derive(Debug, Deserialize)]
struct AgentsData {
    #[serde(default)]
    agents: Vec<RemoteAgent>,
}

#[derive(Debug, Deserialize)]
struct RemoteAgent {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_available: bool,
}

#[derive(Debug, Default, Deserialize)]
struct AssignResponse {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the omnichannel admin API
#[derive(Clone)]
pub struct OmnichannelClient {
    http: Client,
    base_url: String,
    app_id: String,
    secret_key: String,
}

impl OmnichannelClient {
    pub fn new(config: &OmnichannelConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(APP_ID_HEADER, &self.app_id)
            .header(SECRET_KEY_HEADER, &self.secret_key)
    }
}

#[async_trait]
impl AgentDirectory for OmnichannelClient {
    async fn list_available_agents(&self) -> AllocationResult<Vec<AgentSnapshot>> {
        let response = self
            .authorized(self.http.get(self.url(AGENTS_PATH)))
            .send()
            .await
            .map_err(|e| AllocationError::directory(format!("request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AllocationError::directory(format!("agents endpoint returned {}", status)));
        }

        let body: AgentsResponse = response
            .json()
            .await
            .map_err(|e| AllocationError::directory(format!("unreadable agents response: {}", e)))?;

        let agents: Vec<AgentSnapshot> = body
            .data
            .agents
            .into_iter()
            .filter(|agent| agent.is_available)
            .map(|agent| AgentSnapshot::available(agent.id.to_string(), agent.name))
            .collect();

        debug!("📒 Omnichannel directory listed {} available agents", agents.len());
        Ok(agents)
    }
}

#[async_trait]
impl AssignmentSink for OmnichannelClient {
    async fn bind(&self, session_id: &str, agent_id: &str) -> AllocationResult<()> {
        let form = [("room_id", session_id), ("agent_id", agent_id)];
        let response = self
            .authorized(self.http.post(self.url(ASSIGN_AGENT_PATH)))
            .form(&form)
            .send()
            .await
            .map_err(|e| AllocationError::assignment(format!("request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::OK {
            debug!("🔗 Omnichannel bound room {} to agent {}", session_id, agent_id);
            return Ok(());
        }

        let body: AssignResponse = response.json().await.unwrap_or_default();
        Err(AllocationError::assignment(format!(
            "assign_agent returned {}: {}",
            status,
            body.message.unwrap_or_default()
        )))
    }
}
