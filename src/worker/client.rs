//! Thin HTTP client the worker uses to talk back to the control plane
//! (§4.6, §6.1). Every call may block on network I/O (§5); failures become
//! [`EngineError::DependencyUnavailable`] so the poll loop can log and
//! retry rather than crash (§7's worker propagation policy).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EngineError;

#[derive(Clone)]
pub struct ControlPlaneClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallSummary {
    pub invocation_id: String,
    pub function_name: String,
    pub arguments: Value,
    pub repo_name: String,
    pub commit_hash: String,
    pub workflow_file: String,
    pub parent_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCallBody<'a> {
    caller_id: Option<&'a str>,
    function_name: &'a str,
    arguments: &'a Value,
    repo_name: &'a str,
    commit_hash: &'a str,
    workflow_file: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateCallResponse {
    pub invocation_id: String,
}

#[derive(Debug, Deserialize)]
struct ListCallsResponse {
    calls: Vec<CallSummary>,
}

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    index: i64,
    timestamp: chrono::DateTime<chrono::Utc>,
    content: &'a str,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn unavailable(e: impl std::fmt::Display) -> EngineError {
        EngineError::DependencyUnavailable(e.to_string())
    }

    pub async fn list_pending_calls(&self, limit: u32) -> Result<Vec<CallSummary>, EngineError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/calls?status=pending&limit={limit}")))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        Ok(resp.json::<ListCallsResponse>().await.map_err(Self::unavailable)?.calls)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_call(
        &self,
        caller_id: Option<&str>,
        function_name: &str,
        arguments: &Value,
        repo_name: &str,
        commit_hash: &str,
        workflow_file: &str,
    ) -> Result<String, EngineError> {
        let body = CreateCallBody {
            caller_id,
            function_name,
            arguments,
            repo_name,
            commit_hash,
            workflow_file,
        };
        let resp = self
            .http
            .post(self.url("/api/call"))
            .json(&body)
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        Ok(resp.json::<CreateCallResponse>().await.map_err(Self::unavailable)?.invocation_id)
    }

    pub async fn get_call(&self, id: &str) -> Result<CallSummary, EngineError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/call/{id}")))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        resp.json().await.map_err(Self::unavailable)
    }

    pub async fn start_call(&self, id: &str, worker_id: &str) -> Result<bool, EngineError> {
        let resp = self
            .http
            .post(self.url(&format!("/api/call/{id}/start")))
            .json(&serde_json::json!({ "worker_id": worker_id }))
            .send()
            .await
            .map_err(Self::unavailable)?;
        Ok(resp.status().is_success())
    }

    pub async fn finish_call_ok(&self, id: &str, result: &Value) -> Result<(), EngineError> {
        self.http
            .post(self.url(&format!("/api/call/{id}/finish")))
            .json(&serde_json::json!({ "status": "completed", "result": result }))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        Ok(())
    }

    pub async fn finish_call_err(&self, id: &str, error: &str) -> Result<(), EngineError> {
        self.http
            .post(self.url(&format!("/api/call/{id}/finish")))
            .json(&serde_json::json!({ "status": "failed", "error": error }))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        Ok(())
    }

    pub async fn append_logs(&self, stage_run_id: &str, lines: &[(i64, chrono::DateTime<chrono::Utc>, String)]) -> Result<(), EngineError> {
        let logs: Vec<LogEntry> = lines
            .iter()
            .map(|(index, timestamp, content)| LogEntry {
                index: *index,
                timestamp: *timestamp,
                content,
            })
            .collect();
        self.http
            .post(self.url(&format!("/api/stages/{stage_run_id}/logs")))
            .json(&serde_json::json!({ "logs": logs }))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        Ok(())
    }

    pub async fn fetch_blob(&self, repo_name: &str, commit_hash: &str, file_path: &str) -> Result<Vec<u8>, EngineError> {
        let resp = self
            .http
            .get(self.url(&format!("/api/repos/{repo_name}/blob/{commit_hash}/{file_path}")))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        Ok(resp.bytes().await.map_err(Self::unavailable)?.to_vec())
    }

    pub async fn write_file(&self, stage_run_id: &str, file_path: &str, bytes: &[u8]) -> Result<String, EngineError> {
        use base64::Engine;
        let content_base64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        let resp = self
            .http
            .post(self.url(&format!("/api/stages/{stage_run_id}/files")))
            .json(&serde_json::json!({ "file_path": file_path, "content_base64": content_base64 }))
            .send()
            .await
            .map_err(Self::unavailable)?
            .error_for_status()
            .map_err(Self::unavailable)?;
        #[derive(Deserialize)]
        struct Resp {
            content_hash: String,
        }
        Ok(resp.json::<Resp>().await.map_err(Self::unavailable)?.content_hash)
    }

    pub async fn read_file(&self, repo_name: &str, commit_hash: &str, file_path: &str) -> Result<Vec<u8>, EngineError> {
        self.fetch_blob(repo_name, commit_hash, file_path).await
    }
}
