// crates/tessera-node/src/transport.rs
//
// HTTP task transport: delivers tasks to miner endpoints and polls for
// results. One shared client carries the per-call timeout; an unreachable
// miner is an unreachable miner, never a cycle failure.

use std::time::Duration;

use async_trait::async_trait;

use tessera_core::{MinerResult, TaskAssignment, TaskTransport, TesseraError};

/// TaskTransport over HTTP+JSON.
pub struct HttpTaskTransport {
    client: reqwest::Client,
}

impl HttpTaskTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl TaskTransport for HttpTaskTransport {
    async fn send_task(&self, endpoint: &str, task: &TaskAssignment) -> Result<(), TesseraError> {
        let url = format!("{}/task", endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(task)
            .send()
            .await
            .map_err(|e| TesseraError::Network(format!("send_task to {}: {}", url, e)))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TesseraError::Network(format!(
                "send_task to {} returned status {}",
                url,
                resp.status()
            )))
        }
    }

    async fn poll_result(
        &self,
        endpoint: &str,
        task_id: &str,
    ) -> Result<Option<MinerResult>, TesseraError> {
        let url = format!(
            "{}/task/{}/result",
            endpoint.trim_end_matches('/'),
            task_id
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TesseraError::Network(format!("poll_result from {}: {}", url, e)))?;

        match resp.status() {
            status if status.is_success() => {
                let result: MinerResult = resp
                    .json()
                    .await
                    .map_err(|e| TesseraError::Serialization(e.to_string()))?;
                Ok(Some(result))
            }
            // Not ready yet, keep polling until the phase cutoff.
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::NO_CONTENT => Ok(None),
            status => Err(TesseraError::Network(format!(
                "poll_result from {} returned status {}",
                url, status
            ))),
        }
    }
}
